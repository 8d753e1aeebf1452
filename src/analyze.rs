//! Eager entry points: resolve, extract, analyse, return.
//!
//! These wrap [`crate::pipeline`] for callers that want one call per
//! document and do not need the [`crate::Session`] state machine.

use crate::config::AnalyzerConfig;
use crate::error::LedgerLensError;
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::extract::{extract_detailed, ExtractionPayload, UploadedFile};
use crate::pipeline::input;
use crate::pipeline::llm::Analyzer;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Analyse a local file, HTTP(S) URL or `data:` URI.
///
/// # Errors
/// Any failure is fatal: input resolution, extraction, provider setup, or the
/// analysis itself (including a response that does not match the schema).
///
/// # Example
/// ```rust,no_run
/// use ledgerlens::{analyze_document, AnalyzerConfig, Language};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalyzerConfig::builder_from_env()
///     .language(Language::En)
///     .build()?;
/// let output = analyze_document("q3-statement.pdf", &config).await?;
/// println!("{}", output.result.summary);
/// # Ok(())
/// # }
/// ```
pub async fn analyze_document(
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, LedgerLensError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    let file = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let analyzer = Analyzer::from_config(config)?;
    analyze_file(&file, &analyzer, config).await
}

/// Analyse an already-loaded file with a prepared [`Analyzer`].
pub async fn analyze_file(
    file: &UploadedFile,
    analyzer: &Analyzer,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, LedgerLensError> {
    let total_start = Instant::now();

    let extraction_start = Instant::now();
    let extracted = extract_detailed(file, &config.extraction, config.progress_callback.as_ref()).await?;
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
    info!(
        "Extracted '{}' in {}ms ({} bytes)",
        file.name,
        extraction_duration_ms,
        extracted.payload.len()
    );

    let analysis = analyzer
        .analyze_with_usage(&extracted.payload, config.language)
        .await?;

    let stats = AnalysisStats {
        payload_kind: Some(extracted.payload.kind()),
        pages: extracted.pages,
        payload_bytes: extracted.payload.len(),
        input_tokens: analysis.input_tokens,
        output_tokens: analysis.output_tokens,
        extraction_duration_ms,
        analysis_duration_ms: analysis.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis of '{}' complete in {}ms",
        file.name, stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        file_name: file.name.clone(),
        language: config.language,
        result: analysis.result,
        stats,
    })
}

/// Analyse in-memory bytes with an explicit MIME type.
pub async fn analyze_bytes(
    name: &str,
    mime_type: &str,
    bytes: Vec<u8>,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, LedgerLensError> {
    let file = UploadedFile::new(name, mime_type, bytes);
    let analyzer = Analyzer::from_config(config)?;
    analyze_file(&file, &analyzer, config).await
}

/// Analyse and write the [`AnalysisOutput`] as pretty JSON to `path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failed run never leaves a truncated report behind.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    path: impl AsRef<Path>,
    config: &AnalyzerConfig,
) -> Result<AnalysisStats, LedgerLensError> {
    let output = analyze_document(input_str, config).await?;
    write_output(&output, path.as_ref())?;
    Ok(output.stats)
}

/// Atomically write `output` as pretty JSON.
pub fn write_output(output: &AnalysisOutput, path: &Path) -> Result<(), LedgerLensError> {
    let write_failed = |source: std::io::Error| LedgerLensError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(output)
        .map_err(|e| LedgerLensError::Internal(format!("serialising report: {e}")))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(&json).map_err(write_failed)?;
    tmp.write_all(b"\n").map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;

    info!("Wrote report to {}", path.display());
    Ok(())
}

/// Synchronous wrapper around [`analyze_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutput, LedgerLensError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LedgerLensError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_document(input_str, config))
}

/// Resolve and extract only. Does not require a provider or API key.
pub async fn extract_document(
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
) -> Result<ExtractionPayload, LedgerLensError> {
    let file = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let extracted = extract_detailed(&file, &config.extraction, config.progress_callback.as_ref()).await?;
    Ok(extracted.payload)
}
