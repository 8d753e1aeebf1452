//! CLI binary for ledgerlens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig`, drives a `Session`, and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use ledgerlens::analyze::write_output;
use ledgerlens::pipeline::input::resolve_input;
use ledgerlens::report::{render_text, RiskBand};
use ledgerlens::{
    extract_document, AnalysisOutput, AnalysisProgressCallback, AnalysisStats, Analyzer, AnalyzerConfig,
    ExtractionPayload, Language, ProgressCallback, Session, SessionState, TextDecoding,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the file is classified, a page bar for PDFs, then a spinner
/// for the provider round trip.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        bar.set_prefix("Reading");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_page_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, file_name: &str, total_pages: usize) {
        if total_pages > 0 {
            self.activate_page_bar(total_pages);
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Reading {total_pages} pages of {file_name}…"))
            ));
        } else {
            self.bar.set_message(format!("reading {file_name}"));
        }
    }

    fn on_page_extracted(&self, page_num: usize, _total_pages: usize, percent: u8) {
        self.bar.set_position(page_num as u64);
        self.bar.set_message(format!("{percent}%"));
    }

    fn on_analysis_start(&self, language: Language) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        self.bar.set_prefix("Analyzing");
        self.bar
            .set_message(format!("report in {}", language.display_name()));
        self.bar.reset_elapsed();
    }

    fn on_analysis_complete(&self, _success: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a statement, report in Chinese (default)
  ledgerlens q3-statement.pdf

  # English report, saved as JSON
  ledgerlens --language en q3-statement.pdf -o q3.json

  # A photographed balance sheet
  ledgerlens --language de balance-sheet.jpg

  # A CSV export from a URL, machine-readable output
  ledgerlens --json https://example.com/ledger.csv > report.json

  # Another provider through edgequake-llm
  ledgerlens --provider openai --model gpt-4.1-mini q3-statement.pdf

  # Just show what would be sent (no API key needed)
  ledgerlens --extract-only q3-statement.pdf

INPUT TYPES:
  application/pdf   text layer of every page, one line per page
  image/*           sent to the model as inline image data
  anything else     read as UTF-8 text (use --lossy-text for legacy encodings)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Gemini API key (falls back to API_KEY)
  OPENAI_API_KEY, …           Keys for other providers, read by edgequake-llm
  LEDGERLENS_PROVIDER         gemini (default), openai, anthropic, mistral, ollama, auto
  LEDGERLENS_MODEL            Model ID (default for gemini: gemini-3-pro-preview)
  LEDGERLENS_LANGUAGE         zh, en, ja, de
  LEDGERLENS_PDFIUM_LIB_PATH  Directory containing libpdfium
  RUST_LOG                    Overrides the log filter
"#;

/// Analyse financial documents with a generative model.
#[derive(Parser, Debug)]
#[command(
    name = "ledgerlens",
    version,
    about = "Analyse financial documents (PDF, image, text) and print an executive report",
    long_about = "Extract the content of a financial document (PDF text layer, image, or plain \
text), send it to a generative model with a fixed response schema, and print the resulting \
executive report: KPIs, time series, expense breakdown, period comparison, insights and a risk \
rating.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path, HTTP/HTTPS URL, or base64 data URI.
    input: String,

    /// Report language: zh, en, ja, de.
    #[arg(short, long, env = "LEDGERLENS_LANGUAGE", default_value = "zh")]
    language: Language,

    /// Provider: gemini, openai, anthropic, mistral, ollama, auto.
    #[arg(long, env = "LEDGERLENS_PROVIDER")]
    provider: Option<String>,

    /// Model ID.
    #[arg(long, env = "LEDGERLENS_MODEL")]
    model: Option<String>,

    /// Override the Gemini REST base URL.
    #[arg(long, env = "LEDGERLENS_API_BASE_URL", hide = true)]
    api_base_url: Option<String>,

    /// Write the full JSON report (result + stats) to this file.
    #[arg(short, long, env = "LEDGERLENS_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the result as JSON instead of the text report.
    #[arg(long, env = "LEDGERLENS_JSON")]
    json: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LEDGERLENS_PASSWORD")]
    password: Option<String>,

    /// Reject PDFs with more pages than this.
    #[arg(long, env = "LEDGERLENS_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Reject files larger than this many bytes.
    #[arg(long, env = "LEDGERLENS_MAX_BYTES")]
    max_bytes: Option<u64>,

    /// Replace invalid UTF-8 in text files instead of failing.
    #[arg(long, env = "LEDGERLENS_LOSSY_TEXT")]
    lossy_text: bool,

    /// Path to a text file with a custom instruction ({language} is substituted).
    #[arg(long, env = "LEDGERLENS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "LEDGERLENS_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Provider default when unset.
    #[arg(long, env = "LEDGERLENS_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Provider round-trip timeout in seconds.
    #[arg(long, env = "LEDGERLENS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "LEDGERLENS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the extracted payload and stop; no provider call.
    #[arg(long, env = "LEDGERLENS_EXTRACT_ONLY")]
    extract_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "LEDGERLENS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LEDGERLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LEDGERLENS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb.clone()).await?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let payload = extract_document(&cli.input, &config)
            .await
            .context("Extraction failed")?;
        if let Some(cb) = &progress_cb {
            cb.on_analysis_complete(true);
        }
        print_payload(&payload, cli.json)?;
        return Ok(());
    }

    // ── Run the session ──────────────────────────────────────────────────
    let start = Instant::now();
    let file = resolve_input(&cli.input, config.download_timeout_secs)
        .await
        .context("Failed to read input")?;
    let analyzer = Analyzer::from_config(&config).context("Failed to set up the analysis provider")?;

    let mut session = Session::new();
    let state = session
        .run(&analyzer, &file, config.language, &config.extraction, progress_cb.clone())
        .await
        .context("Session failed")?
        .clone();

    if let Some(cb) = &progress_cb {
        cb.on_analysis_complete(matches!(state, SessionState::Completed { .. }));
    }

    let (result, stats) = match state {
        SessionState::Completed { result, stats, .. } => (result, stats),
        SessionState::Error { message } => {
            eprintln!("{} {}", red("✘"), message);
            std::process::exit(1);
        }
        other => anyhow::bail!("session stopped in unexpected state '{}'", other.label()),
    };

    if cli.json {
        let json = serde_json::to_string_pretty(result.as_ref()).context("Failed to serialise result")?;
        println!("{json}");
    } else if !cli.quiet || cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(render_text(&result).as_bytes())
            .context("Failed to write to stdout")?;
    }

    let elapsed_ms = start.elapsed().as_millis() as u64;

    if let Some(ref path) = cli.output {
        let output = AnalysisOutput {
            file_name: file.name.clone(),
            language: config.language,
            result: result.as_ref().clone(),
            // Wall clock here also covers reading or downloading the input.
            stats: AnalysisStats {
                total_duration_ms: elapsed_ms,
                ..stats
            },
        };
        write_output(&output, path).context("Failed to write report")?;
    }

    if !cli.quiet && !cli.json {
        let band = RiskBand::from_rating(result.risk_rating);
        let tick = match band {
            RiskBand::Stable => green("✔"),
            RiskBand::Moderate => yellow("●"),
            RiskBand::Critical => red("▲"),
        };
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {}  risk {}  {}{}",
            tick,
            file.name,
            bold(&band.to_string()),
            dim(&format!("{elapsed_ms}ms")),
            target
        );
    }

    Ok(())
}

fn print_payload(payload: &ExtractionPayload, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(payload).context("Failed to serialise payload")?;
        println!("{out}");
        return Ok(());
    }
    match payload {
        ExtractionPayload::Text { content } => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            if !content.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        ExtractionPayload::Image { base64, mime_type } => {
            println!("<image {mime_type}, {} base64 chars>", base64.len());
        }
    }
    Ok(())
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder_from_env()
        .language(cli.language)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url.as_str());
    }
    if let Some(ref password) = cli.password {
        builder = builder.pdf_password(password.as_str());
    }
    if let Some(n) = cli.max_pages {
        builder = builder.max_pdf_pages(n);
    }
    if let Some(n) = cli.max_bytes {
        builder = builder.max_file_bytes(n);
    }
    if cli.lossy_text {
        builder = builder.text_decoding(TextDecoding::Lossy);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn every_option_has_an_env_fallback() {
        let cmd = Cli::command();
        for arg in cmd.get_arguments() {
            let id = arg.get_id().as_str();
            if arg.is_positional() || id == "help" || id == "version" {
                continue;
            }
            let env = arg.get_env().and_then(|e| e.to_str());
            assert!(
                env.is_some_and(|e| e.starts_with("LEDGERLENS_")),
                "--{id} has no LEDGERLENS_* fallback"
            );
        }
    }

    #[test]
    fn extract_only_flag_parses() {
        let cli = Cli::try_parse_from(["ledgerlens", "--extract-only", "ledger.csv"]).unwrap();
        assert!(cli.extract_only);
        assert_eq!(cli.input, "ledger.csv");
    }
}
