//! # ledgerlens
//!
//! Turn a financial document (PDF statement, scanned page, CSV export) into a
//! structured executive report using a generative model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / URL / data URI
//!  │
//!  ├─ 1. Input    resolve to bytes + declared MIME type
//!  ├─ 2. Extract  pdf → text layer (pdfium, spawn_blocking)
//!  │              image → bare base64
//!  │              other → UTF-8 text
//!  ├─ 3. Analyze  one provider round trip with a declared JSON schema
//!  ├─ 4. Validate the answer must match the schema or the run fails
//!  └─ 5. Output   AnalysisResult + stats
//! ```
//!
//! Nothing is retried. A response that does not match the schema fails with
//! the message `"Invalid response structure."`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerlens::{analyze_document, AnalyzerConfig, Language};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read once from GEMINI_API_KEY (or API_KEY)
//!     let config = AnalyzerConfig::builder_from_env()
//!         .language(Language::En)
//!         .build()?;
//!     let output = analyze_document("q3-statement.pdf", &config).await?;
//!     println!("{}", ledgerlens::report::render_text(&output.result));
//!     Ok(())
//! }
//! ```
//!
//! ## Driving a UI
//!
//! [`Session`] exposes the upload lifecycle as a state machine
//! (`Idle → Extracting → Analyzing → Completed | Error`) and publishes each
//! transition on a watch channel.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ledgerlens` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! ledgerlens = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod schema;
pub mod session;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_bytes, analyze_document, analyze_file, analyze_sync, analyze_to_file, extract_document};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, ApiKey, ExtractionOptions, TextDecoding};
pub use error::{AnalysisFailure, ExtractionError, LedgerLensError};
pub use language::Language;
pub use output::{
    AnalysisOutput, AnalysisResult, AnalysisStats, ChartPoint, ComparisonPair, ExpenseCategory, FinancialMetric,
    Insight, PayloadKind, Severity, Trend,
};
pub use pipeline::extract::{extract, ExtractionPayload, FileKind, UploadedFile};
pub use pipeline::llm::{AnalysisRequest, Analyzer};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{AnalysisProvider, ProviderRequest, ProviderResponse};
pub use session::{Session, SessionState, TransitionError};
