//! Error types for the ledgerlens library.
//!
//! Three error types mirror the three places an analysis can stop:
//!
//! * [`ExtractionError`]: the uploaded file could not be turned into an
//!   [`crate::ExtractionPayload`] (corrupt PDF, invalid UTF-8, empty file).
//!
//! * [`AnalysisFailure`]: the provider round trip failed, either at the
//!   transport level or because the answer did not match the declared schema.
//!   Callers display it as one message; see [`AnalysisFailure::message`].
//!
//! * [`LedgerLensError`]: fatal error of the convenience entry points in
//!   [`crate::analyze`], wrapping the two above plus input resolution,
//!   configuration and output failures.
//!
//! None of them is retried by the library. Recovery is always a manual
//! restart by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown for every provider answer that fails schema parsing.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response structure.";

/// Fallback when the provider failed without telling us why.
pub const GENERIC_PROVIDER_MESSAGE: &str = "Analysis provider request failed.";

/// A file could not be converted into an extraction payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// PDF header/trailer/xref is corrupt or the format is unsupported.
    #[error("PDF '{name}' could not be parsed: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF is encrypted and no password was supplied.
    #[error("PDF '{name}' is encrypted and requires a password")]
    PasswordRequired { name: String },

    /// A password was supplied but pdfium rejected it.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// pdfium could not return the text layer of a page.
    #[error("Text extraction failed on page {page}: {detail}")]
    PageTextFailed { page: usize, detail: String },

    /// The pdfium shared library could not be loaded.
    #[error(
        "Failed to bind to the pdfium library: {0}\n\
         Install libpdfium or set LEDGERLENS_PDFIUM_LIB_PATH to the directory containing it."
    )]
    PdfiumUnavailable(String),

    /// Strict decoding found bytes that are not UTF-8.
    #[error("'{name}' is not valid UTF-8 (first invalid byte at offset {valid_up_to})")]
    InvalidUtf8 { name: String, valid_up_to: usize },

    /// Nothing usable came out of the file.
    #[error("'{name}' contains no extractable content")]
    EmptyContent { name: String },

    /// The file exceeds the configured byte ceiling.
    #[error("'{name}' is {size} bytes, above the {limit}-byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// The PDF exceeds the configured page ceiling.
    #[error("PDF '{name}' has {pages} pages, above the {limit}-page limit")]
    TooManyPages { name: String, pages: usize, limit: usize },

    /// A `data:` URI was malformed or its base64 body did not decode.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// The blocking extraction task died.
    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

/// The provider round trip did not yield a valid [`crate::AnalysisResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisFailure {
    /// The answer was not JSON, or not JSON of the declared shape.
    ///
    /// `detail` is kept for logs; the displayed message is always
    /// [`INVALID_RESPONSE_MESSAGE`].
    #[error("Invalid response structure.")]
    InvalidResponse { detail: String },

    /// The provider returned an error with a message of its own.
    #[error("{message}")]
    Provider { status: Option<u16>, message: String },

    /// 401/403 from the provider.
    #[error("Authentication rejected by provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// 429 from the provider.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The round trip did not finish within the configured timeout.
    #[error("Analysis request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Network-level failure (DNS, TLS, connection reset).
    #[error("Could not reach the analysis provider: {0}")]
    Transport(String),

    /// The provider failed without any usable message.
    #[error("Analysis provider request failed.")]
    Unknown,
}

impl AnalysisFailure {
    /// The single user-facing message for this failure.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Build a provider failure, falling back to the generic message when
    /// the provider sent nothing useful.
    pub fn from_provider_message(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            AnalysisFailure::Unknown
        } else {
            AnalysisFailure::Provider { status, message }
        }
    }

    /// True for the schema-violation case.
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, AnalysisFailure::InvalidResponse { .. })
    }
}

/// All fatal errors returned by the [`crate::analyze`] entry points.
#[derive(Debug, Error)]
pub enum LedgerLensError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a path, an HTTP(S) URL, or a data URI.
    #[error("Invalid input '{input}': not a file path, HTTP/HTTPS URL, or data URI")]
    InvalidInput { input: String },

    /// HTTP download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// HTTP download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisFailure),

    // ── Provider / config errors ──────────────────────────────────────────
    /// The configured provider cannot be constructed (missing key etc.).
    #[error("Analysis provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write the JSON report.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
