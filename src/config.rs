//! Configuration types for document analysis.
//!
//! Everything the pipeline needs is held in one [`AnalyzerConfig`], built via
//! [`AnalyzerConfigBuilder`]. The provider credential is part of it: it is
//! loaded once (explicitly, or by [`AnalyzerConfig::builder_from_env`]) and
//! never re-read from the process environment afterwards.

use crate::error::LedgerLensError;
use crate::language::Language;
use crate::progress::ProgressCallback;
use crate::provider::AnalysisProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Gemini model used when none is named.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

/// Environment variables consulted for the Gemini key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// A provider credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building the request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// What to do with plain-text uploads that are not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextDecoding {
    /// Reject the file with [`crate::ExtractionError::InvalidUtf8`]. (default)
    #[default]
    Strict,
    /// Replace invalid sequences with U+FFFD and carry on.
    Lossy,
}

/// The extraction-only subset of [`AnalyzerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    pub text_decoding: TextDecoding,
    /// Reject files larger than this many bytes. Default: no limit.
    pub max_file_bytes: Option<u64>,
    /// Reject PDFs with more pages than this. Default: no limit.
    pub max_pdf_pages: Option<usize>,
    /// User password for encrypted PDFs.
    pub pdf_password: Option<String>,
    /// Directory holding the pdfium shared library. Falls back to `./` and
    /// then the system library path.
    pub pdfium_lib_path: Option<PathBuf>,
}

/// Configuration for analysing one or more documents.
///
/// # Example
/// ```rust
/// use ledgerlens::{AnalyzerConfig, Language};
///
/// let config = AnalyzerConfig::builder()
///     .api_key("test-key")
///     .language(Language::En)
///     .max_pdf_pages(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.language, Language::En);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Provider name: `"gemini"` (native client) or any name understood by
    /// `edgequake_llm::ProviderFactory` (`"openai"`, `"anthropic"`, …).
    pub provider_name: String,

    /// Model identifier. If None, uses [`DEFAULT_GEMINI_MODEL`] for Gemini and
    /// the factory default otherwise.
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn AnalysisProvider>>,

    /// Credential for the native Gemini client.
    pub api_key: Option<ApiKey>,

    /// Override of the Gemini REST base URL (proxies, tests).
    pub api_base_url: Option<String>,

    /// Sampling temperature. None leaves the provider default.
    pub temperature: Option<f32>,

    /// Cap on generated tokens. None leaves the provider default.
    pub max_output_tokens: Option<usize>,

    /// Upper bound on the provider round trip, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Language the report must be written in. Default: [`Language::Zh`].
    pub language: Language,

    /// Custom instruction. `{language}` is replaced by the language name.
    pub system_prompt: Option<String>,

    pub extraction: ExtractionOptions,

    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: None,
            provider: None,
            api_key: None,
            api_base_url: None,
            temperature: None,
            max_output_tokens: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            language: Language::default(),
            system_prompt: None,
            extraction: ExtractionOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn AnalysisProvider>"))
            .field("api_key", &self.api_key)
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("language", &self.language)
            .field("extraction", &self.extraction)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder with default values.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Create a builder pre-filled from the process environment.
    ///
    /// Reads the credential from `GEMINI_API_KEY` (falling back to `API_KEY`),
    /// plus `LEDGERLENS_PROVIDER`, `LEDGERLENS_MODEL` and
    /// `LEDGERLENS_PDFIUM_LIB_PATH`. This is the only place the library looks
    /// at the environment.
    pub fn builder_from_env() -> AnalyzerConfigBuilder {
        Self::builder_from_lookup(|name| std::env::var(name).ok())
    }

    /// Shorthand for `builder_from_env().build()`.
    pub fn from_env() -> Result<Self, LedgerLensError> {
        Self::builder_from_env().build()
    }

    fn builder_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnalyzerConfigBuilder {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(key) = API_KEY_ENV_VARS.iter().find_map(|name| non_empty(*name)) {
            builder = builder.api_key(key);
        }
        if let Some(provider) = non_empty("LEDGERLENS_PROVIDER") {
            builder = builder.provider_name(provider);
        }
        if let Some(model) = non_empty("LEDGERLENS_MODEL") {
            builder = builder.model(model);
        }
        if let Some(path) = non_empty("LEDGERLENS_PDFIUM_LIB_PATH") {
            builder = builder.pdfium_lib_path(path);
        }
        builder
    }

    /// The model that will actually be requested for the configured provider.
    ///
    /// Providers without a vision-capable default here fall through to the
    /// factory's own choice.
    pub fn effective_model(&self) -> Option<&str> {
        if let Some(m) = self.model.as_deref() {
            return Some(m);
        }
        match self.provider_name.as_str() {
            DEFAULT_PROVIDER => Some(DEFAULT_GEMINI_MODEL),
            "openai" => Some("gpt-4.1-mini"),
            "anthropic" => Some("claude-sonnet-4-20250514"),
            "mistral" => Some("pixtral-12b-2409"),
            "ollama" => Some("llava"),
            _ => None,
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into().trim().to_ascii_lowercase();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(ApiKey::new(key));
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn text_decoding(mut self, decoding: TextDecoding) -> Self {
        self.config.extraction.text_decoding = decoding;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.extraction.max_file_bytes = Some(bytes);
        self
    }

    pub fn max_pdf_pages(mut self, pages: usize) -> Self {
        self.config.extraction.max_pdf_pages = Some(pages);
        self
    }

    pub fn pdf_password(mut self, password: impl Into<String>) -> Self {
        self.config.extraction.pdf_password = Some(password.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.extraction.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, LedgerLensError> {
        let c = &self.config;
        if c.provider.is_none() && c.provider_name.is_empty() {
            return Err(LedgerLensError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(LedgerLensError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(LedgerLensError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.extraction.max_pdf_pages == Some(0) {
            return Err(LedgerLensError::InvalidConfig(
                "max PDF pages must be ≥ 1".into(),
            ));
        }
        if c.extraction.max_file_bytes == Some(0) {
            return Err(LedgerLensError::InvalidConfig(
                "max file size must be ≥ 1 byte".into(),
            ));
        }
        if c.max_output_tokens == Some(0) {
            return Err(LedgerLensError::InvalidConfig(
                "max output tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
