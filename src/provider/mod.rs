//! The seam between the analysis orchestrator and a generative model.
//!
//! An [`AnalysisProvider`] takes one [`ProviderRequest`] and performs exactly
//! one round trip. It does not retry, stream, cache or parse: the raw answer
//! text goes back to [`crate::pipeline::llm::Analyzer`], which owns schema
//! validation.
//!
//! Two implementations ship with the crate:
//!
//! * [`GeminiProvider`] talks to the Gemini `generateContent` REST endpoint
//!   and declares the response schema natively (`responseSchema`).
//! * [`EdgequakeProvider`] adapts any `edgequake_llm::LLMProvider` (OpenAI,
//!   Anthropic, Mistral, Ollama, …); the schema travels inside the prompt.

pub mod edgequake;
pub mod gemini;

pub use edgequake::EdgequakeProvider;
pub use gemini::GeminiProvider;

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisFailure, LedgerLensError};
use async_trait::async_trait;
use edgequake_llm::ProviderFactory;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// An image attached to the request, as bare base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Everything a provider needs for one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// Full instruction text. For text payloads the document is already
    /// appended after the source-content separator.
    pub instruction: String,
    pub image: Option<InlineImage>,
    /// JSON schema the answer must satisfy.
    pub schema: Value,
}

/// Raw provider answer plus usage, when reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ProviderResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, AnalysisFailure>;
}

/// Pick the provider for `config`, from most to least specific.
///
/// 1. A pre-built provider in `config.provider` is used as-is.
/// 2. `"gemini"` builds the native client; it needs `config.api_key`.
/// 3. `"auto"` lets `ProviderFactory::from_env` pick whichever key is set.
/// 4. Any other name goes through `ProviderFactory::create_llm_provider`,
///    which reads that provider's own key variable.
pub fn resolve_provider(config: &AnalyzerConfig) -> Result<Arc<dyn AnalysisProvider>, LedgerLensError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.provider_name.as_str();
    match name {
        "gemini" => {
            let key = config.api_key.clone().ok_or_else(|| LedgerLensError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: "Set GEMINI_API_KEY (or API_KEY) to a Gemini API key.".to_string(),
            })?;
            let model = config
                .effective_model()
                .unwrap_or(crate::config::DEFAULT_GEMINI_MODEL);
            let provider = GeminiProvider::new(key, model, config.api_timeout_secs)?
                .with_base_url_opt(config.api_base_url.as_deref())
                .with_generation(config.temperature, config.max_output_tokens);
            info!("Using Gemini provider, model {}", provider.model());
            Ok(Arc::new(provider))
        }
        "auto" => {
            let (llm, _embedding) =
                ProviderFactory::from_env().map_err(|e| LedgerLensError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No provider could be auto-detected from the environment.\n\
                         Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                         Error: {e}"
                    ),
                })?;
            info!("Using provider auto-detected from the environment");
            Ok(Arc::new(EdgequakeProvider::new("auto", llm, config)))
        }
        other => {
            let model = config.effective_model().ok_or_else(|| {
                LedgerLensError::ProviderNotConfigured {
                    provider: other.to_string(),
                    hint: "No default model is known for this provider; pass --model.".to_string(),
                }
            })?;
            let llm = ProviderFactory::create_llm_provider(other, model).map_err(|e| {
                LedgerLensError::ProviderNotConfigured {
                    provider: other.to_string(),
                    hint: format!("{e}"),
                }
            })?;
            info!("Using provider '{}', model {}", other, model);
            Ok(Arc::new(EdgequakeProvider::new(other, llm, config)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned;

    #[async_trait]
    impl AnalysisProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _request: &ProviderRequest) -> Result<ProviderResponse, AnalysisFailure> {
            Ok(ProviderResponse::text("{}"))
        }
    }

    #[test]
    fn prebuilt_provider_wins() {
        let config = AnalyzerConfig::builder()
            .provider_name("openai")
            .provider(Arc::new(Canned))
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "canned");
    }

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = AnalyzerConfig::builder().build().unwrap();
        match resolve_provider(&config) {
            Err(LedgerLensError::ProviderNotConfigured { provider, hint }) => {
                assert_eq!(provider, "gemini");
                assert!(hint.contains("GEMINI_API_KEY"));
            }
            other => panic!("expected ProviderNotConfigured, got {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn gemini_with_key_builds_native_client() {
        let config = AnalyzerConfig::builder().api_key("k").build().unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn unknown_provider_without_model_is_not_configured() {
        let config = AnalyzerConfig::builder().provider_name("vllm").build().unwrap();
        assert!(matches!(
            resolve_provider(&config),
            Err(LedgerLensError::ProviderNotConfigured { .. })
        ));
    }
}
