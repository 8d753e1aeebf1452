//! Analysis orchestration: payload → provider request → validated result.
//!
//! All prompt text lives in [`crate::prompts`] and the response contract in
//! [`crate::schema`]; this module only wires them to an
//! [`AnalysisProvider`] and bounds the round trip.
//!
//! ## No retries
//!
//! Each call makes exactly one provider request. A failure of any kind,
//! including a well-formed answer of the wrong shape, is final and surfaces
//! as an [`AnalysisFailure`]. Recovery is the caller's decision.

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisFailure, LedgerLensError};
use crate::language::Language;
use crate::output::AnalysisResult;
use crate::pipeline::extract::ExtractionPayload;
use crate::progress::ProgressCallback;
use crate::prompts::{build_instruction, with_source_content};
use crate::provider::{resolve_provider, AnalysisProvider, InlineImage, ProviderRequest};
use crate::schema::{parse_response, response_schema};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub payload: ExtractionPayload,
    pub language: Language,
}

impl AnalysisRequest {
    pub fn new(payload: ExtractionPayload, language: Language) -> Self {
        Self { payload, language }
    }

    /// Provider request for this job.
    ///
    /// Images travel as inline data next to the bare instruction; text is
    /// appended to the instruction after the source-content separator.
    pub fn to_provider_request(&self, custom_prompt: Option<&str>) -> ProviderRequest {
        let instruction = build_instruction(self.language, custom_prompt);
        let (instruction, image) = match &self.payload {
            ExtractionPayload::Image { base64, mime_type } => (
                instruction,
                Some(InlineImage {
                    mime_type: mime_type.clone(),
                    data: base64.clone(),
                }),
            ),
            ExtractionPayload::Text { content } => (with_source_content(&instruction, content), None),
        };

        ProviderRequest {
            instruction,
            image,
            schema: response_schema(),
        }
    }
}

/// A validated result plus the token counts the provider reported.
#[derive(Debug, Clone)]
pub struct AnalysisWithUsage {
    pub result: AnalysisResult,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: u64,
}

/// Runs analysis requests against one provider.
#[derive(Clone)]
pub struct Analyzer {
    provider: Arc<dyn AnalysisProvider>,
    timeout_secs: u64,
    system_prompt: Option<String>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("provider", &self.provider.name())
            .field("timeout_secs", &self.timeout_secs)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl Analyzer {
    /// Wrap `provider` with the timeout, prompt and callback from `config`.
    pub fn new(provider: Arc<dyn AnalysisProvider>, config: &AnalyzerConfig) -> Self {
        Self {
            provider,
            timeout_secs: config.api_timeout_secs,
            system_prompt: config.system_prompt.clone(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve the provider named by `config` and wrap it.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, LedgerLensError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Analyse `payload`, writing the report in `language`.
    pub async fn analyze(
        &self,
        payload: &ExtractionPayload,
        language: Language,
    ) -> Result<AnalysisResult, AnalysisFailure> {
        self.analyze_with_usage(payload, language).await.map(|a| a.result)
    }

    /// Like [`Analyzer::analyze`], also returning token usage and timing.
    pub async fn analyze_with_usage(
        &self,
        payload: &ExtractionPayload,
        language: Language,
    ) -> Result<AnalysisWithUsage, AnalysisFailure> {
        let request = AnalysisRequest::new(payload.clone(), language)
            .to_provider_request(self.system_prompt.as_deref());

        if let Some(cb) = &self.progress {
            cb.on_analysis_start(language);
        }
        info!(
            "Analyzing {:?} payload ({} bytes) with '{}' in {}",
            payload.kind(),
            payload.len(),
            self.provider.name(),
            language.display_name()
        );

        let outcome = self.round_trip(&request).await;

        if let Some(cb) = &self.progress {
            cb.on_analysis_complete(outcome.is_ok());
        }
        outcome
    }

    async fn round_trip(&self, request: &ProviderRequest) -> Result<AnalysisWithUsage, AnalysisFailure> {
        let start = Instant::now();
        let limit = Duration::from_secs(self.timeout_secs);

        let response = tokio::time::timeout(limit, self.provider.generate(request))
            .await
            .map_err(|_| AnalysisFailure::Timeout {
                secs: self.timeout_secs,
            })?
            .inspect_err(|e| warn!("Provider '{}' failed: {}", self.provider.name(), e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Provider answered in {}ms: {} chars, tokens {:?}/{:?}",
            duration_ms,
            response.text.len(),
            response.input_tokens,
            response.output_tokens
        );

        let result = parse_response(&response.text).map_err(|e| {
            warn!("Rejected provider answer: {}", e);
            AnalysisFailure::InvalidResponse {
                detail: e.to_string(),
            }
        })?;

        Ok(AnalysisWithUsage {
            result,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::SOURCE_CONTENT_SEPARATOR;

    #[test]
    fn text_payload_is_appended_to_instruction() {
        let req = AnalysisRequest::new(
            ExtractionPayload::Text {
                content: "Revenue: 100\n".into(),
            },
            Language::En,
        )
        .to_provider_request(None);

        assert!(req.image.is_none());
        assert!(req.instruction.contains("MUST be in English."));
        assert!(req
            .instruction
            .ends_with(&format!("{SOURCE_CONTENT_SEPARATOR}Revenue: 100\n")));
        assert_eq!(req.schema, response_schema());
    }

    #[test]
    fn image_payload_travels_as_inline_data() {
        let req = AnalysisRequest::new(
            ExtractionPayload::Image {
                base64: "AAAA".into(),
                mime_type: "image/png".into(),
            },
            Language::Zh,
        )
        .to_provider_request(None);

        assert_eq!(
            req.image,
            Some(InlineImage {
                mime_type: "image/png".into(),
                data: "AAAA".into()
            })
        );
        assert!(!req.instruction.contains("Source Content"));
        assert!(req.instruction.contains("Chinese (Simplified)"));
    }

    #[test]
    fn custom_prompt_replaces_default() {
        let req = AnalysisRequest::new(
            ExtractionPayload::Text { content: "x".into() },
            Language::De,
        )
        .to_provider_request(Some("Kurz auf {language}."));
        assert_eq!(req.instruction, format!("Kurz auf German.{SOURCE_CONTENT_SEPARATOR}x"));
    }
}
