//! Adapter over `edgequake_llm::LLMProvider`.
//!
//! The chat providers behind edgequake-llm have no portable way to declare a
//! response schema, so the schema is sent as a system message and the answer
//! still goes through [`crate::schema::parse_response`] like any other.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisFailure;
use crate::prompts::schema_instruction;
use crate::provider::{AnalysisProvider, ProviderRequest, ProviderResponse};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tracing::debug;

pub struct EdgequakeProvider {
    name: String,
    llm: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl EdgequakeProvider {
    pub fn new(name: impl Into<String>, llm: Arc<dyn LLMProvider>, config: &AnalyzerConfig) -> Self {
        Self {
            name: name.into(),
            llm,
            options: build_options(config),
        }
    }
}

/// Build `CompletionOptions` from the analyzer config.
fn build_options(config: &AnalyzerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_output_tokens,
        ..Default::default()
    }
}

/// System message carrying the schema, then the instruction as the user turn
/// with the image attached when there is one.
pub fn build_messages(request: &ProviderRequest) -> Vec<ChatMessage> {
    let system = ChatMessage::system(schema_instruction(&request.schema));
    let user = match &request.image {
        Some(image) => ChatMessage::user_with_images(
            request.instruction.as_str(),
            vec![ImageData::new(image.data.clone(), image.mime_type.clone())],
        ),
        None => ChatMessage::user(request.instruction.as_str()),
    };
    vec![system, user]
}

/// Sort an edgequake-llm error into the shared failure taxonomy.
///
/// The error type is not matched on directly; its rendered message is
/// stable enough across providers to recognise auth, quota and timeouts.
pub fn classify_llm_error(provider: &str, message: &str) -> AnalysisFailure {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401") || lower.contains("403") || lower.contains("unauthorized") || lower.contains("api key") {
        AnalysisFailure::Auth {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else if lower.contains("429") || lower.contains("rate limit") {
        AnalysisFailure::RateLimited {
            provider: provider.to_string(),
            retry_after_secs: None,
        }
    } else if lower.contains("connection") || lower.contains("dns") || lower.contains("network") {
        AnalysisFailure::Transport(message.to_string())
    } else {
        AnalysisFailure::from_provider_message(None, message)
    }
}

#[async_trait]
impl AnalysisProvider for EdgequakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, AnalysisFailure> {
        let messages = build_messages(request);
        let response = self
            .llm
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_llm_error(&self.name, &e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        Ok(ProviderResponse {
            text: response.content,
            input_tokens: Some(response.prompt_tokens as u64),
            output_tokens: Some(response.completion_tokens as u64),
        })
    }
}
