//! Native client for the Gemini `generateContent` REST endpoint.
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: <key>
//!
//! { "contents": [{ "parts": [ {"inlineData": {...}}?, {"text": "..."} ] }],
//!   "generationConfig": { "responseMimeType": "application/json",
//!                         "responseSchema": {...} } }
//! ```
//!
//! The answer text is the concatenation of `candidates[0].content.parts[].text`.
//! HTTP failures are classified into [`AnalysisFailure`] variants; nothing is
//! retried.

use crate::config::ApiKey;
use crate::error::{AnalysisFailure, LedgerLensError};
use crate::provider::{AnalysisProvider, ProviderRequest, ProviderResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    timeout_secs: u64,
    temperature: Option<f32>,
    max_output_tokens: Option<usize>,
}

impl GeminiProvider {
    pub fn new(api_key: ApiKey, model: impl Into<String>, timeout_secs: u64) -> Result<Self, LedgerLensError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LedgerLensError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs,
            temperature: None,
            max_output_tokens: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn with_base_url_opt(self, base_url: Option<&str>) -> Self {
        match base_url {
            Some(url) => self.with_base_url(url),
            None => self,
        }
    }

    pub fn with_generation(mut self, temperature: Option<f32>, max_output_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Request body for `request`. Pure, so the wire shape is testable.
    pub fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            parts.push(json!({
                "inlineData": { "mimeType": image.mime_type, "data": image.data }
            }));
        }
        parts.push(json!({ "text": request.instruction }));

        let mut generation = Map::new();
        generation.insert("responseMimeType".into(), json!("application/json"));
        generation.insert("responseSchema".into(), request.schema.clone());
        if let Some(t) = self.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(n) = self.max_output_tokens {
            generation.insert("maxOutputTokens".into(), json!(n));
        }

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": Value::Object(generation),
        })
    }

    fn classify_send_error(&self, e: reqwest::Error) -> AnalysisFailure {
        if e.is_timeout() {
            AnalysisFailure::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            AnalysisFailure::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

/// `{"error": {"message": "..."}}`, the envelope Google APIs use for failures.
fn error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}

/// Map a non-2xx response onto [`AnalysisFailure`].
pub fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> AnalysisFailure {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisFailure::Auth {
            provider: "gemini".into(),
            detail: message.unwrap_or_else(|| status.to_string()),
        },
        StatusCode::TOO_MANY_REQUESTS => AnalysisFailure::RateLimited {
            provider: "gemini".into(),
            retry_after_secs: retry_after,
        },
        _ => match message {
            Some(m) => AnalysisFailure::from_provider_message(Some(status.as_u16()), m),
            None => AnalysisFailure::Unknown,
        },
    }
}

/// Pull the answer text out of a successful response body.
fn answer_from_body(body: &str) -> Result<ProviderResponse, AnalysisFailure> {
    // A 200 that is not a generateContent envelope is still a provider answer
    // we cannot use; treat it as a structural failure.
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AnalysisFailure::InvalidResponse {
            detail: format!("unexpected generateContent envelope: {e}"),
        })?;

    let usage = parsed.usage_metadata.as_ref();
    let input_tokens = usage.and_then(|u| u.prompt_token_count);
    let output_tokens = usage.and_then(|u| u.candidates_token_count);

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("Request blocked by Gemini: {r}"))
            .unwrap_or_default();
        return Err(AnalysisFailure::from_provider_message(None, reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason {
            warn!("Gemini returned no text (finishReason={})", reason);
        }
    }

    Ok(ProviderResponse {
        text,
        input_tokens,
        output_tokens,
    })
}

#[async_trait]
impl AnalysisProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, AnalysisFailure> {
        let body = self.build_request_body(request);
        debug!(
            "POST {} ({} chars instruction, image: {})",
            self.endpoint(),
            request.instruction.len(),
            request.image.is_some()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        if !status.is_success() {
            warn!("Gemini returned HTTP {}", status);
            return Err(classify_status(status, retry_after, &text));
        }

        answer_from_body(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InlineImage;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(ApiKey::new("k"), "gemini-3-pro-preview", 5).unwrap()
    }

    fn request(image: Option<InlineImage>) -> ProviderRequest {
        ProviderRequest {
            instruction: "Analyze.".into(),
            image,
            schema: json!({"type": "OBJECT"}),
        }
    }

    #[test]
    fn image_request_puts_inline_data_before_text() {
        let body = provider().build_request_body(&request(Some(InlineImage {
            mime_type: "image/jpeg".into(),
            data: "AAAA".into(),
        })));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AAAA");
        assert_eq!(parts[1]["text"], "Analyze.");
    }

    #[test]
    fn text_request_has_single_part_and_declares_schema() {
        let body = provider().build_request_body(&request(None));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn generation_overrides_are_included() {
        let body = provider()
            .with_generation(Some(0.5), Some(2048))
            .build_request_body(&request(None));
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn endpoint_uses_model_and_trimmed_base() {
        let p = provider().with_base_url("http://127.0.0.1:9/v1beta/");
        assert_eq!(p.model(), "gemini-3-pro-preview");
        assert_eq!(
            p.endpoint(),
            "http://127.0.0.1:9/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[test]
    fn status_classification() {
        let body = r#"{"error":{"code":500,"message":"backend overloaded"}}"#;
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, None, body).message(),
            "backend overloaded"
        );
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, body),
            AnalysisFailure::Auth { .. }
        ));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            AnalysisFailure::RateLimited {
                provider: "gemini".into(),
                retry_after_secs: Some(7)
            }
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, None, "<html>"),
            AnalysisFailure::Unknown
        );
    }

    #[test]
    fn answer_concatenates_parts_and_reads_usage() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{"text": "{\"a\":"}, {"text": "1}"}] } }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 4 }
        })
        .to_string();
        let answer = answer_from_body(&body).unwrap();
        assert_eq!(answer.text, "{\"a\":1}");
        assert_eq!(answer.input_tokens, Some(10));
        assert_eq!(answer.output_tokens, Some(4));
    }

    #[test]
    fn blocked_prompt_surfaces_reason() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = answer_from_body(body).unwrap_err();
        assert_eq!(err.message(), "Request blocked by Gemini: SAFETY");
    }

    #[test]
    fn no_candidates_and_no_reason_is_unknown() {
        assert_eq!(answer_from_body("{}").unwrap_err(), AnalysisFailure::Unknown);
    }
}
