//! Google Gemini provider over the `generateContent` REST endpoint.
//!
//! HTTP 429 (and `RESOURCE_EXHAUSTED` bodies) surface as
//! `LlmError::RateLimited` so the extractor can back off.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "gemini";

/// Gemini completion provider.
pub struct GeminiProvider {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the provider at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_url(&self, suffix: &str) -> String {
        format!("{}/v1beta/models/{}{suffix}", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        // gemini-2.0-flash list price: $0.10 / $0.40 per million tokens
        (dec!(0.0000001), dec!(0.0000004))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_request_body(&request);

        let resp = self
            .client
            .post(self.model_url(":generateContent"))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let retry_after = parse_retry_after(resp.headers());
        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.into(),
            reason: format!("failed to read body: {e}"),
        })?;

        if !status.is_success() {
            return Err(classify_error(status, retry_after, &text));
        }

        parse_response(&text)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let resp = self
            .client
            .get(self.model_url(""))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let retry_after = parse_retry_after(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            Err(classify_error(status, retry_after, &text))
        }
    }
}

/// Build the `generateContent` JSON body.
fn build_request_body(request: &CompletionRequest) -> serde_json::Value {
    let mut generation_config = serde_json::Map::new();
    generation_config.insert("responseMimeType".into(), json!("text/plain"));
    if let Some(t) = request.temperature {
        generation_config.insert("temperature".into(), json!(t));
    }
    if let Some(p) = request.top_p {
        generation_config.insert("topP".into(), json!(p));
    }
    if let Some(k) = request.top_k {
        generation_config.insert("topK".into(), json!(k));
    }
    if let Some(m) = request.max_tokens {
        generation_config.insert("maxOutputTokens".into(), json!(m));
    }

    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt_text() }]
        }],
        "generationConfig": generation_config,
    });
    if let Some(system) = request.system_text() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn classify_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return LlmError::RateLimited {
            provider: PROVIDER.into(),
            retry_after,
        };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return LlmError::AuthFailed {
            provider: PROVIDER.into(),
        };
    }
    let preview: String = body.chars().take(300).collect();
    LlmError::RequestFailed {
        provider: PROVIDER.into(),
        reason: format!("HTTP {status}: {preview}"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Parse a successful `generateContent` body into a completion response.
fn parse_response(text: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: GenerateContentResponse = serde_json::from_str(text)?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: "no candidates in response".into(),
        })?;

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    };

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        input_tokens,
        output_tokens,
        finish_reason,
        response_id: parsed.response_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[test]
    fn request_body_carries_sampling_and_system_instruction() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("extract tasks"),
            ChatMessage::user("Email:\nhello"),
        ])
        .with_temperature(0.1)
        .with_top_p(0.95)
        .with_top_k(64)
        .with_max_tokens(8192);

        let body = build_request_body(&req);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Email:\nhello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "extract tasks");
        let cfg = &body["generationConfig"];
        assert_eq!(cfg["responseMimeType"], "text/plain");
        assert_eq!(cfg["topK"], 64);
        assert_eq!(cfg["maxOutputTokens"], 8192);
        assert!((cfg["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn request_body_without_system_or_sampling() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let body = build_request_body(&req);
        assert!(body.get("systemInstruction").is_none());
        let cfg = body["generationConfig"].as_object().unwrap();
        assert_eq!(cfg.len(), 1);
    }

    #[test]
    fn parse_response_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "[{\"a\":"}, {"text": "1}]"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30, "totalTokenCount": 150},
            "responseId": "abc"
        }"#;
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.content, r#"[{"a":1}]"#);
        assert_eq!(resp.input_tokens, 120);
        assert_eq!(resp.output_tokens, 30);
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.response_id.as_deref(), Some("abc"));
    }

    #[test]
    fn parse_response_without_candidates_is_invalid() {
        let err = parse_response(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn parse_response_rejects_non_json() {
        assert!(matches!(parse_response("<html>"), Err(LlmError::Json(_))));
    }

    #[test]
    fn classify_rate_limit() {
        let err = classify_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            "",
        );
        match err {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }

        let body = r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error(StatusCode::BAD_REQUEST, None, body).is_rate_limited());
    }

    #[test]
    fn classify_auth_and_other() {
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, None, ""),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_error(StatusCode::INTERNAL_SERVER_ERROR, None, "boom"),
            LlmError::RequestFailed { .. }
        ));
    }

    #[test]
    fn model_url_trims_trailing_slash() {
        let provider = GeminiProvider::new(SecretString::from("k"), "gemini-2.0-flash")
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            provider.model_url(":generateContent"),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
