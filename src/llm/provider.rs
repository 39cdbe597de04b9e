//! Provider-agnostic completion types and the `LlmProvider` trait.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A text completion request with sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// All system messages joined, if any.
    pub fn system_text(&self) -> Option<String> {
        join_role(&self.messages, Role::System)
    }

    /// All non-system messages joined.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn join_role(messages: &[ChatMessage], role: Role) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == role)
        .map(|m| m.content.as_str())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

/// Response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
    pub response_id: Option<String>,
}

impl CompletionResponse {
    /// Estimated dollar cost of this response under the given per-token prices.
    pub fn cost(&self, (input, output): (Decimal, Decimal)) -> Decimal {
        input * Decimal::from(self.input_tokens) + output * Decimal::from(self.output_tokens)
    }
}

/// A text-generation service.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// (input, output) price per token in dollars.
    fn cost_per_token(&self) -> (Decimal, Decimal);

    /// Run a single-shot completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Reachability check: a one-token completion, so bad keys and unknown
    /// models surface as errors. Providers with a status endpoint override it.
    async fn health_check(&self) -> Result<(), LlmError> {
        let request = CompletionRequest::new(vec![ChatMessage::user("ping")]).with_max_tokens(1);
        self.complete(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn request_builder_sets_sampling() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(0.1)
            .with_top_p(0.95)
            .with_top_k(64)
            .with_max_tokens(100);
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(req.top_p, Some(0.95));
        assert_eq!(req.top_k, Some(64));
        assert_eq!(req.max_tokens, Some(100));
    }

    #[test]
    fn request_splits_system_and_prompt_text() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(req.system_text().as_deref(), Some("be terse"));
        assert_eq!(req.prompt_text(), "first\n\nsecond");

        let no_system = CompletionRequest::new(vec![ChatMessage::user("x")]);
        assert!(no_system.system_text().is_none());
    }

    #[test]
    fn response_cost() {
        let resp = CompletionResponse {
            content: String::new(),
            input_tokens: 1_000,
            output_tokens: 500,
            finish_reason: FinishReason::Stop,
            response_id: None,
        };
        assert_eq!(resp.cost((dec!(0.000001), dec!(0.000004))), dec!(0.003));
    }

    /// Records requests and answers each with `result`.
    struct FixedLlm {
        result: Result<(), fn() -> LlmError>,
        requests: std::sync::Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            self.result.map_err(|make| make())?;
            Ok(CompletionResponse {
                content: "ok".into(),
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: FinishReason::Length,
                response_id: None,
            })
        }
    }

    #[tokio::test]
    async fn default_health_check_makes_a_real_call() {
        let llm = FixedLlm {
            result: Ok(()),
            requests: std::sync::Mutex::new(Vec::new()),
        };
        llm.health_check().await.unwrap();

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(1));
    }

    #[tokio::test]
    async fn default_health_check_reports_failures() {
        let llm = FixedLlm {
            result: Err(|| LlmError::AuthFailed {
                provider: "anthropic".into(),
            }),
            requests: std::sync::Mutex::new(Vec::new()),
        };
        let err = llm.health_check().await.unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }
}
