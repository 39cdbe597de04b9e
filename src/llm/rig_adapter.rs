//! Bridges rig-core completion models to the `LlmProvider` trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// Adapter over any rig `CompletionModel` (Anthropic, OpenAI).
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        // rig does not expose pricing; log zero cost rather than guess.
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = AgentBuilder::new(self.model.clone());
        if let Some(system) = request.system_text() {
            builder = builder.preamble(&system);
        }
        if let Some(t) = request.temperature {
            builder = builder.temperature(f64::from(t));
        }
        if let Some(m) = request.max_tokens {
            builder = builder.max_tokens(u64::from(m));
        }
        let agent = builder.build();

        let prompt = request.prompt_text();
        let content = agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| classify_rig_error(&self.model_name, &e.to_string()))?;

        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

/// rig flattens provider errors into strings; recover the rate-limit signal from the text.
fn classify_rig_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("overloaded")
    {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401") || lower.contains("authentication") {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit_messages() {
        for msg in [
            "ProviderError: 429 Too Many Requests",
            "rate_limit_error: Number of request tokens has exceeded your per-minute rate limit",
            "Overloaded",
        ] {
            assert!(classify_rig_error("claude", msg).is_rate_limited(), "{msg}");
        }
    }

    #[test]
    fn classify_other_messages() {
        assert!(matches!(
            classify_rig_error("gpt-4o", "HttpError: 401 Unauthorized"),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_rig_error("gpt-4o", "JsonError: expected value"),
            LlmError::RequestFailed { .. }
        ));
    }
}
