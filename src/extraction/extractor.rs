//! Task extractor: prompt, call the model, decode, with rate-limit backoff.
//!
//! Every failure mode ends in an empty task list for the caller. The
//! detailed [`ExtractionOutcome`] and the log line for each call keep the
//! failure modes apart for an operator.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::LlmError;
use crate::extraction::decode::{DecodedTasks, decode_response};
use crate::extraction::prompt::{EmailMetadata, build_system_prompt, build_user_prompt};
use crate::extraction::task::TaskRecord;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use crate::llm::retry::RetryPolicy;

/// Low temperature keeps the JSON format stable across calls.
const EXTRACTION_TEMPERATURE: f32 = 0.1;
const EXTRACTION_TOP_P: f32 = 0.95;
const EXTRACTION_TOP_K: u32 = 64;
const EXTRACTION_MAX_TOKENS: u32 = 8192;

/// How one extraction call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// The model answered with a decodable task list (possibly empty).
    Extracted(DecodedTasks),
    /// The answer was not JSON, or not a task list. `truncated` is set when
    /// the model stopped at the token limit.
    Malformed { reason: String, truncated: bool },
    /// Every attempt was throttled.
    RateLimited { attempts: u32 },
    /// Any other service failure.
    Failed { reason: String },
}

impl ExtractionOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extracted(decoded) if decoded.tasks.is_empty() => "no_tasks",
            Self::Extracted(_) => "extracted",
            Self::Malformed { .. } => "malformed",
            Self::RateLimited { .. } => "rate_limited",
            Self::Failed { .. } => "service_error",
        }
    }

    /// Collapse to the caller-facing result: valid tasks, or nothing.
    pub fn into_tasks(self) -> Vec<TaskRecord> {
        match self {
            Self::Extracted(decoded) => decoded.tasks,
            _ => Vec::new(),
        }
    }
}

enum CallError {
    Exhausted { attempts: u32 },
    Other(LlmError),
}

/// Extracts task records from email text with a generation service.
pub struct TaskExtractor {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl TaskExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Extract tasks. Failures and "no tasks" both come back as an empty vec.
    pub async fn extract(
        &self,
        email_text: &str,
        metadata: Option<&EmailMetadata>,
    ) -> Vec<TaskRecord> {
        self.extract_detailed(email_text, metadata)
            .await
            .into_tasks()
    }

    /// Extract tasks, keeping the reason when nothing came back.
    pub async fn extract_detailed(
        &self,
        email_text: &str,
        metadata: Option<&EmailMetadata>,
    ) -> ExtractionOutcome {
        let request = build_request(email_text, metadata);

        let response = match self.complete_with_backoff(request).await {
            Ok(response) => response,
            Err(CallError::Exhausted { attempts }) => {
                error!(
                    outcome = "rate_limited",
                    attempts,
                    model = self.llm.model_name(),
                    "Extraction gave up after repeated rate limiting"
                );
                return ExtractionOutcome::RateLimited { attempts };
            }
            Err(CallError::Other(e)) => {
                error!(
                    outcome = "service_error",
                    error = %e,
                    model = self.llm.model_name(),
                    "Extraction call failed"
                );
                return ExtractionOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let cost = response.cost(self.llm.cost_per_token());
        match decode_response(&response.content) {
            Ok(decoded) => {
                for (index, reason) in &decoded.rejected {
                    warn!(index, reason = %reason, "Dropping invalid task from model output");
                }
                if decoded.tasks.is_empty() {
                    info!(
                        outcome = "no_tasks",
                        rejected = decoded.rejected.len(),
                        %cost,
                        "Model found no valid tasks"
                    );
                } else {
                    info!(
                        outcome = "extracted",
                        tasks = decoded.tasks.len(),
                        rejected = decoded.rejected.len(),
                        input_tokens = response.input_tokens,
                        output_tokens = response.output_tokens,
                        %cost,
                        response_id = response.response_id.as_deref().unwrap_or("-"),
                        "Extracted tasks"
                    );
                }
                ExtractionOutcome::Extracted(decoded)
            }
            Err(e) => {
                let preview: String = response.content.chars().take(200).collect();
                let truncated = response.finish_reason == FinishReason::Length;
                warn!(
                    outcome = "malformed",
                    error = %e,
                    finish_reason = ?response.finish_reason,
                    truncated,
                    raw_response = %preview,
                    "Model output is not a task list"
                );
                ExtractionOutcome::Malformed {
                    reason: e.to_string(),
                    truncated,
                }
            }
        }
    }

    /// Send the request, backing off on rate limits only.
    async fn complete_with_backoff(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CallError> {
        let mut attempt: u32 = 0;
        loop {
            match self.llm.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(LlmError::RateLimited { retry_after, .. }) => {
                    attempt += 1;
                    if !self.retry.allows_retry(attempt) {
                        return Err(CallError::Exhausted { attempts: attempt });
                    }
                    let delay =
                        self.retry
                            .delay_with_hint(attempt - 1, retry_after, &mut rand::thread_rng());
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    debug!(attempt = attempt + 1, "Retrying extraction request");
                }
                Err(e) => return Err(CallError::Other(e)),
            }
        }
    }
}

fn build_request(email_text: &str, metadata: Option<&EmailMetadata>) -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system(build_system_prompt()),
        ChatMessage::user(build_user_prompt(email_text, metadata)),
    ])
    .with_temperature(EXTRACTION_TEMPERATURE)
    .with_top_p(EXTRACTION_TOP_P)
    .with_top_k(EXTRACTION_TOP_K)
    .with_max_tokens(EXTRACTION_MAX_TOKENS)
}
