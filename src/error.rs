//! Error types for inbox-tasks.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    /// The environment variable this error is about.
    pub fn key(&self) -> &str {
        match self {
            Self::MissingRequired { key, .. } | Self::InvalidValue { key, .. } => key,
        }
    }
}

/// Generation-service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Mail-service errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Mail provider rate limited")]
    RateLimited,

    #[error("Mail authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid response from mail provider: {0}")]
    InvalidResponse(String),
}

/// Task persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{path} does not hold a JSON array; refusing to overwrite it")]
    NotAnArray { path: String },

    #[error("{path} is not valid JSON ({reason}); refusing to overwrite it")]
    Corrupt { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mail fetch failed: {0}")]
    MailFetch(#[from] MailError),

    #[error("Saving tasks failed: {0}")]
    Save(#[from] SinkError),

    #[error("Console IO error: {0}")]
    Console(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
