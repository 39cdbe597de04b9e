//! Mail provider access.

pub mod email;
pub mod nylas;

pub use email::{Email, Participant};
pub use nylas::{NylasClient, NylasConfig};

use async_trait::async_trait;
use chrono::Duration;

use crate::error::MailError;

/// Source of recent emails. Pure I/O, no business logic.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Provider name, for logging.
    fn name(&self) -> &str;

    /// Emails received within `window`, newest first, at most `limit`.
    async fn fetch_recent(&self, window: Duration, limit: usize) -> Result<Vec<Email>, MailError>;

    /// Cheap reachability and credential check.
    async fn health_check(&self) -> Result<(), MailError>;
}
