//! Persistence for extracted tasks.

pub mod json_file;

pub use json_file::{DEFAULT_TASKS_FILE, JsonFileSink, OutputLayout};

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::extraction::TaskRecord;

/// Destination for extracted task records.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Append one batch (1-based `batch`). Returns where it was written.
    async fn append(&self, batch: usize, tasks: &[TaskRecord]) -> Result<PathBuf, SinkError>;
}
