//! JSON file sink: appends task records to a JSON array on disk.
//!
//! Existing arrays are read, extended, and rewritten. A file that holds
//! anything other than a JSON array is never overwritten.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::fs;
use tracing::info;

use crate::error::SinkError;
use crate::extraction::TaskRecord;
use crate::store::TaskSink;

/// Default file for interactively saved tasks.
pub const DEFAULT_TASKS_FILE: &str = "extracted_tasks.json";

/// Where each batch's records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLayout {
    /// Every batch appends to the same file.
    SingleFile(PathBuf),
    /// One `tasks_batch_{n}_{timestamp}.json` file per batch in `dir`.
    PerBatch { dir: PathBuf },
}

/// File-backed task sink.
pub struct JsonFileSink {
    layout: OutputLayout,
}

impl JsonFileSink {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn single_file(path: impl Into<PathBuf>) -> Self {
        Self::new(OutputLayout::SingleFile(path.into()))
    }

    pub fn per_batch(dir: impl Into<PathBuf>) -> Self {
        Self::new(OutputLayout::PerBatch { dir: dir.into() })
    }

    /// File that batch `batch` (1-based) is written to at time `now`.
    pub fn path_for(&self, batch: usize, now: DateTime<Local>) -> PathBuf {
        match &self.layout {
            OutputLayout::SingleFile(path) => path.clone(),
            OutputLayout::PerBatch { dir } => dir.join(format!(
                "tasks_batch_{batch}_{}.json",
                now.format("%Y%m%d_%H%M%S")
            )),
        }
    }
}

#[async_trait]
impl TaskSink for JsonFileSink {
    async fn append(&self, batch: usize, tasks: &[TaskRecord]) -> Result<PathBuf, SinkError> {
        let path = self.path_for(batch, Local::now());
        append_tasks(&path, tasks).await?;
        Ok(path)
    }
}

/// Append `tasks` to the JSON array stored at `path`, creating it if missing.
pub async fn append_tasks(path: &Path, tasks: &[TaskRecord]) -> Result<(), SinkError> {
    let mut records = read_existing(path).await?;
    for task in tasks {
        records.push(serde_json::to_value(task)?);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(&Value::Array(records))?;
    fs::write(path, content).await?;

    info!(path = %path.display(), added = tasks.len(), "Tasks saved");
    Ok(())
}

/// Existing records at `path`; a missing or blank file is an empty array.
async fn read_existing(path: &Path) -> Result<Vec<Value>, SinkError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(_) => Err(SinkError::NotAnArray {
            path: path.display().to_string(),
        }),
        Err(e) => Err(SinkError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}
