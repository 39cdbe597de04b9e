//! Email-to-task pipelines.
//!
//! Both entry points run strictly sequentially:
//! 1. `MailSource::fetch_recent()`: newest emails in the window
//! 2. `TaskExtractor::extract()`: one model call per email, with backoff
//! 3. `TaskSink::append()`: validated records appended to JSON
//!
//! [`batch`] processes everything unattended; [`interactive`] asks before
//! each extraction and each save.

pub mod batch;
pub mod display;
pub mod interactive;

pub use batch::{BatchConfig, BatchProcessor, BatchReport};
pub use interactive::{InteractiveReport, InteractiveSession};
