//! Task extraction from email text.
//!
//! 1. `prompt`: system/user prompt construction
//! 2. `extractor`: model call with rate-limit backoff
//! 3. `decode`: pure parse of the model's text into candidates
//! 4. `task`: per-candidate validation into `TaskRecord`

pub mod decode;
pub mod extractor;
pub mod prompt;
pub mod task;

pub use decode::{DecodedTasks, MalformedResponse, decode_response};
pub use extractor::{ExtractionOutcome, TaskExtractor};
pub use prompt::EmailMetadata;
pub use task::{SchemaError, TaskRecord, TaskType, validate};
