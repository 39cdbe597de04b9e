//! Configuration types.
//!
//! Everything is read once into an [`AppConfig`] and passed down
//! explicitly. [`AppConfig::from_lookup`] takes any key lookup so tests do
//! not need to touch the process environment.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::mail::NylasConfig;
use crate::mail::nylas::DEFAULT_API_URI;
use crate::pipeline::batch::BatchConfig;

/// Longest accepted look-back window.
const WINDOW_DAYS: RangeInclusive<i64> = 1..=3650;
/// Longest accepted pause, in seconds, between emails or batches.
const DELAY_SECS: RangeInclusive<u64> = 0..=86_400;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub mail: NylasConfig,
    /// The mailbox owner's address, used to decide who is responsible.
    pub user_email: Option<String>,
    pub batch: BatchConfig,
    /// Directory for per-batch task files and the interactive tasks file.
    pub output_dir: PathBuf,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from a key lookup, failing on the first problem.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Self::load(lookup).map_err(|mut errors| errors.remove(0))
    }

    /// Build config from a key lookup, collecting every problem.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = parsed(&get, "TASKS_LLM_BACKEND", &mut errors).unwrap_or(LlmBackend::Gemini);
        let model = get("TASKS_LLM_MODEL").unwrap_or_else(|| backend.default_model().to_string());
        let llm_key = required(
            &get,
            backend.api_key_var(),
            "Set it to the API key of the configured LLM backend.",
            &mut errors,
        );

        let mail_key = required(&get, "NYLAS_API_KEY", "Set it to your Nylas API key.", &mut errors);
        let grant_id = required(
            &get,
            "NYLAS_GRANT_ID",
            "Set it to the Nylas grant ID of the mailbox to read.",
            &mut errors,
        );
        let api_uri = get("NYLAS_API_URI").unwrap_or_else(|| DEFAULT_API_URI.to_string());
        let user_email = get("NYLAS_USER_EMAIL");

        let defaults = BatchConfig::default();
        let batch_size = parsed::<usize>(&get, "TASKS_BATCH_SIZE", &mut errors)
            .unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            errors.push(ConfigError::InvalidValue {
                key: "TASKS_BATCH_SIZE".into(),
                message: "must be at least 1".into(),
            });
        }
        let email_delay = bounded(&get, "TASKS_EMAIL_DELAY_SECS", DELAY_SECS, &mut errors)
            .map(Duration::from_secs)
            .unwrap_or(defaults.email_delay);
        let batch_delay =
            bounded(&get, "TASKS_BATCH_DELAY_SECS", DELAY_SECS, &mut errors).map(Duration::from_secs);
        let max_emails = parsed::<usize>(&get, "TASKS_MAX_EMAILS", &mut errors)
            .unwrap_or(defaults.max_emails);
        let window = bounded(&get, "TASKS_WINDOW_DAYS", WINDOW_DAYS, &mut errors)
            .and_then(chrono::Duration::try_days)
            .unwrap_or(defaults.window);
        let output_dir = get("TASKS_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        match (llm_key, mail_key, grant_id) {
            (Some(llm_key), Some(mail_key), Some(grant_id)) if errors.is_empty() => Ok(Self {
                llm: LlmConfig {
                    backend,
                    api_key: SecretString::from(llm_key),
                    model,
                },
                mail: NylasConfig {
                    api_key: SecretString::from(mail_key),
                    api_uri,
                    grant_id,
                },
                user_email,
                batch: BatchConfig {
                    batch_size,
                    email_delay,
                    batch_delay,
                    max_emails,
                    window,
                },
                output_dir,
            }),
            _ => Err(errors),
        }
    }
}

fn required(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    hint: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    let value = get(key);
    if value.is_none() {
        errors.push(ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        });
    }
    value
}

fn parsed<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            });
            None
        }
    }
}

/// Add or replace `KEY="value"` entries in a dotenv file, keeping every
/// other line. The file is created when missing.
pub fn set_env_entries(path: &Path, entries: &[(String, String)]) -> std::io::Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let replaced = |line: &str| {
        let line = line.trim_start();
        let line = line.strip_prefix("export ").unwrap_or(line);
        line.split_once('=')
            .is_some_and(|(key, _)| entries.iter().any(|(k, _)| k == key.trim()))
    };

    let mut out: Vec<String> = existing
        .lines()
        .filter(|line| !replaced(line))
        .map(str::to_string)
        .collect();
    for (key, value) in entries {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$");
        out.push(format!("{key}=\"{escaped}\""));
    }

    let mut content = out.join("\n");
    content.push('\n');
    std::fs::write(path, content)
}

/// Like [`parsed`], but values outside `range` are rejected too.
fn bounded<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    range: RangeInclusive<T>,
    errors: &mut Vec<ConfigError>,
) -> Option<T>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = parsed::<T>(get, key, errors)?;
    if range.contains(&value) {
        return Some(value);
    }
    errors.push(ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!(
            "'{value}': must be between {} and {}",
            range.start(),
            range.end()
        ),
    });
    None
}
