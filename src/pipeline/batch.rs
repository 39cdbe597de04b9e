//! Batch orchestrator: fetch recent emails, extract tasks, save per batch.
//!
//! Strictly sequential. Sleeps between emails and (longer) between batches
//! keep the call rate under the generation service's limits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::extraction::{TaskExtractor, TaskRecord};
use crate::mail::MailSource;
use crate::store::TaskSink;

/// Throttling and size knobs for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Emails per batch.
    pub batch_size: usize,
    /// Pause between emails of the same batch.
    pub email_delay: Duration,
    /// Pause between batches; `None` means twice `email_delay`.
    pub batch_delay: Option<Duration>,
    /// Upper bound on emails fetched per run.
    pub max_emails: usize,
    /// How far back to look for emails.
    pub window: chrono::Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            email_delay: Duration::from_secs(5),
            batch_delay: None,
            max_emails: 10,
            window: chrono::Duration::days(7),
        }
    }
}

impl BatchConfig {
    pub fn effective_batch_delay(&self) -> Duration {
        self.batch_delay
            .unwrap_or_else(|| self.email_delay.saturating_mul(2))
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub emails_processed: usize,
    pub batches: usize,
    /// Every task found, in email order.
    pub tasks: Vec<TaskRecord>,
    /// Files written, one per batch that produced tasks.
    pub saved_to: Vec<PathBuf>,
    /// Batches whose tasks could not be saved.
    pub save_failures: usize,
    /// Set when the mail fetch failed and nothing was processed.
    pub fetch_error: Option<String>,
}

/// Sequential driver over mail source, extractor, and sink.
pub struct BatchProcessor {
    mail: Arc<dyn MailSource>,
    extractor: TaskExtractor,
    sink: Arc<dyn TaskSink>,
    config: BatchConfig,
    user_email: Option<String>,
}

impl BatchProcessor {
    pub fn new(
        mail: Arc<dyn MailSource>,
        extractor: TaskExtractor,
        sink: Arc<dyn TaskSink>,
        config: BatchConfig,
    ) -> Self {
        Self {
            mail,
            extractor,
            sink,
            config,
            user_email: None,
        }
    }

    /// The mailbox owner's address, passed to the model as context.
    pub fn with_user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email;
        self
    }

    /// Run one pass over the most recent emails.
    ///
    /// Never fails: a mail fetch failure yields an empty report with
    /// `fetch_error` set, and extraction or save failures are logged while
    /// the run carries on.
    pub async fn run(&self) -> BatchReport {
        let batch_size = self.config.batch_size.max(1);
        let batch_delay = self.config.effective_batch_delay();
        info!(
            batch_size,
            email_delay_secs = self.config.email_delay.as_secs(),
            batch_delay_secs = batch_delay.as_secs(),
            max_emails = self.config.max_emails,
            "Starting batch processing"
        );

        let mut report = BatchReport::default();
        let emails = match self
            .mail
            .fetch_recent(self.config.window, self.config.max_emails)
            .await
        {
            Ok(emails) => emails,
            Err(e) => {
                error!(source = self.mail.name(), error = %e, "Mail fetch failed, no emails processed");
                report.fetch_error = Some(e.to_string());
                return report;
            }
        };

        if emails.is_empty() {
            info!("No emails found to process");
            return report;
        }

        let total_batches = emails.len().div_ceil(batch_size);
        info!(
            emails = emails.len(),
            batches = total_batches,
            "Processing emails in batches"
        );

        for (i, batch) in emails.chunks(batch_size).enumerate() {
            let batch_number = i + 1;
            info!(batch = batch_number, emails = batch.len(), "Processing batch");

            let mut batch_tasks = Vec::new();
            for (j, email) in batch.iter().enumerate() {
                info!(
                    email_id = %email.id,
                    sender = %email.sender_address(),
                    subject = %email.subject,
                    "Processing email"
                );

                let metadata = email.metadata(self.user_email.as_deref());
                let tasks = self
                    .extractor
                    .extract(&email.content(), Some(&metadata))
                    .await;
                report.emails_processed += 1;

                if tasks.is_empty() {
                    info!(email_id = %email.id, "No tasks found");
                } else {
                    info!(email_id = %email.id, count = tasks.len(), "Found tasks");
                    batch_tasks.extend(tasks);
                }

                if j + 1 < batch.len() {
                    debug!(
                        delay_secs = self.config.email_delay.as_secs(),
                        "Waiting before next email"
                    );
                    tokio::time::sleep(self.config.email_delay).await;
                }
            }

            if !batch_tasks.is_empty() {
                match self.sink.append(batch_number, &batch_tasks).await {
                    Ok(path) => report.saved_to.push(path),
                    Err(e) => {
                        error!(batch = batch_number, error = %e, "Failed to save batch tasks");
                        report.save_failures += 1;
                    }
                }
                report.tasks.extend(batch_tasks);
            }
            report.batches += 1;

            if batch_number < total_batches {
                info!(
                    batch = batch_number,
                    delay_secs = batch_delay.as_secs(),
                    "Completed batch, waiting before next batch"
                );
                tokio::time::sleep(batch_delay).await;
            }
        }

        info!(
            emails = report.emails_processed,
            batches = report.batches,
            tasks = report.tasks.len(),
            "Batch processing complete"
        );
        report
    }
}
