//! Interactive review: ask per email whether to extract, then whether to save.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::error::PipelineError;
use crate::extraction::{TaskExtractor, TaskRecord};
use crate::mail::MailSource;
use crate::pipeline::display::{format_email_summary, format_tasks};
use crate::store::TaskSink;

/// Pause after each extraction.
pub const DEFAULT_EXTRACTION_DELAY: Duration = Duration::from_secs(3);

/// What the user decided for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Quit,
}

impl Answer {
    /// Anything other than `y` or `q` means no.
    fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Self::Yes,
            "q" | "quit" => Self::Quit,
            _ => Self::No,
        }
    }
}

/// Outcome of one interactive session.
#[derive(Debug, Clone, Default)]
pub struct InteractiveReport {
    pub emails_shown: usize,
    /// Everything extracted, saved or not.
    pub extracted: Vec<TaskRecord>,
    /// Tasks written to the sink.
    pub saved: usize,
    /// Successful appends; the next one is numbered `saves + 1`.
    pub saves: usize,
}

/// Console review loop over recent emails.
pub struct InteractiveSession<R, W> {
    mail: Arc<dyn MailSource>,
    extractor: TaskExtractor,
    sink: Arc<dyn TaskSink>,
    window: chrono::Duration,
    limit: usize,
    delay: Duration,
    user_email: Option<String>,
    input: R,
    output: W,
}

impl<R, W> InteractiveSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        mail: Arc<dyn MailSource>,
        extractor: TaskExtractor,
        sink: Arc<dyn TaskSink>,
        input: R,
        output: W,
    ) -> Self {
        Self {
            mail,
            extractor,
            sink,
            window: chrono::Duration::days(7),
            limit: 10,
            delay: DEFAULT_EXTRACTION_DELAY,
            user_email: None,
            input,
            output,
        }
    }

    pub fn with_window(mut self, window: chrono::Duration, limit: usize) -> Self {
        self.window = window;
        self.limit = limit;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run(&mut self) -> Result<InteractiveReport, PipelineError> {
        let mut report = InteractiveReport::default();

        let emails = self.mail.fetch_recent(self.window, self.limit).await?;
        if emails.is_empty() {
            self.say("No emails found.\n").await?;
            return Ok(report);
        }
        self.say(&format!("Found {} emails.\n", emails.len())).await?;

        for (i, email) in emails.iter().enumerate() {
            let index = i + 1;
            self.say(&format!("\n{}\n", format_email_summary(email, index)))
                .await?;
            report.emails_shown += 1;

            match self
                .ask("Extract tasks from this email? (y/n/q to quit) ")
                .await?
            {
                Answer::Quit => break,
                Answer::No => continue,
                Answer::Yes => {}
            }

            let metadata = email.metadata(self.user_email.as_deref());
            let tasks = self
                .extractor
                .extract(&email.content(), Some(&metadata))
                .await;
            self.say(&format!("\n{}\n", format_tasks(&tasks, index)))
                .await?;

            if !tasks.is_empty() {
                if self.ask("Save these tasks? (y/n) ").await? == Answer::Yes {
                    let saved = self.sink.append(report.saves + 1, &tasks).await;
                    match saved {
                        Ok(path) => {
                            report.saves += 1;
                            report.saved += tasks.len();
                            self.say(&format!("Saved to {}\n", path.display())).await?;
                        }
                        Err(e) => {
                            error!(email_id = %email.id, error = %e, "Failed to save tasks");
                            self.say(&format!("Could not save tasks: {e}\n")).await?;
                        }
                    }
                }
                report.extracted.extend(tasks);
            }

            if index < emails.len() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            shown = report.emails_shown,
            extracted = report.extracted.len(),
            saved = report.saved,
            "Interactive review finished"
        );
        self.say(&format!(
            "\nTotal tasks extracted: {}\n",
            report.extracted.len()
        ))
        .await?;
        Ok(report)
    }

    async fn say(&mut self, text: &str) -> Result<(), PipelineError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Prompt and read one line. EOF counts as quit.
    async fn ask(&mut self, prompt: &str) -> Result<Answer, PipelineError> {
        self.say(prompt).await?;
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(Answer::Quit);
        }
        Ok(Answer::parse(&line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::time::Instant;

    use crate::error::{LlmError, MailError, SinkError};
    use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::mail::{Email, Participant};

    struct FixedMail(Vec<Email>);

    #[async_trait]
    impl MailSource for FixedMail {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_recent(
            &self,
            _window: chrono::Duration,
            limit: usize,
        ) -> Result<Vec<Email>, MailError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }

        async fn health_check(&self) -> Result<(), MailError> {
            Ok(())
        }
    }

    const ONE_TASK: &str = r#"[{"description": "Reply to Alice", "task_type": "reminder"}]"#;
    const TWO_TASKS: &str = r#"[
        {"description": "Reply to Alice", "task_type": "reminder"},
        {"description": "Book a room", "task_type": "meeting_scheduling"}
    ]"#;

    struct ReplyLlm {
        reply: &'static str,
        calls: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl LlmProvider for ReplyLlm {
        fn model_name(&self) -> &str {
            "one-task"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.lock().unwrap().push(Instant::now());
            Ok(CompletionResponse {
                content: self.reply.into(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        tasks: Mutex<Vec<TaskRecord>>,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl TaskSink for MemorySink {
        async fn append(&self, batch: usize, tasks: &[TaskRecord]) -> Result<PathBuf, SinkError> {
            self.batches.lock().unwrap().push(batch);
            self.tasks.lock().unwrap().extend_from_slice(tasks);
            Ok(PathBuf::from("memory.json"))
        }
    }

    fn emails(n: usize) -> Vec<Email> {
        (1..=n)
            .map(|i| Email {
                id: format!("m{i}"),
                subject: format!("Subject {i}"),
                body: "Please reply.".into(),
                from: vec![Participant::new("alice@example.com")],
                to: vec![],
                cc: vec![],
                received_at: None,
            })
            .collect()
    }

    fn session(
        n: usize,
        input: &'static str,
    ) -> (
        InteractiveSession<&'static [u8], Vec<u8>>,
        Arc<ReplyLlm>,
        Arc<MemorySink>,
    ) {
        session_with_reply(n, input, ONE_TASK)
    }

    fn session_with_reply(
        n: usize,
        input: &'static str,
        reply: &'static str,
    ) -> (
        InteractiveSession<&'static [u8], Vec<u8>>,
        Arc<ReplyLlm>,
        Arc<MemorySink>,
    ) {
        let llm = Arc::new(ReplyLlm {
            reply,
            calls: Mutex::new(Vec::new()),
        });
        let sink = Arc::new(MemorySink::default());
        let session = InteractiveSession::new(
            Arc::new(FixedMail(emails(n))),
            TaskExtractor::new(llm.clone()),
            sink.clone(),
            input.as_bytes(),
            Vec::new(),
        );
        (session, llm, sink)
    }

    #[test]
    fn answers() {
        assert_eq!(Answer::parse("y\n"), Answer::Yes);
        assert_eq!(Answer::parse(" Y "), Answer::Yes);
        assert_eq!(Answer::parse("q"), Answer::Quit);
        assert_eq!(Answer::parse("n"), Answer::No);
        assert_eq!(Answer::parse("maybe"), Answer::No);
    }

    #[tokio::test(start_paused = true)]
    async fn extract_and_save() {
        let (mut session, llm, sink) = session(2, "y\ny\nn\n");
        let report = session.run().await.unwrap();

        assert_eq!(report.emails_shown, 2);
        assert_eq!(report.extracted.len(), 1);
        assert_eq!(report.saved, 1);
        assert_eq!(llm.calls.lock().unwrap().len(), 1);
        assert_eq!(sink.tasks.lock().unwrap()[0].description, "Reply to Alice");

        let out = String::from_utf8(session.into_output()).unwrap();
        assert!(out.contains("[1] From: alice@example.com"));
        assert!(out.contains("Extract tasks from this email? (y/n/q to quit)"));
        assert!(out.contains("Description: Reply to Alice"));
        assert!(out.contains("Saved to memory.json"));
        assert!(out.contains("Total tasks extracted: 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn declining_save_keeps_sink_empty() {
        let (mut session, _, sink) = session(1, "y\nn\n");
        let report = session.run().await.unwrap();
        assert_eq!(report.extracted.len(), 1);
        assert_eq!(report.saved, 0);
        assert!(sink.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn saves_are_numbered_per_append() {
        let (mut session, _, sink) = session_with_reply(3, "y\ny\ny\nn\ny\ny\n", TWO_TASKS);
        let report = session.run().await.unwrap();

        assert_eq!(report.extracted.len(), 6);
        assert_eq!(report.saved, 4);
        assert_eq!(report.saves, 2);
        assert_eq!(*sink.batches.lock().unwrap(), [1, 2]);
        assert_eq!(sink.tasks.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_early() {
        let (mut session, llm, _) = session(3, "q\n");
        let report = session.run().await.unwrap();
        assert_eq!(report.emails_shown, 1);
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_input_quits() {
        let (mut session, llm, _) = session(3, "");
        let report = session.run().await.unwrap();
        assert_eq!(report.emails_shown, 1);
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn extractions_are_spaced() {
        let (session, llm, _) = session(2, "y\nn\ny\nn\n");
        let mut session = session.with_delay(Duration::from_secs(3));
        session.run().await.unwrap();

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn no_emails() {
        let (mut session, _, _) = session(0, "");
        let report = session.run().await.unwrap();
        assert_eq!(report.emails_shown, 0);
        let out = String::from_utf8(session.into_output()).unwrap();
        assert!(out.contains("No emails found."));
    }
}
