use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use inbox_tasks::config::{AppConfig, set_env_entries};
use inbox_tasks::error::ConfigError;
use inbox_tasks::extraction::TaskExtractor;
use inbox_tasks::llm::{LlmProvider, create_provider};
use inbox_tasks::mail::{MailSource, NylasClient};
use inbox_tasks::pipeline::{BatchProcessor, InteractiveSession};
use inbox_tasks::store::{DEFAULT_TASKS_FILE, JsonFileSink};

#[derive(Parser)]
#[command(name = "inbox-tasks", version)]
#[command(about = "Extract actionable tasks from recent emails with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process recent emails unattended and write one task file per batch
    Batch {
        /// Emails per batch (overrides TASKS_BATCH_SIZE)
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,

        /// Seconds between emails (overrides TASKS_EMAIL_DELAY_SECS)
        #[arg(long, value_name = "SECS")]
        delay: Option<u64>,

        /// Maximum emails to fetch (overrides TASKS_MAX_EMAILS)
        #[arg(long, value_name = "N")]
        max_emails: Option<usize>,
    },
    /// Review emails one by one and choose what to extract and save
    Interactive,
    /// Report every configuration problem and test both service connections
    Check {
        /// Prompt for missing settings and save them to the env file first
        #[arg(long)]
        write_env: bool,

        /// Env file written by --write-env
        #[arg(long, value_name = "PATH", default_value = ".env")]
        env_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Batch {
        batch_size: None,
        delay: None,
        max_emails: None,
    }) {
        Command::Batch {
            batch_size,
            delay,
            max_emails,
        } => {
            let mut config = load_config();
            if let Some(n) = batch_size {
                anyhow::ensure!(n > 0, "--batch-size must be at least 1");
                config.batch.batch_size = n;
            }
            if let Some(secs) = delay {
                config.batch.email_delay = std::time::Duration::from_secs(secs);
            }
            if let Some(n) = max_emails {
                config.batch.max_emails = n;
            }
            run_batch(config).await
        }
        Command::Interactive => run_interactive(load_config()).await,
        Command::Check {
            write_env,
            env_file,
        } => {
            if write_env {
                prompt_for_missing(&env_file).await?;
            }
            run_check().await
        }
    }
}

/// Load config or exit with a hint; `check` lists every problem.
fn load_config() -> AppConfig {
    AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Run `inbox-tasks check` to list every missing setting.");
        std::process::exit(1);
    })
}

async fn run_batch(config: AppConfig) -> anyhow::Result<()> {
    let llm = create_provider(&config.llm)?;
    let mail: Arc<dyn MailSource> = Arc::new(NylasClient::new(config.mail.clone()));
    let sink = Arc::new(JsonFileSink::per_batch(&config.output_dir));

    eprintln!("📬 inbox-tasks v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm.model_name());
    eprintln!("   Output: {}", config.output_dir.display());

    let processor = BatchProcessor::new(mail, TaskExtractor::new(llm), sink, config.batch)
        .with_user_email(config.user_email);
    let report = processor.run().await;
    if let Some(e) = &report.fetch_error {
        eprintln!("No emails processed: {e}");
        return Ok(());
    }

    println!(
        "Processed {} emails in {} batches: {} tasks extracted.",
        report.emails_processed,
        report.batches,
        report.tasks.len()
    );
    for path in &report.saved_to {
        println!("  saved {}", path.display());
    }
    if report.save_failures > 0 {
        anyhow::bail!("{} batch(es) could not be saved", report.save_failures);
    }
    Ok(())
}

async fn run_interactive(config: AppConfig) -> anyhow::Result<()> {
    let llm = create_provider(&config.llm)?;
    let mail: Arc<dyn MailSource> = Arc::new(NylasClient::new(config.mail.clone()));
    let sink = Arc::new(JsonFileSink::single_file(
        config.output_dir.join(DEFAULT_TASKS_FILE),
    ));

    let mut session = InteractiveSession::new(
        mail,
        TaskExtractor::new(llm),
        sink,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .with_window(config.batch.window, config.batch.max_emails)
    .with_user_email(config.user_email);

    session.run().await?;
    Ok(())
}

/// Ask for each missing setting (and the mailbox address), save the answers
/// to `env_file`, then load them into the process environment.
async fn prompt_for_missing(env_file: &Path) -> anyhow::Result<()> {
    let mut keys: Vec<String> = match AppConfig::load(|key| std::env::var(key).ok()) {
        Ok(_) => Vec::new(),
        Err(errors) => errors
            .iter()
            .filter(|e| matches!(e, ConfigError::MissingRequired { .. }))
            .map(|e| e.key().to_string())
            .collect(),
    };
    if std::env::var("NYLAS_USER_EMAIL").is_err() {
        keys.push("NYLAS_USER_EMAIL".to_string());
    }
    if keys.is_empty() {
        eprintln!("Environment already configured.");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut entries = Vec::new();
    for key in keys {
        eprint!("Enter {key}: ");
        match lines.next_line().await? {
            Some(value) if !value.trim().is_empty() => {
                entries.push((key, value.trim().to_string()))
            }
            Some(_) => eprintln!("Warning: {key} not set"),
            None => break,
        }
    }
    if entries.is_empty() {
        return Ok(());
    }

    set_env_entries(env_file, &entries)?;
    dotenvy::from_path_override(env_file)?;
    eprintln!(
        "Saved {} setting(s) to {}",
        entries.len(),
        env_file.display()
    );
    Ok(())
}

async fn run_check() -> anyhow::Result<()> {
    eprintln!("Checking configuration...");
    let config = match AppConfig::load(|key| std::env::var(key).ok()) {
        Ok(config) => {
            eprintln!("  ✓ configuration complete");
            config
        }
        Err(errors) => {
            for e in &errors {
                eprintln!("  ✗ {e}");
            }
            anyhow::bail!("{} configuration problem(s)", errors.len());
        }
    };

    let mut failures = 0;

    let llm = create_provider(&config.llm)?;
    match llm.health_check().await {
        Ok(()) => eprintln!("  ✓ LLM ({}) reachable", llm.model_name()),
        Err(e) => {
            failures += 1;
            eprintln!("  ✗ LLM ({}): {e}", llm.model_name());
        }
    }

    let mail = NylasClient::new(config.mail);
    match mail.health_check().await {
        Ok(()) => eprintln!("  ✓ Mail ({}) reachable", mail.name()),
        Err(e) => {
            failures += 1;
            eprintln!("  ✗ Mail ({}): {e}", mail.name());
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} service check(s) failed");
    }
    eprintln!("All checks passed.");
    Ok(())
}
