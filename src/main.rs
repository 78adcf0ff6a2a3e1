use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use media_insight::config::{self, ApiKeySlot, AppConfig};
use media_insight::credentials::{CredentialStore, JsonFileStore};
use media_insight::runner::{JobEvent, JobObserver, MediaJobRunner, TracingObserver};
use media_insight::summary::{DocumentSummarizer, SummarizeSource, SummaryOrchestrator};
use media_insight::{telemetry, Job, MediaFile};

#[derive(Parser)]
#[command(
    name = "media-insight",
    version,
    about = "Transcribe, caption and summarize media files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe an audio file or describe an image, then summarize the result
    Analyze {
        /// Audio (mp3, wav, m4a, ...) or image (png, jpg, ...) file
        file: PathBuf,

        /// Print the finished job as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a text document or a web page
    Summarize {
        /// Local text document
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,

        /// Page to fetch and summarize
        #[arg(long)]
        url: Option<String>,
    },

    /// Create a local account
    Register { username: String, password: String },

    /// Sign in as an existing local account
    Login { username: String, password: String },

    /// Forget the signed-in account
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Store an API key (obfuscated) in the config file; an empty key clears it
    SetKey { slot: KeySlot, key: String },

    /// List configured API keys, masked
    Keys,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeySlot {
    Transcription,
    Caption,
    Chat,
}

impl From<KeySlot> for ApiKeySlot {
    fn from(slot: KeySlot) -> Self {
        match slot {
            KeySlot::Transcription => ApiKeySlot::Transcription,
            KeySlot::Caption => ApiKeySlot::Caption,
            KeySlot::Chat => ApiKeySlot::Chat,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = config::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Analyze { file, json } => analyze(&config, file, json).await,
        Command::Summarize { file, url } => summarize(&config, file, url).await,
        Command::Register { username, password } => {
            if credentials(&config).register(&username, &password)? {
                println!("Registered {}", username);
                Ok(())
            } else {
                bail!("User '{}' already exists or the name is empty", username)
            }
        }
        Command::Login { username, password } => {
            if credentials(&config).login(&username, &password)? {
                println!("Logged in as {}", username);
                Ok(())
            } else {
                bail!("Invalid username or password")
            }
        }
        Command::Logout => {
            credentials(&config).logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => {
            match credentials(&config).current_user()? {
                Some(user) => println!("{}", user),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Command::SetKey { slot, key } => set_key(slot, &key),
        Command::Keys => {
            for (name, masked) in config.describe_keys() {
                println!("{:<14} {}", name, masked.as_deref().unwrap_or("(not set)"));
            }
            Ok(())
        }
    }
}

fn credentials(config: &AppConfig) -> CredentialStore<JsonFileStore> {
    CredentialStore::new(JsonFileStore::new(config.credentials_path()))
}

/// Cancel the returned token on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn analyze(config: &AppConfig, path: PathBuf, json: bool) -> Result<()> {
    let file = MediaFile::from_path(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let runner = MediaJobRunner::from_config(config);
    let cancel = cancel_on_interrupt();
    let observer = |event: &JobEvent| {
        if let JobEvent::Stage(stage) = event {
            eprintln!("{}", stage);
        }
        TracingObserver.on_event(event);
    };

    match runner.run(Some(file), &observer, &cancel).await {
        Ok(job) => print_job(&job, json),
        Err(failure) => {
            if let Some(job) = &failure.job {
                if job.result_text().is_some() {
                    print_job(job, json)?;
                }
            }
            Err(failure.into())
        }
    }
}

fn print_job(job: &Job, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    if let Some(text) = job.result_text() {
        println!("== Result ==\n{}\n", text);
    }
    if !job.speaker_segments.is_empty() {
        println!("== Speakers ==\n{}\n", job.diarized_text());
    }
    match (&job.summary_text, &job.summary_error) {
        (Some(summary), _) => println!("== Summary ==\n{}", summary),
        (None, Some(error)) => println!("== Summary ==\n(unavailable: {})", error),
        (None, None) => {}
    }
    Ok(())
}

async fn summarize(config: &AppConfig, file: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let source = match (file, url) {
        (Some(path), None) => SummarizeSource::File(
            MediaFile::from_path(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        (None, Some(url)) => SummarizeSource::Url(url),
        _ => bail!("Pass exactly one of --file or --url"),
    };

    let summarizer = DocumentSummarizer::new(
        config.summary.document_endpoint.clone(),
        SummaryOrchestrator::from_config(&config.summary),
        config.summary.timeout_secs,
    );

    let cancel = cancel_on_interrupt();
    eprintln!("Generating summary...");
    let summary = tokio::select! {
        _ = cancel.cancelled() => bail!("Cancelled"),
        summary = summarizer.summarize(source) => summary.context("Summarization failed")?,
    };
    println!("{}", summary);
    Ok(())
}

fn set_key(slot: KeySlot, key: &str) -> Result<()> {
    let path = config::config_path();
    // Read the file alone so environment overrides are not persisted
    let mut stored = config::load_from(&path)?;
    stored.set_api_key(slot.into(), key);
    config::save(&path, &stored)?;
    println!("Saved to {}", path.display());
    Ok(())
}
