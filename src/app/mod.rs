//! Command-line entry point wiring configuration, logging and the deposit client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{BackoffPolicy, ZenodoClient};
use crate::config::{Environment, Overrides, Settings, TOKEN_ENV_VAR, load_token};
use crate::logic::publish::{self, PublishMode, PublishOutcome};
use crate::models::metadata::StaticMetadata;

/// Publish a dated archive of the working tree to Zenodo.
#[derive(Debug, Parser)]
#[command(name = "zenodo-publish", version, about)]
pub struct Cli {
    /// Release version, embedded in the title and stored as the record version
    #[arg(value_name = "VERSION")]
    pub release: String,

    /// Start a brand-new record instead of a new version of the concept record
    #[arg(long)]
    pub new_record: bool,

    /// Target deployment
    #[arg(long = "env", env = "ZENODOENV", value_enum, default_value_t = Environment::Production)]
    pub environment: Environment,

    /// Concept record grouping all versions (defaults per environment)
    #[arg(long, env = "ZENODO_CONCEPT_ID")]
    pub concept_id: Option<String>,

    /// API token; falls back to the token file
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub token: Option<String>,

    /// Secrets file holding a ZENODOTOKEN= line (defaults per environment)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Static descriptive metadata (JSON)
    #[arg(long, env = "ZENODO_METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,

    /// Directory to archive
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Scratch directory receiving the archive
    #[arg(long, env = "ZENODO_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Archive name prefix; the date and .zip are appended
    #[arg(long)]
    pub archive_prefix: Option<String>,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings::resolve(
            self.environment,
            self.release.clone(),
            self.new_record,
            Overrides {
                concept_id: self.concept_id.clone(),
                token_file: self.token_file.clone(),
                metadata_file: self.metadata_file.clone(),
                source_dir: self.source_dir.clone(),
                archive_dir: self.archive_dir.clone(),
                archive_prefix: self.archive_prefix.clone(),
            },
        )
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit status for a failed argument parse: `--help` and `--version` succeed,
/// anything else is a usage error and fails like every other fatal step.
pub fn usage_status(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

/// Today's date on the operator's clock, which names the archive.
///
/// Falls back to UTC when the local offset cannot be determined, which the
/// `time` crate reports once other threads exist.
fn local_today() -> Date {
    match OffsetDateTime::now_local() {
        Ok(now) => now.date(),
        Err(err) => {
            warn!("Local UTC offset unavailable ({err}); dating the archive in UTC");
            OffsetDateTime::now_utc().date()
        }
    }
}

/// Run the pipeline once for already parsed arguments.
pub fn run(cli: Cli) -> Result<PublishOutcome> {
    init_tracing();
    // Read the local offset while the process is still single-threaded.
    let today = local_today();
    let settings = cli.settings();

    info!("Zenodo publisher {}", env!("CARGO_PKG_VERSION"));
    match settings.environment {
        Environment::Sandbox => info!("Using Zenodo SANDBOX environment"),
        Environment::Production => info!("Using Zenodo PRODUCTION environment"),
    }

    let token = load_token(cli.token.as_deref(), &settings.token_file)?;
    let metadata = StaticMetadata::load(&settings.metadata_file)?;
    let client = ZenodoClient::new(settings.environment.api_base_url(), token)
        .context("Failed to initialise Zenodo client")?;

    let mut sleep = std::thread::sleep;
    let outcome = publish::run(
        &client,
        &settings,
        &metadata,
        today,
        BackoffPolicy::default(),
        &mut sleep,
    )?;

    print_summary(&outcome);
    Ok(outcome)
}

fn print_summary(outcome: &PublishOutcome) {
    println!("{}", "=".repeat(50));
    println!("Publishing completed successfully");
    match &outcome.mode {
        PublishMode::NewVersion { record_id } => println!("Previous record ID: {record_id}"),
        PublishMode::NewRecord => println!("Created a new record"),
    }
    if let Some(concept) = &outcome.concept_id {
        println!("Concept record ID: {concept}");
    }
    println!("Deposition ID: {}", outcome.draft_id);
    println!("New record ID: {}", outcome.record_id);
    println!(
        "Archive: {} ({} files, sha256 {})",
        outcome.archive.file_name, outcome.archive.file_count, outcome.archive.sha256
    );
    println!("DOI: {}", outcome.doi);
    println!("URL: {}", outcome.url);
}
