mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vitalnote_config::AppConfig;
use vitalnote_sensor::{FileSource, HomeAssistantClient, SensorSource};
use vitalnote_sync::{RunOutcome, RunReport, SyncEngine, TracingNotifier};
use vitalnote_vault::{FsDocumentStore, NoteKind, Vault, frontmatter, section};

#[derive(Debug, Parser)]
#[command(
    name = "vitalnote",
    version,
    about = "Project health sensor data into daily Markdown notes"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/vitalnote.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the sensor snapshot and update notes once.
    Sync {
        /// Read a saved state document instead of calling the sensor.
        #[arg(long, value_name = "PATH")]
        from_file: Option<PathBuf>,
    },
    /// Sync on the configured interval; press Enter to sync immediately.
    Watch,
    /// Print the frontmatter fields and exercise list of one daily note.
    Show {
        /// Calendar date key as the sensor reports it, e.g. 2024-01-20.
        date: String,
    },
    /// Print the effective configuration.
    Config {
        /// Write the effective configuration back to the config path.
        #[arg(long)]
        write: bool,
    },
}

fn build_engine(config: AppConfig, source: Arc<dyn SensorSource>) -> SyncEngine {
    let store = Arc::new(FsDocumentStore::new(&config.notes.vault_path));
    let vault = Vault::from_config(&config.notes, store);
    SyncEngine::new(config, source, vault, Arc::new(TracingNotifier))
}

fn http_source(config: &AppConfig) -> Result<Arc<dyn SensorSource>> {
    if config.sensor.token.is_empty() {
        tracing::warn!("no sensor token configured; set VITALNOTE_TOKEN or [sensor].token");
    }
    Ok(Arc::new(HomeAssistantClient::new(&config.sensor)?))
}

pub(crate) fn print_report(report: &RunReport) {
    if !report.is_completed() {
        return;
    }
    let categories: Vec<String> = report.categories.iter().map(ToString::to_string).collect();
    println!("── sync report ──────────────────────────────────────");
    println!("  categories         : {}", categories.join(", "));
    println!("  notes updated      : {}", report.stats.dates_updated.len());
    println!("  fields written     : {}", report.stats.fields_written);
    println!("  sections rewritten : {}", report.stats.sections_rewritten);
    if !report.stats.dates_skipped.is_empty() {
        let skipped: Vec<&str> = report.stats.dates_skipped.iter().map(String::as_str).collect();
        println!("  skipped (no note)  : {}", skipped.join(", "));
    }
    if !report.stats.dates_failed.is_empty() {
        let failed: Vec<&str> = report.stats.dates_failed.iter().map(String::as_str).collect();
        println!("  failed             : {}", failed.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Commands::Sync { from_file: None }) {
        Commands::Sync { from_file } => {
            let source: Arc<dyn SensorSource> = match from_file {
                Some(path) => Arc::new(FileSource::new(path)),
                None => http_source(&config)?,
            };
            let engine = build_engine(config, source);
            let report = engine.run().await;
            print_report(&report);
            if let RunOutcome::FetchFailed(reason) = report.outcome {
                bail!("sync failed: {reason}");
            }
        }
        Commands::Watch => {
            let source = http_source(&config)?;
            let engine = build_engine(config, source);
            watch::run_watch(engine).await?;
        }
        Commands::Show { date } => show_note(&config, &date).await?,
        Commands::Config { write } => {
            let rendered = toml_preview(&config)?;
            println!("# {}", cli.config.display());
            println!("{rendered}");
            if write {
                config.save_to(&cli.config)?;
                println!("configuration written to {}", cli.config.display());
            }
        }
    }

    Ok(())
}

/// Effective configuration with the sensor token masked.
fn toml_preview(config: &AppConfig) -> Result<String> {
    let mut shown = config.clone();
    if !shown.sensor.token.is_empty() {
        shown.sensor.token = "********".to_string();
    }
    shown.to_toml()
}

async fn show_note(config: &AppConfig, date: &str) -> Result<()> {
    let store = Arc::new(FsDocumentStore::new(&config.notes.vault_path));
    let vault = Vault::from_config(&config.notes, store);
    let path = vault.locator().path_for(date, NoteKind::Daily);
    if !vault.store().exists(&path).await? {
        bail!("no note for {date} at {path}");
    }
    let content = vault.store().read(&path).await?;

    println!("── {path} ──");
    for (field, value) in frontmatter::read_fields(&content)? {
        println!("  {field:<18} : {value}");
    }
    let exercise = &config.sections.exercise;
    if let Some(body) = section::section_body(&content, exercise) {
        let body = body.trim();
        if !body.is_empty() {
            println!("\n{exercise}\n{body}");
        }
    }
    Ok(())
}
