//! pollsync CLI
//!
//! Local execution entry point. For AWS Lambda, use `pollsync-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use pollsync::error::Result;
use pollsync::models::Config;
use pollsync::Runtime;

/// pollsync - poll-only source sync and attachment chunking
#[derive(Parser, Debug)]
#[command(
    name = "pollsync",
    version,
    about = "Keeps a local cache in sync with a poll-only source"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single sync cycle
    Sync,

    /// Poll continuously every `sync.poll_interval_secs`
    Watch {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
    },

    /// Print a stored record
    Get { id: String },

    /// Print records dated within an inclusive range (YYYY-MM-DD)
    Range { start: NaiveDate, end: NaiveDate },

    /// Print the chunks of an attachment, building them if needed
    Chunks { attachment_id: String },

    /// Select the chunks most relevant to a query
    Search {
        query: String,

        /// Attachment ids to search (repeatable)
        #[arg(short, long = "attachment", required = true)]
        attachments: Vec<String>,

        /// Maximum number of chunks (default: relevance.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging from the config level, or debug when verbose.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(cli.verbose, &config.logging.level);

    if let Some(e) = load_error {
        if matches!(cli.command, Command::Validate) {
            log::error!("Config load failed from {}: {}", cli.config.display(), e);
            return Err(e);
        }
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
    } else {
        log::info!("Loaded configuration from {}", cli.config.display());
    }

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK");
        return Ok(());
    }

    config.validate()?;
    let runtime = Runtime::from_config(Arc::new(config)).await?;
    let api = runtime.query();

    match cli.command {
        Command::Sync => {
            let report = runtime.engine().run_cycle().await?;
            print_json(&report)?;
        }

        Command::Watch { cycles } => {
            runtime.watch(cycles).await?;
        }

        Command::Get { id } => match api.get_record(&id).await? {
            Some(record) => print_json(&record)?,
            None => log::warn!("No record stored for {}", id),
        },

        Command::Range { start, end } => {
            let records = api.get_records_in_range(start, end).await?;
            log::info!("{} records between {} and {}", records.len(), start, end);
            print_json(&records)?;
        }

        Command::Chunks { attachment_id } => {
            match api.get_chunks_for_attachment(&attachment_id).await? {
                Some(chunks) => print_json(&chunks)?,
                None => log::warn!("No chunks available for {} yet", attachment_id),
            }
        }

        Command::Search {
            query,
            attachments,
            limit,
        } => {
            let selected = api.get_relevant_chunks(&attachments, &query, limit).await?;
            print_json(&selected)?;
        }

        // Answered above without opening storage
        Command::Validate => {}
    }

    Ok(())
}
