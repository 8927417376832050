//! MongoVault - Main entry point
//!
//! CLI shell over the backup/restore engine: loads the configuration file,
//! builds the request the engine modules operate on, and renders outcomes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mongovault::backup::{run_backup, BackupRequest};
use mongovault::catalog::{CollectionCatalog, MongoCatalog};
use mongovault::config::Config;
use mongovault::restore::{run_restore, RestoreRequest};
use mongovault::connection;
use mongovault::selection::{SelectionIntent, SelectionMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a backup archive from a configured connection
    Backup {
        /// Named connection to back up
        #[arg(long)]
        connection: Option<String>,

        /// Selection mode: all, include or exclude
        #[arg(long)]
        mode: Option<SelectionMode>,

        /// Collections the mode applies to
        #[arg(long, value_delimiter = ',')]
        collections: Vec<String>,

        /// Only dump documents created at or after this RFC 3339 instant
        /// (single collection, include mode)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Saved preset to start from; explicit flags override it
        #[arg(long)]
        preset: Option<String>,
    },

    /// Restore an archive into a configured connection
    Restore {
        /// Named target connection
        #[arg(long)]
        connection: String,

        /// Archive file name inside the backup directory
        #[arg(long)]
        archive: String,

        /// Drop target collections before restoring
        #[arg(long)]
        drop: bool,
    },

    /// List the live collections of a configured connection
    Collections {
        #[arg(long)]
        connection: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();

    let config_path = args
        .config
        .or_else(|| std::env::var("MONGOVAULT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("mongovault.toml"));
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;

    match args.command {
        Command::Backup {
            connection,
            mode,
            collections,
            since,
            preset,
        } => {
            let request = backup_request(&config, connection, mode, collections, since, preset)?;
            let outcome = run_backup(&request, &config.storage.backup_dir).await?;
            println!("{}", outcome.archive_path.display());
        }
        Command::Restore {
            connection,
            archive,
            drop,
        } => {
            let request = RestoreRequest {
                connection: config.connection(&connection)?,
                archive,
                drop_target: drop,
            };
            let outcome = run_restore(&request, &config.storage.backup_dir).await?;
            println!(
                "restored {} into '{}'",
                outcome.record.archive, connection
            );
        }
        Command::Collections { connection } => {
            let descriptor = config.connection(&connection)?;
            let resolved = connection::resolve(&descriptor).await?;
            let database = resolved
                .database
                .clone()
                .with_context(|| format!("connection '{connection}' does not name a database"))?;
            let names = MongoCatalog::new(resolved).collection_names(&database).await?;
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

/// Merge preset and explicit flags into one backup request. Explicit flags
/// win over the preset's stored intent.
fn backup_request(
    config: &Config,
    connection: Option<String>,
    mode: Option<SelectionMode>,
    collections: Vec<String>,
    since: Option<DateTime<Utc>>,
    preset: Option<String>,
) -> Result<BackupRequest> {
    let (connection_name, intent) = match &preset {
        Some(name) => {
            let preset = config.preset(name)?;
            let intent = match mode {
                Some(mode) => SelectionIntent { mode, collections },
                None if collections.is_empty() => preset.intent(),
                None => SelectionIntent {
                    mode: preset.mode,
                    collections,
                },
            };
            (
                connection.unwrap_or_else(|| preset.connection.clone()),
                intent,
            )
        }
        None => {
            let name = connection.context("either --connection or --preset is required")?;
            let intent = SelectionIntent {
                mode: mode.unwrap_or(SelectionMode::All),
                collections,
            };
            (name, intent)
        }
    };

    let descriptor = config.connection(&connection_name)?;
    Ok(BackupRequest {
        connection: descriptor,
        intent,
        since,
        preset,
    })
}
