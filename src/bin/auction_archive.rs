use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use auction_archive::api::build_client;
use auction_archive::config::AppConfig;
use auction_archive::error::{IngestError, SnapshotError, StoreError};
use auction_archive::store::AuctionStore;
use auction_archive::{pipeline, reporter, snapshot, stats};

#[derive(Parser)]
#[command(
    name = "auction-archive",
    about = "Archive finished auctions into SQLite and export compressed snapshots"
)]
struct Cli {
    /// Config file (defaults to $AUCTION_ARCHIVE_CONFIG, then ./config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch ended auctions once and store new sales (default)
    Ingest,
    /// Write a compressed SQL snapshot of the database
    Export {
        /// Output archive (defaults to storage.snapshot_path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rebuild a fresh database file from a snapshot
    Restore {
        snapshot: PathBuf,
        db: PathBuf,
    },
    /// Print the BIN-sales headline, optionally updating a README
    Stats {
        /// Count from a snapshot instead of the live database
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// README whose headline line should be rewritten
        #[arg(long)]
        readme: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = error_kind(&e), "{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Kind of the first typed error found in the chain, for the failure log line.
fn error_kind(e: &anyhow::Error) -> &'static str {
    if let Some(err) = e.downcast_ref::<IngestError>() {
        err.kind()
    } else if let Some(err) = e.downcast_ref::<SnapshotError>() {
        err.kind()
    } else if let Some(err) = e.downcast_ref::<StoreError>() {
        err.kind()
    } else {
        "other"
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, config_path) = AppConfig::resolve(cli.config.as_deref())?;
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    match cli.command.unwrap_or(Command::Ingest) {
        Command::Ingest => {
            let client = build_client(config.api.timeout_secs).map_err(IngestError::from)?;
            let summary = pipeline::ingest(&client, &config).await?;
            info!(
                "Stored {} new auction(s), {} total",
                summary.inserted, summary.total_rows
            );
            reporter::report_ingest(&summary);
        }
        Command::Export { out } => {
            let out = out.unwrap_or_else(|| config.storage.snapshot_path.clone());
            let summary = snapshot::export(&config.storage.db_path, &out)
                .with_context(|| format!("failed to export {}", config.storage.db_path.display()))?;
            reporter::report_snapshot(&summary);
        }
        Command::Restore { snapshot: archive, db } => {
            let rows = snapshot::restore(&archive, &db)
                .with_context(|| format!("failed to restore {}", archive.display()))?;
            info!("Restored {} row(s) into {}", rows, db.display());
        }
        Command::Stats { snapshot: archive, readme } => {
            let count = match &archive {
                Some(path) => snapshot::load_in_memory(path)
                    .with_context(|| format!("failed to load {}", path.display()))?
                    .count_bin_sales()?,
                None => {
                    let db_path = &config.storage.db_path;
                    anyhow::ensure!(db_path.exists(), "database {} does not exist", db_path.display());
                    AuctionStore::open(db_path)?.count_bin_sales()?
                }
            };
            let line = stats::headline(count, chrono::Utc::now());
            println!("{line}");

            if let Some(readme) = readme {
                let changed = stats::update_readme(&readme, &line)
                    .with_context(|| format!("failed to update {}", readme.display()))?;
                if changed {
                    info!("Updated headline in {}", readme.display());
                } else {
                    info!("{} already up to date", readme.display());
                }
            }
        }
    }

    Ok(())
}
