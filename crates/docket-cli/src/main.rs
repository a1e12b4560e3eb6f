//! `docket` — ingest complaint exports into an append-only history and
//! report on it.
//!
//! # Usage
//!
//! ```text
//! docket ingest complaints.csv            # full on first run, then last 30 days
//! docket ingest complaints.csv --full --dry-run
//! docket history 8123456
//! docket report daily --json
//! docket report series --field company --value "EQUIFAX, INC."
//! docket --config /etc/docket.toml serve
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use docket_store_sqlite::SqliteStore;
use settings::{DEFAULT_CONFIG_FILE, Settings};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "docket", version, about = "Versioned history of consumer complaint exports")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Reconcile a CSV export against history and append the changes.
  Ingest {
    /// CSV export covering the planned window.
    csv: PathBuf,

    /// Treat the export as the complete dataset.
    #[arg(long, conflicts_with = "days")]
    full: bool,

    /// Treat the export as covering the last N days of receipts.
    #[arg(long, value_name = "N")]
    days: Option<u32>,

    /// Capture instant for this run (RFC 3339). Defaults to the current time.
    #[arg(long, value_name = "RFC3339")]
    now: Option<DateTime<Utc>>,

    /// Reconcile and print the outcome without appending.
    #[arg(long)]
    dry_run: bool,
  },

  /// Print every stored version of one complaint.
  History {
    complaint_id: u64,
  },

  /// Aggregate reports.
  #[command(subcommand)]
  Report(ReportCommand),

  /// Serve the read-only HTTP API.
  Serve,
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
  /// New, amended and deleted counts per capture day.
  Daily {
    #[arg(long)]
    json: bool,
  },

  /// Complaints per receipt day for one entity.
  Series {
    /// Payload field, e.g. `company`.
    #[arg(long)]
    field: String,

    #[arg(long)]
    value: String,

    #[arg(long)]
    json: bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  tracing::debug!(?settings, "loaded settings");

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  match cli.command {
    Command::Ingest { csv, full, days, now, dry_run } => {
      let args = commands::IngestArgs {
        csv,
        mode: commands::ingest_mode(full, days, settings.incremental_days),
        now: now.unwrap_or_else(Utc::now),
        dry_run,
        max_malformed_ratio: settings.max_malformed_ratio,
      };
      commands::ingest(store, args).await
    }
    Command::History { complaint_id } => commands::history(&store, complaint_id).await,
    Command::Report(ReportCommand::Daily { json }) => commands::report_daily(&store, json).await,
    Command::Report(ReportCommand::Series { field, value, json }) => {
      commands::report_series(&store, &field, &value, json).await
    }
    Command::Serve => commands::serve(store, &settings).await,
  }
}
