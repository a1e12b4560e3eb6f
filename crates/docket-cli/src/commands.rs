//! Subcommand implementations.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use docket_core::{
  latest::LatestView,
  pipeline::{IngestMode, Ingestor, RunReport},
  report::{DailyActivity, daily_activity, entity_series},
  store::HistoryStore,
  window::Window,
};
use docket_store_sqlite::SqliteStore;
use tokio::net::TcpListener;

use crate::settings::Settings;

// ─── Ingest ───────────────────────────────────────────────────────────────────

pub struct IngestArgs {
  pub csv:                 PathBuf,
  pub mode:                IngestMode,
  pub now:                 DateTime<Utc>,
  pub dry_run:             bool,
  pub max_malformed_ratio: Option<f64>,
}

pub fn ingest_mode(full: bool, days: Option<u32>, incremental_days: u32) -> IngestMode {
  match (full, days) {
    (true, _) => IngestMode::Full,
    (false, Some(days)) => IngestMode::LastDays(days),
    (false, None) => IngestMode::Auto { incremental_days },
  }
}

pub async fn ingest(store: SqliteStore, args: IngestArgs) -> anyhow::Result<()> {
  let mut ingestor = Ingestor::new(Arc::new(store));
  if let Some(ratio) = args.max_malformed_ratio {
    ingestor = ingestor.with_max_malformed_ratio(ratio);
  }
  let window = ingestor
    .plan_window(args.mode, args.now.date_naive())
    .await
    .context("failed to plan fetch window")?;
  tracing::info!(%window, csv = %args.csv.display(), "reading export");

  let batch = docket_csv::read_batch_from_path(&args.csv, window)
    .with_context(|| format!("failed to read {}", args.csv.display()))?;

  let result = if args.dry_run {
    ingestor.dry_run(batch, args.now).await
  } else {
    ingestor.ingest(batch, args.now).await
  };
  let report = result.context("run aborted; history unchanged")?;

  print_run(&report, args.dry_run);
  Ok(())
}

fn print_run(report: &RunReport, dry_run: bool) {
  let s = &report.summary;
  let verb = if dry_run { "would append" } else { "appended" };

  println!("run {} at {} over {}", s.run_id, s.recorded_at.to_rfc3339(), s.window);
  println!(
    "  received {}  accepted {}  malformed {}  duplicates {}  out of window {}",
    s.normalize.received,
    s.normalize.accepted,
    s.normalize.malformed,
    s.normalize.duplicates,
    s.normalize.out_of_window,
  );
  println!(
    "  new {}  amended {}  deleted {}  unchanged {}  already deleted {}",
    s.counts.new, s.counts.amended, s.counts.deleted, s.counts.unchanged, s.counts.already_deleted,
  );
  println!("  {verb} {} records", report.reconciliation.records.len());

  if dry_run {
    for outcome in &report.reconciliation.outcomes {
      if outcome.classification.emits() {
        println!("    {:?}  {}", outcome.classification, outcome.key);
      }
    }
  }
}

// ─── History ──────────────────────────────────────────────────────────────────

pub async fn history(store: &SqliteStore, complaint_id: u64) -> anyhow::Result<()> {
  let records = store
    .records_for_complaint(complaint_id)
    .await
    .context("failed to read history")?;
  if records.is_empty() {
    anyhow::bail!("no history for complaint {complaint_id}");
  }

  for record in records {
    println!("{}  {}", record.recorded_at.to_rfc3339(), record.key);
    if record.is_deletion() {
      println!("  (deleted)");
    }
    for (field, value) in record.payload.fields() {
      println!("  {field}: {value}");
    }
  }
  Ok(())
}

// ─── Reports ──────────────────────────────────────────────────────────────────

pub async fn report_daily(store: &SqliteStore, json: bool) -> anyhow::Result<()> {
  let runs = store.list_runs().await.context("failed to read runs")?;
  let days = daily_activity(&runs);

  if json {
    println!("{}", serde_json::to_string_pretty(&days)?);
    return Ok(());
  }

  println!(
    "{:<10}  {:>6}  {:>7}  {:>7}  {:>11}  {:>7}",
    "day", "new", "amended", "deleted", "created_net", "updated"
  );
  for d in days {
    println!("{}", daily_row(&d));
  }
  Ok(())
}

fn daily_row(d: &DailyActivity) -> String {
  format!(
    "{:<10}  {:>6}  {:>7}  {:>7}  {:>11}  {:>7}",
    d.day.to_string(),
    d.new,
    d.amended,
    d.deleted,
    d.created_net,
    d.updated
  )
}

pub async fn report_series(
  store: &SqliteStore,
  field: &str,
  value: &str,
  json: bool,
) -> anyhow::Result<()> {
  let records = store
    .records_in_window(Window::full())
    .await
    .context("failed to read history")?;
  let view = LatestView::reconstruct(Window::full(), records);
  let series = entity_series(&view, field, value);

  if json {
    println!("{}", serde_json::to_string_pretty(&series)?);
    return Ok(());
  }

  println!("{:<10}  {:>6}  {:>10}", "date", "count", "cumulative");
  for p in series {
    println!("{:<10}  {:>6}  {:>10}", p.date.to_string(), p.count, p.cumulative);
  }
  Ok(())
}

// ─── Serve ────────────────────────────────────────────────────────────────────

pub async fn serve(store: SqliteStore, settings: &Settings) -> anyhow::Result<()> {
  let app = docket_api::api_router(Arc::new(store));
  let address = format!("{}:{}", settings.host, settings.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}
