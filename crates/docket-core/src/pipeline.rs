//! The ingest pipeline: one fetched batch → one committed run.
//!
//! normalise → read the window's history → reconstruct the latest view →
//! reconcile → append atomically. Runs of one ingestor are serialised through
//! a lock. Runs from different ingestors or processes may still read the
//! same baseline; the store rejects the second append as stale.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  latest::LatestView,
  normalize::{RawBatch, Snapshot, normalize},
  reconcile::{Reconciliation, reconcile},
  store::{HistoryStore, RunSummary},
  window::Window,
};

/// Default length of the incremental window, roughly the last month.
pub const DEFAULT_INCREMENTAL_DAYS: u32 = 30;

// ─── Mode ────────────────────────────────────────────────────────────────────

/// How the window for the next run is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
  /// Full history when the store is empty, otherwise the last `days` days.
  Auto { incremental_days: u32 },
  Full,
  LastDays(u32),
}

impl Default for IngestMode {
  fn default() -> Self {
    Self::Auto { incremental_days: DEFAULT_INCREMENTAL_DAYS }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// The outcome of a run: what was persisted plus the per-key decisions.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub summary:        RunSummary,
  pub reconciliation: Reconciliation,
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

pub struct Ingestor<S> {
  store:               Arc<S>,
  run_lock:            Mutex<()>,
  max_malformed_ratio: Option<f64>,
}

impl<S: HistoryStore> Ingestor<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, run_lock: Mutex::new(()), max_malformed_ratio: None }
  }

  /// Refuse batches in which more than `ratio` of the received rows are
  /// malformed. A batch with no usable row is always refused.
  pub fn with_max_malformed_ratio(mut self, ratio: f64) -> Self {
    self.max_malformed_ratio = Some(ratio);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Decide which window the next fetch must cover.
  pub async fn plan_window(&self, mode: IngestMode, today: NaiveDate) -> Result<Window> {
    let window = match mode {
      IngestMode::Full => Window::full(),
      IngestMode::LastDays(days) => Window::last_days(today, days),
      IngestMode::Auto { incremental_days } => {
        if self.store.is_empty().await.map_err(Error::store)? {
          Window::full()
        } else {
          Window::last_days(today, incremental_days)
        }
      }
    };
    tracing::debug!(?mode, %window, "planned fetch window");
    Ok(window)
  }

  /// Reconcile `batch` at `now` and append the result.
  ///
  /// On any error history is left exactly as it was.
  pub async fn ingest(&self, batch: RawBatch, now: DateTime<Utc>) -> Result<RunReport> {
    let _guard = self.run_lock.lock().await;

    let report = self.prepare(batch, now).await?;

    if let Err(e) = self
      .store
      .append_run(report.reconciliation.appends(), report.summary.clone())
      .await
    {
      let e = Error::store(e);
      log_abort(&report.summary, &e);
      return Err(e);
    }

    let s = &report.summary;
    tracing::info!(
      run_id = %s.run_id,
      window = %s.window,
      new = s.counts.new,
      amended = s.counts.amended,
      deleted = s.counts.deleted,
      unchanged = s.counts.unchanged,
      already_deleted = s.counts.already_deleted,
      malformed = s.normalize.malformed,
      duplicates = s.normalize.duplicates,
      "run committed"
    );
    Ok(report)
  }

  /// Everything [`Self::ingest`] does except the append.
  pub async fn dry_run(&self, batch: RawBatch, now: DateTime<Utc>) -> Result<RunReport> {
    let _guard = self.run_lock.lock().await;
    self.prepare(batch, now).await
  }

  async fn prepare(&self, batch: RawBatch, now: DateTime<Utc>) -> Result<RunReport> {
    let snapshot = normalize(batch);
    self.check_malformed(&snapshot)?;
    let view = self.latest_view(snapshot.window).await?;

    let reconciliation = match reconcile(&snapshot, &view, now) {
      Ok(r) => r,
      Err(e) => {
        tracing::error!(
          error = %e,
          received = snapshot.stats.received,
          malformed = snapshot.stats.malformed,
          "reconciliation refused; history unchanged"
        );
        return Err(e);
      }
    };

    let summary = summarize(&snapshot, &reconciliation);
    Ok(RunReport { summary, reconciliation })
  }

  fn check_malformed(&self, snapshot: &Snapshot) -> Result<()> {
    let stats = snapshot.stats;
    let Some(limit) = self.max_malformed_ratio else { return Ok(()) };
    if stats.received == 0 {
      return Ok(());
    }

    let ratio = stats.malformed as f64 / stats.received as f64;
    if ratio > limit {
      tracing::error!(
        received = stats.received,
        malformed = stats.malformed,
        limit,
        "too many malformed rows; history unchanged"
      );
      return Err(Error::UnusableBatch {
        received:  stats.received,
        accepted:  stats.accepted,
        malformed: stats.malformed,
      });
    }
    Ok(())
  }

  /// The latest view of `window`, read from the store.
  pub async fn latest_view(&self, window: Window) -> Result<LatestView> {
    let records = self
      .store
      .records_in_window(window)
      .await
      .map_err(Error::store)?;
    Ok(LatestView::reconstruct(window, records))
  }
}

fn summarize(snapshot: &Snapshot, reconciliation: &Reconciliation) -> RunSummary {
  RunSummary {
    run_id:      Uuid::new_v4(),
    recorded_at: reconciliation.recorded_at,
    window:      reconciliation.window,
    counts:      reconciliation.counts,
    normalize:   snapshot.stats,
  }
}

fn log_abort(summary: &RunSummary, error: &Error) {
  tracing::error!(
    run_id = %summary.run_id,
    error = %error,
    would_append = summary.counts.emitted(),
    malformed = summary.normalize.malformed,
    "append failed; history unchanged"
  );
}
