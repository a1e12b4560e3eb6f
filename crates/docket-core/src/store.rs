//! The `HistoryStore` trait and the run summary it persists.
//!
//! The trait is implemented by storage backends (e.g. `docket-store-sqlite`,
//! or [`crate::history::MemoryStore`]). The pipeline, API and CLI depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  complaint::Record,
  normalize::NormalizeStats,
  reconcile::ReconcileCounts,
  window::Window,
};

// ─── Run summary ─────────────────────────────────────────────────────────────

/// Everything reporting needs to know about one committed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
  pub run_id:      Uuid,
  /// The `recorded_at` of every record the run appended.
  pub recorded_at: DateTime<Utc>,
  pub window:      Window,
  pub counts:      ReconcileCounts,
  pub normalize:   NormalizeStats,
}

// ─── Append ──────────────────────────────────────────────────────────────────

/// A record to append, together with the version it was reconciled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Append {
  pub record:   Record,
  /// `recorded_at` of the key's latest stored version when the run read its
  /// baseline, deletion markers included. `None` if the key had no history.
  pub replaces: Option<DateTime<Utc>>,
}

impl Append {
  pub fn new(record: Record, replaces: Option<DateTime<Utc>>) -> Self {
    Self { record, replaces }
  }

  /// Check this append against the key's current latest `recorded_at`.
  ///
  /// Fails with [`Error::StaleBaseline`] if another version was appended
  /// since the baseline was read, and with [`Error::AppendConflict`] if the
  /// record is not strictly newer than the current latest version.
  pub fn check(&self, current: Option<DateTime<Utc>>) -> crate::Result<()> {
    let key = self.record.key;
    if current != self.replaces {
      return Err(Error::StaleBaseline { key, expected: self.replaces, found: current });
    }
    if let Some(latest) = current
      && self.record.recorded_at <= latest
    {
      return Err(Error::AppendConflict {
        key,
        recorded_at: self.record.recorded_at,
        latest,
      });
    }
    Ok(())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a complaint history backend.
///
/// History is append-only: no method updates or removes a record. All
/// methods return `Send` futures so the trait can be used from multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait HistoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Append a run's records together with its summary, all or nothing.
  ///
  /// Each append is validated with [`Append::check`] against the latest
  /// `recorded_at` of its key (counting earlier appends in the same set),
  /// read under the same lock or transaction as the write. On the first
  /// failure history is left untouched.
  fn append_run(
    &self,
    appends: Vec<Append>,
    summary: RunSummary,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All records whose `date_received` lies in `window`, in append order.
  fn records_in_window(
    &self,
    window: Window,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Every version of one complaint, in append order.
  fn records_for_complaint(
    &self,
    complaint_id: u64,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Committed runs, oldest first.
  fn list_runs(
    &self,
  ) -> impl Future<Output = Result<Vec<RunSummary>, Self::Error>> + Send + '_;

  /// Whether history holds no records at all.
  fn is_empty(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
