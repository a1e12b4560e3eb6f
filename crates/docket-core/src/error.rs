//! Error types for `docket-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{complaint::ComplaintKey, window::Window};

#[derive(Debug, Error)]
pub enum Error {
  /// A raw record could not be turned into a keyed payload. Batch-local:
  /// the record is dropped and the batch continues.
  #[error("malformed record: {0}")]
  MalformedRecord(String),

  /// The snapshot and the latest view were restricted to different windows.
  /// Reconciling them would mark untouched records as deleted.
  #[error("window mismatch: snapshot covers {snapshot}, latest view covers {view}")]
  WindowMismatch { snapshot: Window, view: Window },

  /// A record would not be strictly newer than the latest stored version of
  /// its key.
  #[error(
    "append conflict for {key}: recorded_at {recorded_at} is not after {latest}"
  )]
  AppendConflict {
    key:         ComplaintKey,
    recorded_at: DateTime<Utc>,
    latest:      DateTime<Utc>,
  },

  /// The latest stored version of a key is no longer the one the run was
  /// reconciled against; another run appended in between.
  #[error(
    "stale baseline for {key}: reconciled against {expected:?}, latest is {found:?}"
  )]
  StaleBaseline {
    key:      ComplaintKey,
    expected: Option<DateTime<Utc>>,
    found:    Option<DateTime<Utc>>,
  },

  /// Too few rows of a batch could be parsed to trust it as the state of
  /// its window. Reconciling would mark the window's complaints deleted.
  #[error("unusable batch: {malformed} of {received} rows malformed, {accepted} accepted")]
  UnusableBatch {
    received:  usize,
    accepted:  usize,
    malformed: usize,
  },

  #[error("invalid window: {0}")]
  InvalidWindow(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error from a [`crate::store::HistoryStore`]. Backends
  /// that already report this type are passed through unwrapped.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    match boxed.downcast::<Self>() {
      Ok(core) => *core,
      Err(other) => Self::Store(other),
    }
  }

  /// Whether the error is a write-time conflict with another run, including
  /// one reported through a backend error's source chain.
  pub fn is_conflict(&self) -> bool {
    match self {
      Self::AppendConflict { .. } | Self::StaleBaseline { .. } => true,
      Self::Store(e) => {
        let mut next: Option<&(dyn std::error::Error + 'static)> = Some(e.as_ref());
        while let Some(err) = next {
          if let Some(core) = err.downcast_ref::<Self>() {
            return core.is_conflict();
          }
          next = err.source();
        }
        false
      }
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
