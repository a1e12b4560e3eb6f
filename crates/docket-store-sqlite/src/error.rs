//! Error type for `docket-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain errors, including append conflicts detected at write time.
  #[error("core error: {0}")]
  Core(#[from] docket_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("complaint id {0} does not fit the id column")]
  ComplaintIdRange(u64),

  #[error("stored complaint id {0} is negative")]
  NegativeComplaintId(i64),
}

impl Error {
  pub fn is_append_conflict(&self) -> bool {
    matches!(self, Self::Core(docket_core::Error::AppendConflict { .. }))
  }

  pub fn is_stale_baseline(&self) -> bool {
    matches!(self, Self::Core(docket_core::Error::StaleBaseline { .. }))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
