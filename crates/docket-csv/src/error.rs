//! Error types for the docket-csv reader.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to open {path}: {source}")]
  Open {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("CSV header row unreadable: {0}")]
  Header(#[source] csv::Error),

  #[error("CSV has no header row")]
  MissingHeaders,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
