//! CSV reader for upstream complaint exports.
//!
//! Turns a CSV export (header row + one complaint per row) into a
//! [`RawBatch`] tagged with the window the export is meant to cover. Column
//! names are passed through untouched; canonicalisation and key parsing are
//! the normaliser's job. Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use docket_core::window::Window;
//!
//! let batch = docket_csv::read_batch_from_path("complaints.csv", Window::full()).unwrap();
//! println!("{} rows, {} unreadable", batch.records.len(), batch.unreadable);
//! ```

pub mod error;
mod read;

pub use error::{Error, Result};
pub use read::{read_batch, read_batch_from_path};
