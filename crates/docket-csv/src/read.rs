//! Row decoding.

use std::{fs::File, io, path::Path};

use docket_core::{
  normalize::{RawBatch, RawRecord},
  window::Window,
};

use crate::{Error, Result};

/// Read every row of `reader` into a batch for `window`.
///
/// Rows that cannot be decoded (e.g. invalid UTF-8) are skipped and counted
/// in [`RawBatch::unreadable`]. Short or long rows are accepted; missing
/// trailing cells are simply absent from the row map.
pub fn read_batch<R: io::Read>(reader: R, window: Window) -> Result<RawBatch> {
  let mut rdr = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_reader(reader);

  let headers = rdr.headers().map_err(Error::Header)?.clone();
  if headers.is_empty() {
    return Err(Error::MissingHeaders);
  }

  let mut batch = RawBatch::new(window, Vec::new());

  for (index, result) in rdr.records().enumerate() {
    let row = match result {
      Ok(row) => row,
      Err(e) => {
        tracing::warn!(row = index + 1, error = %e, "skipping unreadable CSV row");
        batch.unreadable += 1;
        continue;
      }
    };

    let record: RawRecord = headers
      .iter()
      .zip(row.iter())
      .map(|(name, value)| (name.to_owned(), value.to_owned()))
      .collect();
    batch.records.push(record);
  }

  tracing::debug!(
    rows = batch.records.len(),
    unreadable = batch.unreadable,
    %window,
    "read CSV batch"
  );
  Ok(batch)
}

/// Open `path` and read it with [`read_batch`].
pub fn read_batch_from_path(path: impl AsRef<Path>, window: Window) -> Result<RawBatch> {
  let path = path.as_ref();
  let file = File::open(path).map_err(|source| Error::Open {
    path: path.to_path_buf(),
    source,
  })?;
  read_batch(io::BufReader::new(file), window)
}
