//! Snapshot normalisation: raw fetched rows → keyed payloads.
//!
//! The fetcher hands over rows as maps of upstream column names to string
//! values. Column names are canonicalised, the key columns are parsed, and
//! everything else becomes the payload. Bad rows are dropped and counted;
//! they never fail the batch.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  complaint::{ComplaintKey, Payload},
  window::Window,
};

pub const COMPLAINT_ID: &str = "complaint_id";
pub const DATE_RECEIVED: &str = "date_received";

/// One upstream row, column name → raw value.
pub type RawRecord = BTreeMap<String, String>;

// ─── Input / output ──────────────────────────────────────────────────────────

/// A fetched batch together with the window it claims to cover.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
  pub window:     Window,
  pub records:    Vec<RawRecord>,
  /// Rows the fetcher could not decode at all; counted as malformed.
  pub unreadable: usize,
}

impl RawBatch {
  pub fn new(window: Window, records: Vec<RawRecord>) -> Self {
    Self { window, records, unreadable: 0 }
  }
}

/// What happened to the rows of a batch during normalisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
  pub received:      usize,
  /// Distinct keys that made it into the snapshot.
  pub accepted:      usize,
  pub malformed:     usize,
  /// Rows whose key had already been seen earlier in the batch.
  pub duplicates:    usize,
  pub out_of_window: usize,
}

/// The current fetch window's records, one payload per key.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  pub window:  Window,
  pub entries: BTreeMap<ComplaintKey, Payload>,
  pub stats:   NormalizeStats,
}

impl Snapshot {
  /// A snapshot built directly from keyed payloads, bypassing row parsing.
  pub fn from_entries(
    window: Window,
    entries: impl IntoIterator<Item = (ComplaintKey, Payload)>,
  ) -> Self {
    let entries: BTreeMap<_, _> = entries.into_iter().collect();
    let stats = NormalizeStats {
      received: entries.len(),
      accepted: entries.len(),
      ..NormalizeStats::default()
    };
    Self { window, entries, stats }
  }

  pub fn get(&self, key: &ComplaintKey) -> Option<&Payload> { self.entries.get(key) }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

// ─── Column names ────────────────────────────────────────────────────────────

/// Canonical column name: spaces become underscores, lowercase, no `?`.
///
/// `"Consumer consent provided?"` → `"consumer_consent_provided"`.
pub fn canonical_field_name(name: &str) -> String {
  name.trim().replace(' ', "_").to_lowercase().replace('?', "")
}

// ─── Single record ───────────────────────────────────────────────────────────

/// Split one raw row into its key and payload.
pub fn normalize_record(raw: &RawRecord) -> Result<(ComplaintKey, Payload)> {
  let mut complaint_id = None;
  let mut date_received = None;
  let mut payload = Payload::new();

  for (name, value) in raw {
    let field = canonical_field_name(name);
    match field.as_str() {
      COMPLAINT_ID => complaint_id = Some(parse_complaint_id(value)?),
      DATE_RECEIVED => date_received = Some(parse_date(value)?),
      _ => payload.insert(field, value.as_str()),
    }
  }

  let complaint_id = complaint_id
    .ok_or_else(|| Error::MalformedRecord(format!("missing {COMPLAINT_ID}")))?;
  let date_received = date_received
    .ok_or_else(|| Error::MalformedRecord(format!("missing {DATE_RECEIVED}")))?;

  Ok((ComplaintKey::new(complaint_id, date_received), payload))
}

fn parse_complaint_id(value: &str) -> Result<u64> {
  match value.trim().parse::<u64>() {
    Ok(id) if id > 0 => Ok(id),
    _ => Err(Error::MalformedRecord(format!(
      "{COMPLAINT_ID} is not a positive integer: {value:?}"
    ))),
  }
}

/// Parse an upstream date. Accepts ISO dates, US-style `MM/DD/YYYY`, and ISO
/// date-times (the time part is dropped).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
  let value = value.trim();
  for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
    if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
      return Ok(date);
    }
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
      return Ok(dt.date());
    }
  }
  Err(Error::MalformedRecord(format!(
    "{DATE_RECEIVED} is not a date: {value:?}"
  )))
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// Normalise a whole batch into a [`Snapshot`].
///
/// Malformed rows and rows outside the batch window are dropped. When a key
/// occurs more than once, the last occurrence wins.
pub fn normalize(batch: RawBatch) -> Snapshot {
  let RawBatch { window, records, unreadable } = batch;

  let mut stats = NormalizeStats {
    received: records.len() + unreadable,
    malformed: unreadable,
    ..NormalizeStats::default()
  };
  let mut entries = BTreeMap::new();

  for (index, raw) in records.iter().enumerate() {
    let (key, payload) = match normalize_record(raw) {
      Ok(parsed) => parsed,
      Err(e) => {
        tracing::warn!(row = index, error = %e, "skipping malformed record");
        stats.malformed += 1;
        continue;
      }
    };

    if !window.contains(key.date_received) {
      tracing::debug!(%key, %window, "skipping record outside fetch window");
      stats.out_of_window += 1;
      continue;
    }

    if entries.insert(key, payload).is_some() {
      tracing::debug!(%key, "duplicate key in snapshot; keeping last occurrence");
      stats.duplicates += 1;
    }
  }

  stats.accepted = entries.len();

  if stats.duplicates > 0 || stats.malformed > 0 || stats.out_of_window > 0 {
    tracing::info!(
      duplicates = stats.duplicates,
      malformed = stats.malformed,
      out_of_window = stats.out_of_window,
      "normalised batch with dropped rows"
    );
  }

  Snapshot { window, entries, stats }
}
