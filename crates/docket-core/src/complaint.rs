//! Complaint keys, payloads and records.
//!
//! A record is one captured version of one complaint. Records are never
//! updated; a change upstream is expressed by appending a newer record for
//! the same key, and a removal upstream by appending a deletion marker.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The natural key of a complaint. Neither part ever changes once the
/// complaint exists, including after it is removed upstream.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ComplaintKey {
  pub complaint_id:  u64,
  pub date_received: NaiveDate,
}

impl ComplaintKey {
  pub fn new(complaint_id: u64, date_received: NaiveDate) -> Self {
    Self { complaint_id, date_received }
  }
}

impl fmt::Display for ComplaintKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.complaint_id, self.date_received)
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Every upstream field of a complaint other than the key.
///
/// Null and absent are the same state: empty values are never stored, so two
/// payloads are equal exactly when they carry the same non-empty fields.
/// An empty payload is the payload of a deletion marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
  pub fn new() -> Self { Self::default() }

  /// Set `field` to `value`. An empty value clears the field.
  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
    let field = field.into();
    let value = value.into();
    if value.is_empty() {
      self.0.remove(&field);
    } else {
      self.0.insert(field, value);
    }
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl<K, V> FromIterator<(K, V)> for Payload
where
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut payload = Payload::new();
    for (k, v) in iter {
      payload.insert(k, v);
    }
    payload
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One immutable version of one complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  pub key:         ComplaintKey,
  pub payload:     Payload,
  /// When this system captured the version; strictly increasing per key.
  pub recorded_at: DateTime<Utc>,
}

impl Record {
  pub fn new(key: ComplaintKey, payload: Payload, recorded_at: DateTime<Utc>) -> Self {
    Self { key, payload, recorded_at }
  }

  /// A deletion marker: the key survives, every upstream field is null.
  pub fn deletion(key: ComplaintKey, recorded_at: DateTime<Utc>) -> Self {
    Self { key, payload: Payload::new(), recorded_at }
  }

  pub fn is_deletion(&self) -> bool { self.payload.is_empty() }
}
