//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed nanosecond
//! width, so comparing two stamps as strings compares them as instants.
//! Dates are `YYYY-MM-DD`. Payloads and counters are stored as compact JSON.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use docket_core::{
  complaint::{ComplaintKey, Payload, Record},
  normalize::NormalizeStats,
  reconcile::ReconcileCounts,
  store::RunSummary,
  window::Window,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Complaint id ─────────────────────────────────────────────────────────────

pub fn encode_complaint_id(id: u64) -> Result<i64> {
  i64::try_from(id).map_err(|_| Error::ComplaintIdRange(id))
}

pub fn decode_complaint_id(id: i64) -> Result<u64> {
  u64::try_from(id).map_err(|_| Error::NegativeComplaintId(id))
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// `None` for a deletion marker, so every upstream column reads as NULL.
pub fn encode_payload(p: &Payload) -> Result<Option<String>> {
  if p.is_empty() {
    Ok(None)
  } else {
    Ok(Some(serde_json::to_string(p)?))
  }
}

pub fn decode_payload(s: Option<&str>) -> Result<Payload> {
  match s {
    Some(json) => Ok(serde_json::from_str(json)?),
    None => Ok(Payload::new()),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of one `complaints` row.
pub struct RawRecord {
  pub complaint_id:  i64,
  pub date_received: String,
  pub update_stamp:  String,
  pub payload_json:  Option<String>,
}

impl RawRecord {
  pub fn from_record(r: &Record) -> Result<Self> {
    Ok(Self {
      complaint_id:  encode_complaint_id(r.key.complaint_id)?,
      date_received: encode_date(r.key.date_received),
      update_stamp:  encode_dt(r.recorded_at),
      payload_json:  encode_payload(&r.payload)?,
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      complaint_id:  row.get(0)?,
      date_received: row.get(1)?,
      update_stamp:  row.get(2)?,
      payload_json:  row.get(3)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    let key = ComplaintKey::new(
      decode_complaint_id(self.complaint_id)?,
      decode_date(&self.date_received)?,
    );
    Ok(Record::new(
      key,
      decode_payload(self.payload_json.as_deref())?,
      decode_dt(&self.update_stamp)?,
    ))
  }
}

/// Column values of one `runs` row.
pub struct RawRun {
  pub run_id:         String,
  pub recorded_at:    String,
  pub window_after:   Option<String>,
  pub window_through: Option<String>,
  pub counts:         String,
  pub normalize:      String,
}

impl RawRun {
  pub fn from_summary(s: &RunSummary) -> Result<Self> {
    Ok(Self {
      run_id:         encode_uuid(s.run_id),
      recorded_at:    encode_dt(s.recorded_at),
      window_after:   s.window.after.map(encode_date),
      window_through: s.window.through.map(encode_date),
      counts:         serde_json::to_string(&s.counts)?,
      normalize:      serde_json::to_string(&s.normalize)?,
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      run_id:         row.get(0)?,
      recorded_at:    row.get(1)?,
      window_after:   row.get(2)?,
      window_through: row.get(3)?,
      counts:         row.get(4)?,
      normalize:      row.get(5)?,
    })
  }

  pub fn into_summary(self) -> Result<RunSummary> {
    let window = Window {
      after:   self.window_after.as_deref().map(decode_date).transpose()?,
      through: self.window_through.as_deref().map(decode_date).transpose()?,
    };
    let counts: ReconcileCounts = serde_json::from_str(&self.counts)?;
    let normalize: NormalizeStats = serde_json::from_str(&self.normalize)?;

    Ok(RunSummary {
      run_id: decode_uuid(&self.run_id)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      window,
      counts,
      normalize,
    })
  }
}
