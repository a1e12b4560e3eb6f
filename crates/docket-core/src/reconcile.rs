//! The reconciliation engine: snapshot + latest view → rows to append.
//!
//! Every key in the union of the snapshot and the latest view is classified
//! once. Only keys with a non-deleted latest record count as a baseline, so a
//! complaint that reappears after being deleted is new again.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  complaint::{ComplaintKey, Payload, Record},
  latest::LatestView,
  normalize::Snapshot,
  store::Append,
  window::Window,
};

// ─── Classification ──────────────────────────────────────────────────────────

/// What a reconciliation run decided for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
  New,
  Unchanged,
  Amended,
  Deleted,
  /// Absent upstream and already marked deleted; nothing to write.
  AlreadyDeleted,
}

impl Classification {
  /// Whether this classification appends a record to history.
  pub fn emits(self) -> bool { matches!(self, Self::New | Self::Amended | Self::Deleted) }
}

/// Classify one key from its incoming payload and its latest stored record.
///
/// An empty incoming payload signals removal and is treated as absent.
pub fn classify(incoming: Option<&Payload>, latest: Option<&Record>) -> Classification {
  let incoming = incoming.filter(|p| !p.is_empty());
  let baseline = latest.filter(|r| !r.is_deletion());

  match (incoming, baseline) {
    (Some(_), None) => Classification::New,
    (Some(p), Some(b)) if *p == b.payload => Classification::Unchanged,
    (Some(_), Some(_)) => Classification::Amended,
    (None, Some(_)) => Classification::Deleted,
    (None, None) => Classification::AlreadyDeleted,
  }
}

// ─── Counters ────────────────────────────────────────────────────────────────

/// Per-run classification counters, exposed as-is to reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
  pub new:             usize,
  pub amended:         usize,
  pub deleted:         usize,
  pub unchanged:       usize,
  pub already_deleted: usize,
}

impl ReconcileCounts {
  pub fn record(&mut self, classification: Classification) {
    match classification {
      Classification::New => self.new += 1,
      Classification::Amended => self.amended += 1,
      Classification::Deleted => self.deleted += 1,
      Classification::Unchanged => self.unchanged += 1,
      Classification::AlreadyDeleted => self.already_deleted += 1,
    }
  }

  /// Number of records the run appends.
  pub fn emitted(&self) -> usize { self.new + self.amended + self.deleted }
}

// ─── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
  pub key:            ComplaintKey,
  pub classification: Classification,
}

/// The full decision of one reconciliation run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
  pub window:      Window,
  pub recorded_at: DateTime<Utc>,
  /// Records to append, ordered by key.
  pub records:     Vec<Record>,
  /// One outcome per key considered, ordered by key.
  pub outcomes:    Vec<Outcome>,
  /// Latest `recorded_at` the run saw for each emitted key with history.
  pub baselines:   BTreeMap<ComplaintKey, DateTime<Utc>>,
  pub counts:      ReconcileCounts,
}

impl Reconciliation {
  pub fn classification(&self, key: &ComplaintKey) -> Option<Classification> {
    self
      .outcomes
      .binary_search_by(|o| o.key.cmp(key))
      .ok()
      .map(|i| self.outcomes[i].classification)
  }

  /// The emitted records paired with the baseline each was derived from.
  pub fn appends(&self) -> Vec<Append> {
    self
      .records
      .iter()
      .map(|r| Append::new(r.clone(), self.baselines.get(&r.key).copied()))
      .collect()
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Reconcile `snapshot` against `view` at time `now`.
///
/// Both sides must cover the same window; otherwise keys that were simply not
/// fetched would be classified as deleted. A snapshot in which every received
/// row was malformed is refused for the same reason. Nothing is emitted on
/// error.
pub fn reconcile(
  snapshot: &Snapshot,
  view: &LatestView,
  now: DateTime<Utc>,
) -> Result<Reconciliation> {
  if snapshot.window != *view.window() {
    return Err(Error::WindowMismatch {
      snapshot: snapshot.window,
      view:     *view.window(),
    });
  }
  let stats = snapshot.stats;
  if stats.accepted == 0 && stats.malformed > 0 {
    return Err(Error::UnusableBatch {
      received:  stats.received,
      accepted:  stats.accepted,
      malformed: stats.malformed,
    });
  }

  let window = snapshot.window;

  let keys: BTreeSet<ComplaintKey> = snapshot
    .entries
    .keys()
    .copied()
    .chain(view.iter().map(|r| r.key))
    .collect();

  let mut records = Vec::new();
  let mut outcomes = Vec::with_capacity(keys.len());
  let mut baselines = BTreeMap::new();
  let mut counts = ReconcileCounts::default();

  for key in keys {
    if !window.contains(key.date_received) {
      tracing::warn!(%key, %window, "ignoring snapshot key outside its own window");
      continue;
    }

    let incoming = snapshot.get(&key);
    let latest = view.get(&key);
    let classification = classify(incoming, latest);

    if classification.emits() {
      if let Some(latest) = latest {
        if latest.recorded_at >= now {
          return Err(Error::AppendConflict {
            key,
            recorded_at: now,
            latest: latest.recorded_at,
          });
        }
        baselines.insert(key, latest.recorded_at);
      }

      let record = match (classification, incoming) {
        (Classification::Deleted, _) | (_, None) => Record::deletion(key, now),
        (_, Some(payload)) => Record::new(key, payload.clone(), now),
      };
      tracing::debug!(%key, ?classification, "emitting record");
      records.push(record);
    }

    counts.record(classification);
    outcomes.push(Outcome { key, classification });
  }

  Ok(Reconciliation { window, recorded_at: now, records, outcomes, baselines, counts })
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone};

  use super::*;
  use crate::normalize::NormalizeStats;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn t(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn product(p: &str) -> Payload { [("product", p)].into_iter().collect() }

  fn key() -> ComplaintKey { ComplaintKey::new(1, d(2024, 1, 5)) }

  fn snapshot(entries: Vec<(ComplaintKey, Payload)>) -> Snapshot {
    Snapshot::from_entries(Window::full(), entries)
  }

  fn view(records: Vec<Record>) -> LatestView {
    LatestView::reconstruct(Window::full(), records)
  }

  #[test]
  fn new_key_emits_record() {
    let result = reconcile(
      &snapshot(vec![(key(), product("loan"))]),
      &view(vec![]),
      t(100),
    )
    .unwrap();

    assert_eq!(result.counts.new, 1);
    assert_eq!(result.records, vec![Record::new(key(), product("loan"), t(100))]);
    assert_eq!(result.classification(&key()), Some(Classification::New));
  }

  #[test]
  fn equal_payload_is_unchanged() {
    let result = reconcile(
      &snapshot(vec![(key(), product("loan"))]),
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap();

    assert!(result.records.is_empty());
    assert_eq!(result.counts.unchanged, 1);
  }

  #[test]
  fn null_and_absent_fields_compare_equal() {
    let mut incoming = product("loan");
    incoming.insert("sub_product", "");

    let result = reconcile(
      &snapshot(vec![(key(), incoming)]),
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap();
    assert_eq!(result.counts.unchanged, 1);
  }

  #[test]
  fn changed_payload_is_amended() {
    let result = reconcile(
      &snapshot(vec![(key(), product("mortgage"))]),
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap();

    assert_eq!(result.counts.amended, 1);
    assert_eq!(result.records[0].payload, product("mortgage"));
    assert_eq!(result.records[0].recorded_at, t(200));
  }

  #[test]
  fn missing_key_is_deleted_once() {
    let first = reconcile(
      &snapshot(vec![]),
      &view(vec![Record::new(key(), product("mortgage"), t(200))]),
      t(300),
    )
    .unwrap();

    assert_eq!(first.counts.deleted, 1);
    assert!(first.records[0].is_deletion());

    let second = reconcile(
      &snapshot(vec![]),
      &view(vec![
        Record::new(key(), product("mortgage"), t(200)),
        Record::deletion(key(), t(300)),
      ]),
      t(400),
    )
    .unwrap();

    assert!(second.records.is_empty());
    assert_eq!(second.counts.already_deleted, 1);
  }

  #[test]
  fn reappearing_key_is_new_not_amended() {
    let result = reconcile(
      &snapshot(vec![(key(), product("loan"))]),
      &view(vec![
        Record::new(key(), product("loan"), t(100)),
        Record::deletion(key(), t(200)),
      ]),
      t(300),
    )
    .unwrap();

    assert_eq!(result.classification(&key()), Some(Classification::New));
  }

  #[test]
  fn empty_incoming_payload_counts_as_removal() {
    let result = reconcile(
      &snapshot(vec![(key(), Payload::new())]),
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap();
    assert_eq!(result.counts.deleted, 1);
  }

  #[test]
  fn window_mismatch_is_refused() {
    let snap = Snapshot::from_entries(Window::last_days(d(2024, 2, 1), 30), vec![]);
    let err = reconcile(&snap, &view(vec![]), t(100)).unwrap_err();
    assert!(matches!(err, Error::WindowMismatch { .. }));
  }

  #[test]
  fn stale_clock_is_refused_before_emitting() {
    let err = reconcile(
      &snapshot(vec![(key(), product("mortgage"))]),
      &view(vec![Record::new(key(), product("loan"), t(200))]),
      t(200),
    )
    .unwrap_err();
    assert!(matches!(err, Error::AppendConflict { .. }));
  }

  #[test]
  fn stale_clock_is_fine_when_nothing_changes() {
    let result = reconcile(
      &snapshot(vec![(key(), product("loan"))]),
      &view(vec![Record::new(key(), product("loan"), t(200))]),
      t(100),
    )
    .unwrap();
    assert_eq!(result.counts.unchanged, 1);
  }

  #[test]
  fn fully_malformed_snapshot_deletes_nothing() {
    let snap = Snapshot {
      window:  Window::full(),
      entries: BTreeMap::new(),
      stats:   NormalizeStats { received: 2, malformed: 2, ..Default::default() },
    };
    let err = reconcile(
      &snap,
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnusableBatch { received: 2, malformed: 2, .. }));
  }

  #[test]
  fn empty_snapshot_without_malformed_rows_still_deletes() {
    let result = reconcile(
      &snapshot(vec![]),
      &view(vec![Record::new(key(), product("loan"), t(100))]),
      t(200),
    )
    .unwrap();
    assert_eq!(result.counts.deleted, 1);
  }

  #[test]
  fn appends_carry_the_baseline_they_replace() {
    let k2 = ComplaintKey::new(2, d(2024, 1, 5));
    let result = reconcile(
      &snapshot(vec![(key(), product("loan")), (k2, product("card"))]),
      &view(vec![
        Record::new(key(), product("loan"), t(100)),
        Record::deletion(key(), t(150)),
      ]),
      t(200),
    )
    .unwrap();

    let appends = result.appends();
    assert_eq!(appends.len(), 2);
    assert_eq!(appends[0].record.key, key());
    assert_eq!(appends[0].replaces, Some(t(150)));
    assert_eq!(appends[1].record.key, k2);
    assert_eq!(appends[1].replaces, None);
  }

  #[test]
  fn outcomes_are_ordered_by_key() {
    let k1 = ComplaintKey::new(1, d(2024, 1, 5));
    let k2 = ComplaintKey::new(2, d(2024, 1, 5));
    let k3 = ComplaintKey::new(3, d(2024, 1, 5));
    let result = reconcile(
      &snapshot(vec![(k3, product("a")), (k1, product("b"))]),
      &view(vec![Record::new(k2, product("c"), t(100))]),
      t(200),
    )
    .unwrap();

    let keys: Vec<_> = result.outcomes.iter().map(|o| o.key).collect();
    assert_eq!(keys, vec![k1, k2, k3]);
    assert_eq!(result.counts.emitted(), 3);
  }
}
