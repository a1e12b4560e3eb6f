//! Aggregations over the history for charts and summaries.
//!
//! Two families: activity per capture day (`recorded_at`), taken from the
//! run counters or re-derived from raw history, and complaint counts per
//! receipt day (`date_received`) for one entity, taken from the latest view.
//!
//! Charting convention: deletions are subtracted from additions
//! (`created_net`) and are not counted as updates.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  complaint::{ComplaintKey, Record},
  latest::LatestView,
  reconcile::ReconcileCounts,
  store::RunSummary,
};

// ─── Daily activity ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
  pub day:         NaiveDate,
  pub new:         usize,
  pub amended:     usize,
  pub deleted:     usize,
  /// `new - deleted`.
  pub created_net: i64,
  /// Equal to `amended`; deletions are not updates.
  pub updated:     usize,
}

impl DailyActivity {
  fn from_counts(day: NaiveDate, c: ReconcileCounts) -> Self {
    Self {
      day,
      new: c.new,
      amended: c.amended,
      deleted: c.deleted,
      created_net: c.new as i64 - c.deleted as i64,
      updated: c.amended,
    }
  }
}

fn collect_days(days: BTreeMap<NaiveDate, ReconcileCounts>) -> Vec<DailyActivity> {
  days
    .into_iter()
    .map(|(day, c)| DailyActivity::from_counts(day, c))
    .collect()
}

/// Sum the run counters per `recorded_at` calendar day (UTC).
pub fn daily_activity(runs: &[RunSummary]) -> Vec<DailyActivity> {
  let mut days: BTreeMap<NaiveDate, ReconcileCounts> = BTreeMap::new();
  for run in runs {
    let day = days.entry(run.recorded_at.date_naive()).or_default();
    day.new += run.counts.new;
    day.amended += run.counts.amended;
    day.deleted += run.counts.deleted;
  }
  collect_days(days)
}

/// Re-derive daily activity from history alone, given in append order.
///
/// A key's first record, or its first record after a deletion marker, is a
/// creation; a deletion marker after a live record is a deletion; any other
/// record is an amendment.
pub fn activity_from_history<'a>(
  records: impl IntoIterator<Item = &'a Record>,
) -> Vec<DailyActivity> {
  let mut live: HashMap<ComplaintKey, bool> = HashMap::new();
  let mut days: BTreeMap<NaiveDate, ReconcileCounts> = BTreeMap::new();

  for record in records {
    let was_live = live.get(&record.key).copied().unwrap_or(false);
    let day = record.recorded_at.date_naive();

    match (was_live, record.is_deletion()) {
      (false, false) => days.entry(day).or_default().new += 1,
      (true, false) => days.entry(day).or_default().amended += 1,
      (true, true) => days.entry(day).or_default().deleted += 1,
      (false, true) => {
        tracing::warn!(key = %record.key, "deletion marker without a live version");
      }
    }
    live.insert(record.key, !record.is_deletion());
  }

  collect_days(days)
}

// ─── Entity series ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
  pub date:       NaiveDate,
  /// Complaints received on `date`.
  pub count:      usize,
  /// Complaints received on or before `date`.
  pub cumulative: usize,
}

/// Complaints over time for the entity whose `field` equals `value`
/// (e.g. `company`), counted from live latest records by `date_received`.
pub fn entity_series(view: &LatestView, field: &str, value: &str) -> Vec<SeriesPoint> {
  let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
  for record in view.active() {
    if record.payload.get(field) == Some(value) {
      *per_day.entry(record.key.date_received).or_default() += 1;
    }
  }

  let mut cumulative = 0;
  per_day
    .into_iter()
    .map(|(date, count)| {
      cumulative += count;
      SeriesPoint { date, count, cumulative }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::{complaint::Payload, window::Window};

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
  }

  fn key(id: u64) -> ComplaintKey { ComplaintKey::new(id, d(2024, 1, 5)) }

  fn payload(pairs: &[(&str, &str)]) -> Payload { pairs.iter().copied().collect() }

  #[test]
  fn history_activity_on_one_day() {
    let history = vec![
      Record::new(key(1), payload(&[("product", "loan")]), at(1, 1)),
      Record::new(key(2), payload(&[("product", "card")]), at(1, 1)),
      Record::new(key(1), payload(&[("product", "mortgage")]), at(1, 2)),
      Record::deletion(key(2), at(1, 3)),
    ];

    let days = activity_from_history(&history);
    assert_eq!(days.len(), 1);
    let day = days[0];
    assert_eq!((day.new, day.amended, day.deleted), (2, 1, 1));
    assert_eq!(day.created_net, 1);
    assert_eq!(day.updated, 1);
  }

  #[test]
  fn recreation_after_deletion_counts_as_new() {
    let history = vec![
      Record::new(key(1), payload(&[("product", "loan")]), at(1, 1)),
      Record::deletion(key(1), at(2, 1)),
      Record::new(key(1), payload(&[("product", "loan")]), at(3, 1)),
    ];

    let days = activity_from_history(&history);
    assert_eq!(days.len(), 3);
    assert_eq!(days[0].new, 1);
    assert_eq!(days[1].deleted, 1);
    assert_eq!(days[2].new, 1);
    assert_eq!(days[2].amended, 0);
  }

  #[test]
  fn run_counters_sum_per_day() {
    let run = |hour, new, amended, deleted| RunSummary {
      run_id:      Uuid::new_v4(),
      recorded_at: at(1, hour),
      window:      Window::full(),
      counts:      ReconcileCounts { new, amended, deleted, ..Default::default() },
      normalize:   Default::default(),
    };

    let days = daily_activity(&[run(1, 2, 0, 0), run(5, 0, 1, 1)]);
    assert_eq!(days.len(), 1);
    assert_eq!((days[0].new, days[0].amended, days[0].deleted), (2, 1, 1));
    assert_eq!(days[0].created_net, 1);
  }

  #[test]
  fn entity_series_counts_live_latest_records() {
    let equifax = [("company", "EQUIFAX, INC.")];
    let other = [("company", "TRANSUNION")];
    let k = |id, date| ComplaintKey::new(id, date);

    let view = LatestView::reconstruct(Window::full(), vec![
      Record::new(k(1, d(2024, 1, 1)), payload(&equifax), at(1, 1)),
      Record::new(k(2, d(2024, 1, 1)), payload(&equifax), at(1, 1)),
      Record::new(k(3, d(2024, 1, 3)), payload(&equifax), at(1, 1)),
      Record::new(k(4, d(2024, 1, 3)), payload(&other), at(1, 1)),
      Record::new(k(5, d(2024, 1, 4)), payload(&equifax), at(1, 1)),
      Record::deletion(k(5, d(2024, 1, 4)), at(2, 1)),
    ]);

    let series = entity_series(&view, "company", "EQUIFAX, INC.");
    assert_eq!(series, vec![
      SeriesPoint { date: d(2024, 1, 1), count: 2, cumulative: 2 },
      SeriesPoint { date: d(2024, 1, 3), count: 1, cumulative: 3 },
    ]);
  }
}
