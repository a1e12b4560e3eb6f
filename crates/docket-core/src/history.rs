//! The in-memory append-only history log.
//!
//! [`History`] owns every record ever appended and never hands out mutable
//! access to one. An index from key to the position of its most recent
//! record keeps the append checks and point lookups cheap.
//! [`MemoryStore`] wraps it as a [`HistoryStore`] for tests and dry runs.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  complaint::{ComplaintKey, Record},
  store::{Append, HistoryStore, RunSummary},
  window::Window,
};

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct History {
  records: Vec<Record>,
  latest:  HashMap<ComplaintKey, usize>,
}

impl History {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// The most recently appended record for `key`.
  pub fn latest(&self, key: &ComplaintKey) -> Option<&Record> {
    self.latest.get(key).map(|&i| &self.records[i])
  }

  pub fn in_window(&self, window: Window) -> impl Iterator<Item = &Record> {
    self
      .records
      .iter()
      .filter(move |r| window.contains(r.key.date_received))
  }

  pub fn for_complaint(&self, complaint_id: u64) -> impl Iterator<Item = &Record> {
    self
      .records
      .iter()
      .filter(move |r| r.key.complaint_id == complaint_id)
  }

  /// Append `appends` as one unit.
  ///
  /// Every append must pass [`Append::check`] against the latest version of
  /// its key, counting appends earlier in the same set. On the first
  /// violation nothing is appended.
  pub fn append_all(&mut self, appends: Vec<Append>) -> Result<()> {
    let mut pending: HashMap<ComplaintKey, DateTime<Utc>> = HashMap::new();

    for append in &appends {
      let key = append.record.key;
      let current = pending
        .get(&key)
        .copied()
        .or_else(|| self.latest(&key).map(|r| r.recorded_at));

      append.check(current)?;
      pending.insert(key, append.record.recorded_at);
    }

    for Append { record, .. } in appends {
      self.latest.insert(record.key, self.records.len());
      self.records.push(record);
    }
    Ok(())
  }
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
  history: History,
  runs:    Vec<RunSummary>,
}

/// A [`HistoryStore`] that lives entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// A copy of the full history, for inspection.
  pub fn history(&self) -> History {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .history
      .clone()
  }
}

impl HistoryStore for MemoryStore {
  type Error = Error;

  async fn append_run(&self, appends: Vec<Append>, summary: RunSummary) -> Result<()> {
    let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    inner.history.append_all(appends)?;
    inner.runs.push(summary);
    Ok(())
  }

  async fn records_in_window(&self, window: Window) -> Result<Vec<Record>> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    Ok(inner.history.in_window(window).cloned().collect())
  }

  async fn records_for_complaint(&self, complaint_id: u64) -> Result<Vec<Record>> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    Ok(inner.history.for_complaint(complaint_id).cloned().collect())
  }

  async fn list_runs(&self) -> Result<Vec<RunSummary>> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    Ok(inner.runs.clone())
  }

  async fn is_empty(&self) -> Result<bool> {
    let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
    Ok(inner.history.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone};

  use super::*;
  use crate::complaint::Payload;

  fn t(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn key(id: u64) -> ComplaintKey {
    ComplaintKey::new(id, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
  }

  /// A version of `id` at `at` that replaces the version at `replaces`.
  fn rec(id: u64, product: &str, at: i64, replaces: Option<i64>) -> Append {
    Append::new(
      Record::new(key(id), [("product", product)].into_iter().collect::<Payload>(), t(at)),
      replaces.map(t),
    )
  }

  #[test]
  fn append_updates_latest_index() {
    let mut h = History::new();
    h.append_all(vec![rec(1, "loan", 100, None), rec(2, "card", 100, None)])
      .unwrap();
    h.append_all(vec![rec(1, "mortgage", 200, Some(100))]).unwrap();

    assert_eq!(h.len(), 3);
    assert_eq!(h.latest(&key(1)).unwrap().payload.get("product"), Some("mortgage"));
    assert_eq!(h.for_complaint(1).count(), 2);
  }

  #[test]
  fn non_monotonic_append_is_rejected_whole() {
    let mut h = History::new();
    h.append_all(vec![rec(1, "loan", 200, None)]).unwrap();

    let err = h
      .append_all(vec![rec(2, "card", 300, None), rec(1, "mortgage", 200, Some(200))])
      .unwrap_err();
    assert!(matches!(err, Error::AppendConflict { key: k, .. } if k == key(1)));

    // The valid record in the rejected set was not appended either.
    assert_eq!(h.len(), 1);
    assert!(h.latest(&key(2)).is_none());
  }

  #[test]
  fn conflict_within_one_set_is_rejected() {
    let mut h = History::new();
    let err = h
      .append_all(vec![rec(1, "loan", 100, None), rec(1, "card", 100, Some(100))])
      .unwrap_err();
    assert!(matches!(err, Error::AppendConflict { .. }));
    assert!(h.is_empty());
  }

  #[test]
  fn outdated_baseline_is_rejected() {
    let mut h = History::new();
    h.append_all(vec![rec(1, "loan", 100, None)]).unwrap();
    h.append_all(vec![rec(1, "card", 200, Some(100))]).unwrap();

    // Reconciled against the version at 100, but 200 has landed since.
    let err = h
      .append_all(vec![rec(1, "mortgage", 300, Some(100))])
      .unwrap_err();
    assert!(matches!(
      err,
      Error::StaleBaseline { expected, found, .. }
        if expected == Some(t(100)) && found == Some(t(200))
    ));
    assert!(err.is_conflict());
    assert_eq!(h.len(), 2);
  }

  #[test]
  fn first_version_must_not_expect_history() {
    let mut h = History::new();
    let err = h.append_all(vec![rec(1, "loan", 100, Some(50))]).unwrap_err();
    assert!(matches!(err, Error::StaleBaseline { found: None, .. }));

    h.append_all(vec![rec(1, "loan", 100, None)]).unwrap();
    let err = h.append_all(vec![rec(1, "card", 200, None)]).unwrap_err();
    assert!(matches!(err, Error::StaleBaseline { expected: None, .. }));
  }

  #[test]
  fn history_recorded_at_is_strictly_increasing_per_key() {
    let mut h = History::new();
    let mut previous = None;
    for (i, at) in [100, 200, 300].into_iter().enumerate() {
      h.append_all(vec![rec(1, &format!("v{i}"), at, previous)]).unwrap();
      previous = Some(at);
    }
    let stamps: Vec<_> = h.for_complaint(1).map(|r| r.recorded_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
  }

  #[tokio::test]
  async fn memory_store_rejects_conflicting_run() {
    let store = MemoryStore::new();
    let summary = RunSummary {
      run_id:      uuid::Uuid::new_v4(),
      recorded_at: t(100),
      window:      Window::full(),
      counts:      Default::default(),
      normalize:   Default::default(),
    };
    store
      .append_run(vec![rec(1, "loan", 100, None)], summary.clone())
      .await
      .unwrap();

    let err = store
      .append_run(vec![rec(1, "card", 50, Some(100))], summary)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AppendConflict { .. }));
    assert_eq!(store.list_runs().await.unwrap().len(), 1);
    assert_eq!(store.records_for_complaint(1).await.unwrap().len(), 1);
  }
}
