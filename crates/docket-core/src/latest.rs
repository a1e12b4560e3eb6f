//! The latest-version view: the computed current state of the history.
//!
//! Never stored, always derived: for every key in a window, the record with
//! the greatest `recorded_at`.

use std::collections::{BTreeMap, btree_map::Entry};

use crate::{
  complaint::{ComplaintKey, Record},
  window::Window,
};

/// One record per key, restricted to a [`Window`].
#[derive(Debug, Clone, Default)]
pub struct LatestView {
  window: Window,
  latest: BTreeMap<ComplaintKey, Record>,
  ties:   usize,
}

impl LatestView {
  /// Collapse `records`, given in history order, into the latest view of
  /// `window`. Records for keys outside the window are ignored.
  ///
  /// Two records of one key with an identical `recorded_at` should not
  /// exist; if they do, the one appended later wins and the tie is counted.
  pub fn reconstruct(
    window: Window,
    records: impl IntoIterator<Item = Record>,
  ) -> Self {
    let mut latest: BTreeMap<ComplaintKey, Record> = BTreeMap::new();
    let mut ties = 0;

    for record in records {
      if !window.contains(record.key.date_received) {
        continue;
      }
      match latest.entry(record.key) {
        Entry::Vacant(slot) => {
          slot.insert(record);
        }
        Entry::Occupied(mut slot) => {
          let current = slot.get().recorded_at;
          if record.recorded_at == current {
            tracing::warn!(
              key = %record.key,
              recorded_at = %current,
              "two versions share a recorded_at; keeping the later-appended one"
            );
            ties += 1;
          }
          if record.recorded_at >= current {
            slot.insert(record);
          }
        }
      }
    }

    Self { window, latest, ties }
  }

  pub fn window(&self) -> &Window { &self.window }

  pub fn get(&self, key: &ComplaintKey) -> Option<&Record> { self.latest.get(key) }

  /// All latest records, deletion markers included, ordered by key.
  pub fn iter(&self) -> impl Iterator<Item = &Record> { self.latest.values() }

  /// Latest records that are not deletion markers.
  pub fn active(&self) -> impl Iterator<Item = &Record> {
    self.latest.values().filter(|r| !r.is_deletion())
  }

  pub fn len(&self) -> usize { self.latest.len() }

  pub fn is_empty(&self) -> bool { self.latest.is_empty() }

  /// Number of equal-`recorded_at` collisions seen while reconstructing.
  pub fn ties(&self) -> usize { self.ties }
}
