//! [`SqliteStore`] — the SQLite implementation of [`HistoryStore`].

use std::{collections::HashMap, path::Path};

use docket_core::{
  complaint::Record,
  store::{Append, HistoryStore, RunSummary},
  window::Window,
};
use rusqlite::TransactionBehavior;

use crate::{
  Error, Result,
  encode::{RawRecord, RawRun, decode_dt, encode_complaint_id, encode_date, encode_dt},
  schema::SCHEMA,
};

const RECORD_COLUMNS: &str = "complaint_id, date_received, update_stamp, payload_json";
const RUN_COLUMNS: &str =
  "run_id, recorded_at, window_after, window_through, counts, normalize";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A complaint history backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_records(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Record>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn append_run(&self, appends: Vec<Append>, summary: RunSummary) -> Result<()> {
    let rows = appends
      .iter()
      .map(|a| {
        Ok((RawRecord::from_record(&a.record)?, a.replaces.map(encode_dt)))
      })
      .collect::<Result<Vec<_>>>()?;
    let run = RawRun::from_summary(&summary)?;

    // `Some((index, current))` names the first append whose key's latest
    // stamp, read inside the write transaction, is not what it expected or
    // is not older than the new record. The transaction is rolled back.
    let rejected: Option<(usize, Option<String>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
          let mut latest_stmt = tx.prepare(
            "SELECT MAX(update_stamp) FROM complaints
             WHERE complaint_id = ?1 AND date_received = ?2",
          )?;
          let mut insert_stmt = tx.prepare(
            "INSERT INTO complaints (complaint_id, date_received, update_stamp, payload_json)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          let mut pending: HashMap<(i64, String), String> = HashMap::new();

          for (index, (row, replaces)) in rows.into_iter().enumerate() {
            let key = (row.complaint_id, row.date_received.clone());
            let current = match pending.get(&key) {
              Some(stamp) => Some(stamp.clone()),
              None => latest_stmt.query_row(
                rusqlite::params![row.complaint_id, row.date_received],
                |r| r.get::<_, Option<String>>(0),
              )?,
            };

            let stale = current != replaces;
            let not_newer = current.as_ref().is_some_and(|c| row.update_stamp <= *c);
            if stale || not_newer {
              return Ok(Some((index, current)));
            }

            insert_stmt.execute(rusqlite::params![
              row.complaint_id,
              row.date_received,
              row.update_stamp,
              row.payload_json,
            ])?;
            pending.insert(key, row.update_stamp);
          }
        }

        tx.execute(
          "INSERT INTO runs (run_id, recorded_at, window_after, window_through, counts, normalize)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            run.run_id,
            run.recorded_at,
            run.window_after,
            run.window_through,
            run.counts,
            run.normalize,
          ],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    if let Some((index, current)) = rejected {
      let append = &appends[index];
      let current = current.as_deref().map(decode_dt).transpose()?;
      let err = match append.check(current) {
        Err(e) => e,
        Ok(()) => docket_core::Error::StaleBaseline {
          key:      append.record.key,
          expected: append.replaces,
          found:    current,
        },
      };
      tracing::warn!(key = %append.record.key, error = %err, "append rejected; run rolled back");
      return Err(Error::Core(err));
    }

    tracing::debug!(run_id = %summary.run_id, records = appends.len(), "appended run");
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn records_in_window(&self, window: Window) -> Result<Vec<Record>> {
    // Build WHERE clause from the bounds that are set, so an incremental
    // window can use the date_received index.
    let mut conds: Vec<&'static str> = vec![];
    let mut params: Vec<rusqlite::types::Value> = vec![];
    if let Some(after) = window.after {
      conds.push("date_received > ?");
      params.push(encode_date(after).into());
    }
    if let Some(through) = window.through {
      conds.push("date_received <= ?");
      params.push(encode_date(through).into());
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let sql = format!("SELECT {RECORD_COLUMNS} FROM complaints {where_clause} ORDER BY rowid");
    self.query_records(sql, params).await
  }

  async fn records_for_complaint(&self, complaint_id: u64) -> Result<Vec<Record>> {
    let id = encode_complaint_id(complaint_id)?;
    let sql =
      format!("SELECT {RECORD_COLUMNS} FROM complaints WHERE complaint_id = ? ORDER BY rowid");
    self.query_records(sql, vec![id.into()]).await
  }

  async fn list_runs(&self) -> Result<Vec<RunSummary>> {
    let raws: Vec<RawRun> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], RawRun::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_summary).collect()
  }

  async fn is_empty(&self) -> Result<bool> {
    let any: bool = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM complaints)",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(!any)
  }
}
