//! SQL schema for the Docket SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Complaint versions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS complaints (
    complaint_id  INTEGER NOT NULL,
    date_received TEXT    NOT NULL,   -- YYYY-MM-DD; part of the natural key
    update_stamp  TEXT    NOT NULL,   -- RFC 3339 UTC, fixed width; system-assigned
    payload_json  TEXT,               -- upstream fields as a JSON object; NULL marks a deletion
    PRIMARY KEY (complaint_id, date_received, update_stamp)
);

-- One row per committed reconciliation run.
CREATE TABLE IF NOT EXISTS runs (
    run_id         TEXT PRIMARY KEY,
    recorded_at    TEXT NOT NULL,
    window_after   TEXT,              -- exclusive lower bound on date_received
    window_through TEXT,              -- inclusive upper bound on date_received
    counts         TEXT NOT NULL,     -- JSON ReconcileCounts
    normalize      TEXT NOT NULL      -- JSON NormalizeStats
);

CREATE INDEX IF NOT EXISTS complaints_received_idx ON complaints(date_received);
CREATE INDEX IF NOT EXISTS runs_recorded_idx       ON runs(recorded_at);

PRAGMA user_version = 1;
";
