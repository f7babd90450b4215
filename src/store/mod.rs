// ── Watchbot: Store ────────────────────────────────────────────────────────
// Content-addressed monitoring history in SQLite via rusqlite.
//
// The Store exclusively owns the database handle; every other component
// holds a shared reference. Writes serialize on the connection mutex.
//
// Module layout:
//   schema     — idempotent migrations, run once at open()
//   accounts   — users, competitors, pages (upserts honor uniqueness)
//   snapshots  — append-only page snapshots, ordered by captured_at
//   changes    — append-only analyzed changes + competitor timelines
//   metadata   — key/value singleton map (heartbeat/last-change marks)

use crate::error::Result;
use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

mod accounts;
mod changes;
mod metadata;
mod schema;
mod snapshots;

pub use changes::NewChange;

/// Thread-safe database wrapper.
pub struct Store {
    /// The SQLite connection, protected by a Mutex.
    pub(crate) conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("[store] Opening database at {:?}", path);
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL is best-effort: in-memory databases don't support it.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }
}

// ── Row helpers ────────────────────────────────────────────────────────────

/// Read an RFC 3339 timestamp column as `DateTime<Utc>`.
pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(idx, &s)
}

pub(crate) fn opt_ts_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Timestamps are stored as RFC 3339 text so lexical order equals
/// chronological order.
pub(crate) fn now_str() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn.lock();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        for t in ["users", "competitors", "pages", "snapshots", "changes", "metadata"] {
            assert!(tables.contains(&t.to_string()), "missing table {t}");
        }
    }

    #[test]
    fn now_str_round_trips() {
        let s = now_str();
        assert!(DateTime::parse_from_rfc3339(&s).is_ok());
    }
}
