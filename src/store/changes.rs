// Append-only analyzed changes. Immutable once written; each row points at
// the two snapshots it was computed from.

use super::{now_str, ts_col, Store};
use crate::error::Result;
use crate::types::{Change, Severity};
use chrono::{DateTime, Utc};
use rusqlite::params;

/// Parameters for persisting one analyzed change.
pub struct NewChange<'a> {
    pub page_id: i64,
    pub old_snapshot_id: Option<i64>,
    pub new_snapshot_id: i64,
    pub severity: Severity,
    pub summary: &'a str,
    pub raw_diff: &'a str,
    pub additions: usize,
    pub deletions: usize,
}

impl Store {
    pub fn save_change(&self, change: &NewChange<'_>) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO changes
                (page_id, old_snapshot_id, new_snapshot_id, severity, summary,
                 raw_diff, additions, deletions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                change.page_id,
                change.old_snapshot_id,
                change.new_snapshot_id,
                change.severity.as_str(),
                change.summary,
                change.raw_diff,
                change.additions as i64,
                change.deletions as i64,
                now_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_change(&self, page_id: i64) -> Result<Option<Change>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, page_id, old_snapshot_id, new_snapshot_id, severity,
                    summary, raw_diff, additions, deletions, created_at
             FROM changes WHERE page_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1",
            params![page_id],
            change_from_row,
        );
        match result {
            Ok(change) => Ok(Some(change)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All changes across a competitor's pages, newest first.
    pub fn timeline_by_competitor(&self, competitor_id: i64) -> Result<Vec<Change>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ch.id, ch.page_id, ch.old_snapshot_id, ch.new_snapshot_id,
                    ch.severity, ch.summary, ch.raw_diff, ch.additions,
                    ch.deletions, ch.created_at
             FROM changes ch
             JOIN pages p ON p.id = ch.page_id
             WHERE p.competitor_id = ?1
             ORDER BY ch.created_at DESC, ch.id DESC",
        )?;
        let changes = stmt
            .query_map(params![competitor_id], change_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(changes)
    }

    /// Timestamp of the newest change anywhere, for the heartbeat decision.
    pub fn newest_change_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT created_at FROM changes ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| ts_col(row, 0),
        );
        match result {
            Ok(ts) => Ok(Some(ts)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_changes(&self, page_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM changes WHERE page_id = ?1",
            params![page_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn change_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Change> {
    Ok(Change {
        id: row.get(0)?,
        page_id: row.get(1)?,
        old_snapshot_id: row.get(2)?,
        new_snapshot_id: row.get(3)?,
        severity: Severity::parse(&row.get::<_, String>(4)?).unwrap_or(Severity::Important),
        summary: row.get(5)?,
        raw_diff: row.get(6)?,
        additions: row.get::<_, i64>(7)? as usize,
        deletions: row.get::<_, i64>(8)? as usize,
        created_at: ts_col(row, 9)?,
    })
}
