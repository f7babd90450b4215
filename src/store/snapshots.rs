// Append-only page snapshots. The pipeline guarantees two consecutive
// snapshots of a page never share a checksum; this module just stores and
// orders them.

use super::{now_str, ts_col, Store};
use crate::error::Result;
use crate::types::Snapshot;
use rusqlite::params;

impl Store {
    /// Persist a new snapshot, returning its id.
    pub fn save_snapshot(&self, page_id: i64, content: &str, checksum: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO snapshots (page_id, content, checksum, captured_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![page_id, content, checksum, now_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent snapshot of a page.
    pub fn latest_snapshot(&self, page_id: i64) -> Result<Option<Snapshot>> {
        self.snapshot_at_offset(page_id, 0)
    }

    /// Second most recent snapshot (the one before the latest).
    pub fn previous_snapshot(&self, page_id: i64) -> Result<Option<Snapshot>> {
        self.snapshot_at_offset(page_id, 1)
    }

    fn snapshot_at_offset(&self, page_id: i64, offset: i64) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, page_id, content, checksum, captured_at
             FROM snapshots WHERE page_id = ?1
             ORDER BY captured_at DESC, id DESC
             LIMIT 1 OFFSET ?2",
            params![page_id, offset],
            snapshot_from_row,
        );
        match result {
            Ok(snap) => Ok(Some(snap)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_snapshots(&self, page_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE page_id = ?1",
            params![page_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get(0)?,
        page_id: row.get(1)?,
        content: row.get(2)?,
        checksum: row.get(3)?,
        captured_at: ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageType, Plan};

    fn page_fixture(s: &Store) -> i64 {
        let u = s.add_user("a@example.com", Plan::Free).unwrap();
        let c = s.add_competitor(u, "Stripe", "stripe.com").unwrap();
        s.add_page(c, "https://stripe.com/pricing", PageType::Pricing).unwrap()
    }

    #[test]
    fn latest_and_previous_are_offset_by_one() {
        let s = Store::open_in_memory().unwrap();
        let p = page_fixture(&s);
        let first = s.save_snapshot(p, "v1", "sum1").unwrap();
        let second = s.save_snapshot(p, "v2", "sum2").unwrap();

        let latest = s.latest_snapshot(p).unwrap().unwrap();
        let previous = s.previous_snapshot(p).unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.content, "v2");
        assert_eq!(previous.id, first);
        assert_eq!(previous.content, "v1");
    }

    #[test]
    fn empty_page_has_no_snapshots() {
        let s = Store::open_in_memory().unwrap();
        let p = page_fixture(&s);
        assert!(s.latest_snapshot(p).unwrap().is_none());
        assert!(s.previous_snapshot(p).unwrap().is_none());
        assert_eq!(s.count_snapshots(p).unwrap(), 0);
    }

    #[test]
    fn single_snapshot_has_no_previous() {
        let s = Store::open_in_memory().unwrap();
        let p = page_fixture(&s);
        s.save_snapshot(p, "v1", "sum1").unwrap();
        assert!(s.latest_snapshot(p).unwrap().is_some());
        assert!(s.previous_snapshot(p).unwrap().is_none());
    }
}
