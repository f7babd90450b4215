use super::Store;
use crate::error::Result;
use rusqlite::params;

impl Store {
    // ── Metadata storage ───────────────────────────────────────────────

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_round_trip() {
        let s = Store::open_in_memory().unwrap();
        assert_eq!(s.get_meta("last_heartbeat_at").unwrap(), None);
        s.set_meta("last_heartbeat_at", "2026-08-01T00:00:00Z").unwrap();
        assert_eq!(
            s.get_meta("last_heartbeat_at").unwrap().as_deref(),
            Some("2026-08-01T00:00:00Z")
        );
        s.set_meta("last_heartbeat_at", "2026-08-02T00:00:00Z").unwrap();
        assert_eq!(
            s.get_meta("last_heartbeat_at").unwrap().as_deref(),
            Some("2026-08-02T00:00:00Z")
        );
    }
}
