// Database schema and migrations for the watchbot store.
// Called once at startup by Store::open() after WAL is enabled.
// Adding a new table or column: append an idempotent CREATE TABLE IF NOT
// EXISTS or ALTER TABLE … ADD COLUMN (errors silently swallowed) at the end
// of run_migrations() — never modify existing SQL to keep upgrade paths clean.

use crate::error::Result;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            plan TEXT NOT NULL DEFAULT 'free',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS competitors (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            domain TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, domain),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_competitors_user
            ON competitors(user_id);

        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY,
            competitor_id INTEGER NOT NULL,
            url TEXT NOT NULL,
            page_type TEXT NOT NULL DEFAULT 'general',
            status TEXT NOT NULL DEFAULT 'active',
            last_checked_at TEXT,
            UNIQUE (competitor_id, url),
            FOREIGN KEY (competitor_id) REFERENCES competitors(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_pages_competitor
            ON pages(competitor_id);
        CREATE INDEX IF NOT EXISTS idx_pages_status
            ON pages(status);

        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY,
            page_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            checksum TEXT NOT NULL,
            captured_at TEXT NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_page
            ON snapshots(page_id, captured_at DESC);

        CREATE TABLE IF NOT EXISTS changes (
            id INTEGER PRIMARY KEY,
            page_id INTEGER NOT NULL,
            old_snapshot_id INTEGER,
            new_snapshot_id INTEGER NOT NULL,
            severity TEXT NOT NULL DEFAULT 'important',
            summary TEXT NOT NULL DEFAULT '',
            raw_diff TEXT NOT NULL DEFAULT '',
            additions INTEGER NOT NULL DEFAULT 0,
            deletions INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
            FOREIGN KEY (new_snapshot_id) REFERENCES snapshots(id)
        );

        CREATE INDEX IF NOT EXISTS idx_changes_page
            ON changes(page_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_changes_created
            ON changes(created_at DESC);
    ",
    )?;

    // The metadata table is introduced lazily so older databases upgrade
    // without a forced migration.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ",
    )
    .ok();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn in_memory_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn migrations_run_cleanly() {
        let conn = in_memory_db();
        let result = run_migrations(&conn);
        assert!(result.is_ok(), "First migration run failed: {:?}", result);
    }

    #[test]
    fn migrations_idempotent() {
        let conn = in_memory_db();
        run_migrations(&conn).unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok(), "Second migration run failed: {:?}", result);
    }
}
