// Users, competitors and pages. Upserts honor the uniqueness invariants
// (email, (user_id, domain), (competitor_id, url)) and hand back the
// existing row's id on conflict.

use super::{now_str, opt_ts_col, ts_col, Store};
use crate::error::Result;
use crate::types::{Competitor, Page, PageJob, PageStatus, PageType, Plan, User};
use rusqlite::params;

impl Store {
    // ── Users ──────────────────────────────────────────────────────────

    pub fn add_user(&self, email: &str, plan: Plan) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn.query_row(
            "INSERT INTO users (email, plan, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET plan = excluded.plan
             RETURNING id",
            params![email, plan.as_str(), now_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, email, plan, created_at FROM users WHERE id = ?1",
            params![user_id],
            user_from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Users owning at least one competitor — the notification fan-out set.
    pub fn list_subscribers(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT u.id, u.email, u.plan, u.created_at
             FROM users u
             JOIN competitors c ON c.user_id = u.id
             ORDER BY u.id",
        )?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    // ── Competitors ────────────────────────────────────────────────────

    /// Upsert a competitor. The domain is normalized to lowercase; on a
    /// (user_id, domain) conflict the existing id is returned.
    pub fn add_competitor(&self, user_id: i64, name: &str, domain: &str) -> Result<i64> {
        let domain = domain.trim().to_ascii_lowercase();
        let conn = self.conn.lock();
        let id = conn.query_row(
            "INSERT INTO competitors (user_id, name, domain, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, domain) DO UPDATE SET name = excluded.name
             RETURNING id",
            params![user_id, name, domain, now_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_competitors_by_user(&self, user_id: i64) -> Result<Vec<Competitor>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, domain, created_at
             FROM competitors WHERE user_id = ?1 ORDER BY name",
        )?;
        let competitors = stmt
            .query_map(params![user_id], competitor_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(competitors)
    }

    /// Remove a competitor; its pages, snapshots and changes cascade away.
    pub fn remove_competitor(&self, competitor_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM competitors WHERE id = ?1", params![competitor_id])?;
        Ok(())
    }

    // ── Pages ──────────────────────────────────────────────────────────

    pub fn add_page(&self, competitor_id: i64, url: &str, page_type: PageType) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn.query_row(
            "INSERT INTO pages (competitor_id, url, page_type, status)
             VALUES (?1, ?2, ?3, 'active')
             ON CONFLICT(competitor_id, url) DO UPDATE SET page_type = excluded.page_type
             RETURNING id",
            params![competitor_id, url, page_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Batch page insert: one prepared statement inside one transaction.
    pub fn add_pages(&self, competitor_id: i64, pages: &[(String, PageType)]) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(pages.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pages (competitor_id, url, page_type, status)
                 VALUES (?1, ?2, ?3, 'active')
                 ON CONFLICT(competitor_id, url) DO UPDATE SET page_type = excluded.page_type
                 RETURNING id",
            )?;
            for (url, page_type) in pages {
                let id =
                    stmt.query_row(params![competitor_id, url, page_type.as_str()], |row| {
                        row.get(0)
                    })?;
                ids.push(id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn get_pages_by_competitor(&self, competitor_id: i64) -> Result<Vec<Page>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, competitor_id, url, page_type, status, last_checked_at
             FROM pages WHERE competitor_id = ?1 ORDER BY id",
        )?;
        let pages = stmt
            .query_map(params![competitor_id], page_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    pub fn remove_page(&self, page_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM pages WHERE id = ?1", params![page_id])?;
        Ok(())
    }

    pub fn set_page_status(&self, page_id: i64, status: PageStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE pages SET status = ?2 WHERE id = ?1",
            params![page_id, status.as_str()],
        )?;
        Ok(())
    }

    pub fn touch_page_checked(&self, page_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE pages SET last_checked_at = ?2 WHERE id = ?1",
            params![page_id, now_str()],
        )?;
        Ok(())
    }

    /// All active pages joined with their competitor and owning user — the
    /// work list of one monitoring round. A page tracked by many users still
    /// appears once per (competitor, page) row it belongs to; global
    /// deduplication per URL happens in the pipeline's fetch cache.
    pub fn list_active_pages(&self) -> Result<Vec<PageJob>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.competitor_id, p.url, p.page_type, p.status, p.last_checked_at,
                    c.name, c.user_id
             FROM pages p
             JOIN competitors c ON c.id = p.competitor_id
             JOIN users u ON u.id = c.user_id
             WHERE p.status = 'active'
             ORDER BY p.id",
        )?;
        let jobs = stmt
            .query_map([], |row| {
                Ok(PageJob {
                    page: page_from_row(row)?,
                    competitor_id: row.get(1)?,
                    competitor_name: row.get(6)?,
                    user_id: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

// ── Row mappers ────────────────────────────────────────────────────────────

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        plan: Plan::parse(&row.get::<_, String>(2)?),
        created_at: ts_col(row, 3)?,
    })
}

fn competitor_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Competitor> {
    Ok(Competitor {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        domain: row.get(3)?,
        created_at: ts_col(row, 4)?,
    })
}

fn page_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        competitor_id: row.get(1)?,
        url: row.get(2)?,
        page_type: PageType::parse(&row.get::<_, String>(3)?),
        status: PageStatus::parse(&row.get::<_, String>(4)?),
        last_checked_at: opt_ts_col(row, 5)?,
    })
}
