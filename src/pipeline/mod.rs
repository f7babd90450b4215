// ── Watchbot: Monitoring pipeline ──────────────────────────────────────────
// One `run_check` round: enumerate active pages, fetch each distinct URL
// exactly once, diff canonical text against the latest stored snapshot,
// analyze real changes, persist, then fan digests out per subscriber.
//
// Module layout:
//   analyzer  — LLM prompt + severity parsing + diff-summary fallback
//   scheduler — interval driver with coalesced ticks and shutdown

pub mod analyzer;
pub mod scheduler;

pub use analyzer::{Analysis, Analyzer};
pub use scheduler::Scheduler;

use crate::canonical;
use crate::diff;
use crate::error::Result;
use crate::fetch::{FetchResult, PageFetcher};
use crate::llm::LlmClient;
use crate::notify::{self, Notifier};
use crate::store::{NewChange, Store};
use crate::types::{PageJob, RoundChange};
use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};

/// Bounded in-round fan-out.
const ROUND_WORKERS: usize = 4;

/// Days of silence before a liveness digest goes out.
const HEARTBEAT_AFTER_DAYS: i64 = 7;

const META_LAST_CHANGE_AT: &str = "last_change_at";
const META_LAST_HEARTBEAT_AT: &str = "last_heartbeat_at";

/// Cheap to clone: every field is a shared handle, so per-URL workers carry
/// their own copy into spawned tasks.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<Store>,
    fetcher: Arc<dyn PageFetcher>,
    analyzer: Arc<Analyzer>,
    notifier: Arc<Notifier>,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Option<Arc<LlmClient>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Pipeline {
            store,
            fetcher,
            analyzer: Arc::new(Analyzer::new(llm)),
            notifier,
        }
    }

    /// Execute one monitoring round. Cancellation is observed between pages
    /// and before the notification phase; persisted snapshots stay durable.
    pub async fn run_check(&self, shutdown: &watch::Receiver<bool>) -> Result<()> {
        let started = std::time::Instant::now();
        let jobs = self.store.list_active_pages()?;
        info!("[pipeline] round start: {} active page(s)", jobs.len());

        // Global fetch dedup: group jobs by URL so a page tracked by many
        // users is fetched once per round.
        let mut url_order: Vec<String> = Vec::new();
        let mut by_url: HashMap<String, Vec<PageJob>> = HashMap::new();
        for job in jobs {
            let url = job.page.url.clone();
            if !by_url.contains_key(&url) {
                url_order.push(url.clone());
            }
            by_url.entry(url).or_default().push(job);
        }

        let round_changes: Arc<Mutex<Vec<RoundChange>>> = Arc::new(Mutex::new(Vec::new()));
        let semaphore = Arc::new(Semaphore::new(ROUND_WORKERS));
        let mut handles = Vec::with_capacity(url_order.len());

        for url in url_order {
            if *shutdown.borrow() {
                warn!("[pipeline] shutdown observed, aborting round early");
                break;
            }
            let Some(url_jobs) = by_url.remove(&url) else { continue };
            let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
            let this = self.clone();
            let changes = Arc::clone(&round_changes);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                this.process_url(&url, url_jobs, &changes, &shutdown).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        // The notification phase sees a stable copy of the round set.
        let changes: Vec<RoundChange> = std::mem::take(&mut *round_changes.lock());

        if *shutdown.borrow() {
            info!("[pipeline] shutdown before notification phase, skipping fan-out");
            return Ok(());
        }

        if changes.is_empty() {
            info!("[pipeline] round clean: no changes in {}ms", started.elapsed().as_millis());
            self.maybe_heartbeat().await?;
            return Ok(());
        }

        self.store.set_meta(META_LAST_CHANGE_AT, &Utc::now().to_rfc3339())?;
        self.fan_out(&changes).await?;

        info!(
            "[pipeline] round done: {} change(s) in {}ms",
            changes.len(),
            started.elapsed().as_millis()
        );
        Ok(())
    }

    // ── Per-URL work ───────────────────────────────────────────────────

    /// Fetch one URL once, then run snapshot/diff/analyze for every page row
    /// (one per owning user) behind it.
    async fn process_url(
        &self,
        url: &str,
        jobs: Vec<PageJob>,
        round_changes: &Mutex<Vec<RoundChange>>,
        shutdown: &watch::Receiver<bool>,
    ) {
        let fetched = match self.fetcher.fetch(url).await {
            Ok(f) => f,
            Err(e) => {
                // Fetch failure skips the page for this round, nothing more.
                warn!("[pipeline] fetch failed page={} url={} error={}", jobs[0].page.id, url, e);
                return;
            }
        };
        if !fetched.is_success() {
            warn!(
                "[pipeline] skipping page={} url={} status={}",
                jobs[0].page.id, url, fetched.status
            );
            return;
        }

        for job in jobs {
            if *shutdown.borrow() {
                return;
            }
            match self.process_page(&job, &fetched, shutdown).await {
                Ok(Some(change)) => round_changes.lock().push(change),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "[pipeline] page processing failed page={} url={} error={}",
                        job.page.id, job.page.url, e
                    );
                }
            }
        }
    }

    /// Snapshot/diff/analyze one page row against fetched content.
    /// Returns the round change when a real, analyzed change was persisted.
    async fn process_page(
        &self,
        job: &PageJob,
        fetched: &FetchResult,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Option<RoundChange>> {
        let page_id = job.page.id;
        let checksum = canonical::checksum(&fetched.clean_text);
        self.store.touch_page_checked(page_id)?;

        // Read the previous snapshot BEFORE writing the new row, so the diff
        // never compares a snapshot against itself.
        let previous = self.store.latest_snapshot(page_id)?;

        let previous = match previous {
            None => {
                // First observation: persist, emit nothing.
                self.store.save_snapshot(page_id, &fetched.clean_text, &checksum)?;
                info!("[pipeline] first snapshot page={} url={}", page_id, job.page.url);
                return Ok(None);
            }
            Some(prev) if prev.checksum == checksum => return Ok(None),
            Some(prev) => prev,
        };

        let new_snapshot_id =
            self.store.save_snapshot(page_id, &fetched.clean_text, &checksum)?;

        let d = diff::diff(&previous.content, &fetched.clean_text);
        if !d.has_changes {
            // Checksum moved but content diffs to nothing (whitespace-only
            // churn survived canonicalization) — not a reportable change.
            return Ok(None);
        }

        let analysis = self
            .analyzer
            .analyze(&job.competitor_name, job.page.page_type, &d, Some(shutdown))
            .await;

        let change_id = self.store.save_change(&NewChange {
            page_id,
            old_snapshot_id: Some(previous.id),
            new_snapshot_id,
            severity: analysis.severity,
            summary: &analysis.summary,
            raw_diff: &d.unified,
            additions: d.additions,
            deletions: d.deletions,
        })?;

        let change = self
            .store
            .latest_change(page_id)?
            .filter(|c| c.id == change_id)
            .ok_or_else(|| crate::error::WatchError::Other("change row vanished".into()))?;

        info!(
            "[pipeline] change page={} url={} severity={} +{}/-{}",
            page_id, job.page.url, analysis.severity, d.additions, d.deletions
        );

        Ok(Some(RoundChange {
            change,
            page_url: job.page.url.clone(),
            page_type: job.page.page_type,
            competitor_id: job.competitor_id,
            competitor_name: job.competitor_name.clone(),
            user_id: job.user_id,
        }))
    }

    // ── Notification fan-out ───────────────────────────────────────────

    async fn fan_out(&self, round_changes: &[RoundChange]) -> Result<()> {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let subscribers = self.store.list_subscribers()?;

        for subscriber in subscribers {
            let user_changes: Vec<RoundChange> = round_changes
                .iter()
                .filter(|c| c.user_id == subscriber.id)
                .cloned()
                .collect();
            if user_changes.is_empty() {
                continue;
            }

            let competitor_names: Vec<String> = self
                .store
                .list_competitors_by_user(subscriber.id)?
                .into_iter()
                .map(|c| c.name)
                .collect();

            let digest = notify::assemble(&date, &user_changes, &competitor_names);
            let message = notify::render(&digest);
            // Per-subscriber failures are logged inside deliver(); the round
            // carries on to the remaining subscribers.
            self.notifier.deliver(&subscriber.email, &message).await;
        }
        Ok(())
    }

    // ── Heartbeat ──────────────────────────────────────────────────────

    /// After a quiet round: if neither a heartbeat nor a change happened in
    /// the last 7 days, tell every subscriber the service is alive.
    async fn maybe_heartbeat(&self) -> Result<()> {
        let now = Utc::now();
        let threshold = now - ChronoDuration::days(HEARTBEAT_AFTER_DAYS);

        let recent_heartbeat = self
            .store
            .get_meta(META_LAST_HEARTBEAT_AT)?
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc) > threshold)
            .unwrap_or(false);
        if recent_heartbeat {
            return Ok(());
        }

        let recent_change = self
            .store
            .newest_change_at()?
            .map(|t| t > threshold)
            .unwrap_or(false);
        if recent_change {
            return Ok(());
        }

        let date = now.format("%Y-%m-%d").to_string();
        let subscribers = self.store.list_subscribers()?;
        if subscribers.is_empty() {
            return Ok(());
        }

        info!("[pipeline] sending heartbeat to {} subscriber(s)", subscribers.len());
        for subscriber in subscribers {
            let competitor_names: Vec<String> = self
                .store
                .list_competitors_by_user(subscriber.id)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let message = notify::render_heartbeat(&date, &competitor_names);
            self.notifier.deliver(&subscriber.email, &message).await;
        }
        self.store.set_meta(META_LAST_HEARTBEAT_AT, &now.to_rfc3339())?;
        Ok(())
    }
}
