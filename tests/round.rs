// End-to-end monitoring rounds over an in-memory store, a scripted fetcher
// and a stubbed model. Exercises the full fetch → diff → analyze → persist →
// notify path without touching the network.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use watchbot::canonical;
use watchbot::error::Result;
use watchbot::fetch::{FetchResult, PageFetcher};
use watchbot::llm::{LlmClient, LlmConfig, Provider, StubProvider};
use watchbot::notify::{Channel, Message, Notifier};
use watchbot::pipeline::Pipeline;
use watchbot::store::Store;
use watchbot::types::{PageType, Plan, Severity};

// ── Test doubles ───────────────────────────────────────────────────────────

/// Scripted fetcher: serves HTML per URL from a mutable map and counts
/// fetches so global deduplication is observable.
struct ScriptedFetcher {
    bodies: Mutex<HashMap<String, String>>,
    fetches: AtomicU32,
}

impl ScriptedFetcher {
    fn new() -> Arc<Self> {
        Arc::new(ScriptedFetcher { bodies: Mutex::new(HashMap::new()), fetches: AtomicU32::new(0) })
    }

    fn serve(&self, url: &str, html: &str) {
        self.bodies.lock().insert(url.to_string(), html.to_string());
    }

    fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let raw_html = self
            .bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| watchbot::WatchError::Other(format!("no script for {url}")))?;
        Ok(FetchResult {
            url: url.to_string(),
            status: 200,
            clean_text: canonical::canonicalize(&raw_html),
            title: canonical::extract_title(&raw_html),
            raw_html,
            fetched_at: Utc::now(),
            duration: Duration::from_millis(1),
        })
    }
}

/// Channel that records every delivery for assertions.
struct RecordingChannel {
    sent: Arc<Mutex<Vec<(Option<String>, Message)>>>,
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, recipient: Option<&str>, message: &Message) -> Result<()> {
        self.sent.lock().push((recipient.map(str::to_string), message.clone()));
        Ok(())
    }
}

type Deliveries = Arc<Mutex<Vec<(Option<String>, Message)>>>;

fn recording_notifier() -> (Arc<Notifier>, Deliveries) {
    let sent: Deliveries = Arc::new(Mutex::new(Vec::new()));
    let channel = RecordingChannel { sent: Arc::clone(&sent) };
    (Arc::new(Notifier::with_channels(None, vec![Box::new(channel)])), sent)
}

fn stub_llm(reply: &str) -> Arc<LlmClient> {
    Arc::new(LlmClient::from_provider(
        Box::new(StubProvider::always(reply)),
        LlmConfig::new(Provider::OpenAi, "gpt-4o-mini", "test-key").with_max_retries(1),
    ))
}

fn failing_llm() -> Arc<LlmClient> {
    Arc::new(LlmClient::from_provider(
        Box::new(StubProvider::always_err("API error 400: broken stub")),
        LlmConfig::new(Provider::OpenAi, "gpt-4o-mini", "test-key").with_max_retries(1),
    ))
}

fn shutdown_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

const PRICING_URL: &str = "https://ex.com/pricing";
const PRICING_V1: &str = "<html><body><h1>Plans</h1><ul><li>Pro $20</li></ul></body></html>";
const PRICING_V2: &str = "<html><body><h1>Plans</h1><ul><li>Pro $25</li></ul></body></html>";

fn seed_single_user(store: &Store) -> (i64, i64, i64) {
    let user = store.add_user("owner@example.com", Plan::Pro).unwrap();
    let competitor = store.add_competitor(user, "Example", "ex.com").unwrap();
    let page = store.add_page(competitor, PRICING_URL, PageType::Pricing).unwrap();
    (user, competitor, page)
}

// ── Scenarios ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_seen_page_writes_one_snapshot_and_no_analysis() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();

    assert_eq!(store.count_snapshots(page).unwrap(), 1);
    assert_eq!(store.count_changes(page).unwrap(), 0);

    let snapshot = store.latest_snapshot(page).unwrap().unwrap();
    assert_eq!(snapshot.content, "# Plans\n- Pro $20");
    assert_eq!(snapshot.checksum, canonical::checksum("# Plans\n- Pro $20"));

    // last_checked_at was stamped.
    let pages = store.get_pages_by_competitor(_competitor).unwrap();
    assert!(pages[0].last_checked_at.is_some());

    // No changes → no digest (the first clean round sends the initial
    // heartbeat instead).
    let sent = deliveries.lock();
    assert!(sent.iter().all(|(_, m)| m.title.contains("heartbeat")));
}

#[tokio::test]
async fn price_bump_produces_analysis_and_digest() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher.clone(),
        Some(stub_llm("Pro tier price rose from $20 to $25, a 25% increase. CRITICAL")),
        notifier,
    ));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    deliveries.lock().clear(); // drop the initial heartbeat

    fetcher.serve(PRICING_URL, PRICING_V2);
    pipeline.run_check(&rx).await.unwrap();

    assert_eq!(store.count_snapshots(page).unwrap(), 2);
    assert_eq!(store.count_changes(page).unwrap(), 1);

    let change = store.latest_change(page).unwrap().unwrap();
    assert_eq!(change.severity, Severity::Critical);
    assert_eq!(change.additions, 1);
    assert_eq!(change.deletions, 1);
    assert!(change.summary.contains("25%"));
    assert!(change.raw_diff.starts_with("--- old\n+++ new\n"));

    // Referential invariant: old snapshot immediately precedes new.
    let latest = store.latest_snapshot(page).unwrap().unwrap();
    let previous = store.previous_snapshot(page).unwrap().unwrap();
    assert_eq!(change.new_snapshot_id, latest.id);
    assert_eq!(change.old_snapshot_id, Some(previous.id));

    // Exactly one digest, to the one subscriber, under its competitor name.
    let sent = deliveries.lock();
    assert_eq!(sent.len(), 1);
    let (recipient, message) = &sent[0];
    assert_eq!(recipient.as_deref(), Some("owner@example.com"));
    assert!(message.title.contains("1 change across 1 competitor"));
    assert!(message.body.contains("Example"));
    assert!(message.html_body.contains("Example"));

    // Metadata mark for the change round.
    assert!(store.get_meta("last_change_at").unwrap().is_some());
}

#[tokio::test]
async fn script_and_whitespace_churn_changes_nothing() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, _deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();

    // Same content, now with an injected script tag and reflowed whitespace.
    fetcher.serve(
        PRICING_URL,
        "<html><body><script>track()</script><h1>\n  Plans\n</h1><ul><li>Pro\n   $20</li></ul></body></html>",
    );
    pipeline.run_check(&rx).await.unwrap();

    assert_eq!(store.count_snapshots(page).unwrap(), 1, "identical canonical text, no snapshot");
    assert_eq!(store.count_changes(page).unwrap(), 0);
}

#[tokio::test]
async fn rerunning_unchanged_rounds_is_idempotent() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, _deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    let snapshots_after_first = store.count_snapshots(page).unwrap();

    pipeline.run_check(&rx).await.unwrap();
    pipeline.run_check(&rx).await.unwrap();

    assert_eq!(store.count_snapshots(page).unwrap(), snapshots_after_first);
    assert_eq!(store.count_changes(page).unwrap(), 0);
}

#[tokio::test]
async fn llm_outage_falls_back_to_diff_summary() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, _deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher.clone(),
        Some(failing_llm()),
        notifier,
    ));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    fetcher.serve(PRICING_URL, PRICING_V2);
    pipeline.run_check(&rx).await.unwrap();

    let change = store.latest_change(page).unwrap().unwrap();
    assert_eq!(change.severity, Severity::Important);
    assert!(change.summary.contains("1 line(s) added, 1 line(s) removed"));
    assert!(change.summary.contains("+ - Pro $25"));
}

#[tokio::test]
async fn shared_url_is_fetched_once_but_fans_out_per_user() {
    let store = Arc::new(Store::open_in_memory().unwrap());

    let u1 = store.add_user("u1@example.com", Plan::Free).unwrap();
    let u2 = store.add_user("u2@example.com", Plan::Pro).unwrap();
    let mut pages = Vec::new();
    for user in [u1, u2] {
        let competitor = store.add_competitor(user, "Stripe", "stripe.com").unwrap();
        pages.push(
            store
                .add_page(competitor, "https://stripe.com/pricing", PageType::Pricing)
                .unwrap(),
        );
    }

    let fetcher = ScriptedFetcher::new();
    fetcher.serve("https://stripe.com/pricing", PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher.clone(),
        Some(stub_llm("Price increase on the Pro tier. IMPORTANT")),
        notifier,
    ));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    assert_eq!(fetcher.fetch_count(), 1, "one URL, one fetch");
    deliveries.lock().clear();

    fetcher.serve("https://stripe.com/pricing", PRICING_V2);
    pipeline.run_check(&rx).await.unwrap();
    assert_eq!(fetcher.fetch_count(), 2, "second round fetched once more");

    // Each user's page row carries its own snapshot history and change.
    for page in &pages {
        assert_eq!(store.count_snapshots(*page).unwrap(), 2);
        assert_eq!(store.count_changes(*page).unwrap(), 1);
    }

    // Two digests, one per subscriber, both grouped under "Stripe".
    let sent = deliveries.lock();
    assert_eq!(sent.len(), 2);
    let recipients: Vec<_> = sent.iter().filter_map(|(r, _)| r.clone()).collect();
    assert!(recipients.contains(&"u1@example.com".to_string()));
    assert!(recipients.contains(&"u2@example.com".to_string()));
    for (_, message) in sent.iter() {
        assert!(message.body.contains("Stripe"));
    }
}

#[tokio::test]
async fn digests_only_reference_owned_competitors() {
    let store = Arc::new(Store::open_in_memory().unwrap());

    let u1 = store.add_user("u1@example.com", Plan::Free).unwrap();
    let c1 = store.add_competitor(u1, "AlphaCorp", "alpha.example").unwrap();
    store.add_page(c1, "https://alpha.example/pricing", PageType::Pricing).unwrap();

    let u2 = store.add_user("u2@example.com", Plan::Free).unwrap();
    let c2 = store.add_competitor(u2, "BetaCorp", "beta.example").unwrap();
    store.add_page(c2, "https://beta.example/pricing", PageType::Pricing).unwrap();

    let fetcher = ScriptedFetcher::new();
    fetcher.serve("https://alpha.example/pricing", PRICING_V1);
    fetcher.serve("https://beta.example/pricing", PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher.clone(),
        Some(stub_llm("Something moved. MINOR")),
        notifier,
    ));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    deliveries.lock().clear();

    // Only AlphaCorp's page changes this round.
    fetcher.serve("https://alpha.example/pricing", PRICING_V2);
    pipeline.run_check(&rx).await.unwrap();

    let sent = deliveries.lock();
    assert_eq!(sent.len(), 1, "only the owner of the changed competitor is notified");
    let (recipient, message) = &sent[0];
    assert_eq!(recipient.as_deref(), Some("u1@example.com"));
    assert!(message.body.contains("AlphaCorp"));
    assert!(!message.body.contains("BetaCorp"));
}

#[tokio::test]
async fn heartbeat_fires_once_per_quiet_week() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));

    let (_tx, rx) = shutdown_pair();

    // First quiet round: nothing sent in the last 7 days → heartbeat.
    pipeline.run_check(&rx).await.unwrap();
    {
        let sent = deliveries.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.title.contains("heartbeat"));
        assert!(sent[0].1.body.contains("Example"));
    }
    assert!(store.get_meta("last_heartbeat_at").unwrap().is_some());

    // Second quiet round right after: heartbeat suppressed.
    deliveries.lock().clear();
    pipeline.run_check(&rx).await.unwrap();
    assert!(deliveries.lock().is_empty());

    // Pretend the last heartbeat was 8 days ago → fires again.
    let eight_days_ago = (Utc::now() - chrono::Duration::days(8)).to_rfc3339();
    store.set_meta("last_heartbeat_at", &eight_days_ago).unwrap();
    pipeline.run_check(&rx).await.unwrap();
    let sent = deliveries.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.title.contains("heartbeat"));
}

#[tokio::test]
async fn recent_change_suppresses_heartbeat() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher.clone(),
        Some(stub_llm("Price change. IMPORTANT")),
        notifier,
    ));

    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();

    // A change lands (fresh Analysis row), then rounds go quiet: no
    // heartbeat while the newest change is younger than 7 days, even when
    // the heartbeat mark is stale.
    fetcher.serve(PRICING_URL, PRICING_V2);
    pipeline.run_check(&rx).await.unwrap();
    let eight_days_ago = (Utc::now() - chrono::Duration::days(8)).to_rfc3339();
    store.set_meta("last_heartbeat_at", &eight_days_ago).unwrap();

    deliveries.lock().clear();
    pipeline.run_check(&rx).await.unwrap();
    assert!(deliveries.lock().is_empty());
}

#[tokio::test]
async fn cancelled_round_skips_notification_phase() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);
    let (notifier, deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));

    let (tx, rx) = shutdown_pair();
    tx.send(true).unwrap();
    pipeline.run_check(&rx).await.unwrap();

    // Shutdown observed before any work: nothing fetched, nothing sent.
    assert!(deliveries.lock().is_empty());
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn history_survives_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("watchbot.db");

    let fetcher = ScriptedFetcher::new();
    fetcher.serve(PRICING_URL, PRICING_V1);

    let page = {
        let store = Arc::new(Store::open(&db_path).unwrap());
        let (_user, _competitor, page) = seed_single_user(&store);
        let (notifier, _deliveries) = recording_notifier();
        let pipeline =
            Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));
        let (_tx, rx) = shutdown_pair();
        pipeline.run_check(&rx).await.unwrap();
        assert_eq!(store.count_snapshots(page).unwrap(), 1);
        page
    };

    // Reopen: migrations re-run idempotently, history is intact, and an
    // unchanged round still adds nothing.
    let store = Arc::new(Store::open(&db_path).unwrap());
    assert_eq!(store.count_snapshots(page).unwrap(), 1);
    let (notifier, _deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));
    let (_tx, rx) = shutdown_pair();
    pipeline.run_check(&rx).await.unwrap();
    assert_eq!(store.count_snapshots(page).unwrap(), 1);
}

#[tokio::test]
async fn consecutive_snapshots_never_share_a_checksum() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let (_user, _competitor, page) = seed_single_user(&store);

    let fetcher = ScriptedFetcher::new();
    let (notifier, _deliveries) = recording_notifier();
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&store), fetcher.clone(), None, notifier));
    let (_tx, rx) = shutdown_pair();

    // Flap the content back and forth; every persisted pair of consecutive
    // snapshots must differ.
    for html in [PRICING_V1, PRICING_V1, PRICING_V2, PRICING_V2, PRICING_V1] {
        fetcher.serve(PRICING_URL, html);
        pipeline.run_check(&rx).await.unwrap();
    }

    assert_eq!(store.count_snapshots(page).unwrap(), 3);
    let latest = store.latest_snapshot(page).unwrap().unwrap();
    let previous = store.previous_snapshot(page).unwrap().unwrap();
    assert_ne!(latest.checksum, previous.checksum);
}
