// ── Watchbot pipeline: Scheduler ───────────────────────────────────────────
// Drives rounds on a fixed interval. One round at a time: ticks that land
// while a round is still executing are coalesced by MissedTickBehavior::Skip,
// so rounds never overlap. The shutdown watch channel both stops the loop
// and propagates into the active round.

use super::Pipeline;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Scheduler { interval }
    }

    /// Run an immediate round, then one per tick until the shutdown signal
    /// fires. Returns once shutdown is observed.
    pub async fn run(&self, pipeline: Arc<Pipeline>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[scheduler] starting, interval {}h{}m",
            self.interval.as_secs() / 3600,
            (self.interval.as_secs() % 3600) / 60
        );

        // Immediate first round.
        if let Err(e) = pipeline.run_check(&shutdown).await {
            error!("[scheduler] round failed: {}", e);
        }

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    if let Err(e) = pipeline.run_check(&shutdown).await {
                        error!("[scheduler] round failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("[scheduler] stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchResult, PageFetcher};
    use crate::notify::Notifier;
    use crate::store::Store;
    use async_trait::async_trait;
    use chrono::Utc;

    struct EmptyFetcher;

    #[async_trait]
    impl PageFetcher for EmptyFetcher {
        async fn fetch(&self, url: &str) -> crate::error::Result<FetchResult> {
            Ok(FetchResult {
                url: url.to_string(),
                status: 200,
                raw_html: String::new(),
                clean_text: String::new(),
                title: None,
                fetched_at: Utc::now(),
                duration: Duration::from_millis(1),
            })
        }
    }

    #[tokio::test]
    async fn run_returns_when_shutdown_fires() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let pipeline = Arc::new(Pipeline::new(
            store,
            Arc::new(EmptyFetcher),
            None,
            Arc::new(Notifier::disabled()),
        ));
        let scheduler = Scheduler::new(Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { scheduler.run(pipeline, rx).await });
        // Let the immediate round finish, then signal shutdown.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop on shutdown")
            .unwrap();
    }
}
