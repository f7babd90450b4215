// ── Watchbot: Page fetcher ─────────────────────────────────────────────────
// HTTP GET with retry for transient network failures, plus canonicalization
// of the body into the text form the differ consumes. Non-2xx responses are
// returned to the caller — deciding what a 404 on a pricing page means is
// pipeline policy, not fetch policy.

use crate::canonical;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "WatchbotMonitor/0.1 (+https://github.com/watchbot/watchbot; change tracking)";

/// Linear backoff step between fetch retries.
const RETRY_STEP: Duration = Duration::from_secs(1);

// ── Options & result ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Total attempts for transient network errors.
    pub retries: u32,
    pub user_agent: String,
    pub extra_headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            timeout: Duration::from_secs(30),
            retries: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub status: u16,
    pub raw_html: String,
    /// Canonical text (see `canonical`): the form that is hashed and diffed.
    pub clean_text: String,
    pub title: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub duration: Duration,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ── Fetcher seam ───────────────────────────────────────────────────────────

/// The seam the pipeline consumes, so rounds can run against stub fetchers
/// in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult>;
}

// ── HTTP implementation ────────────────────────────────────────────────────

pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        HttpFetcher { client, options }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(FetchOptions::default())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let start = Instant::now();
        let attempts = self.options.retries.max(1);
        let mut last_error: Option<reqwest::Error> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Linear backoff: 1s, 2s, 3s …
                tokio::time::sleep(RETRY_STEP * attempt).await;
                warn!("[fetch] retry {}/{} for {}", attempt, attempts - 1, url);
            }

            let mut req = self.client.get(url);
            for (name, value) in &self.options.extra_headers {
                req = req.header(name, value);
            }

            let response = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let status = response.status().as_u16();
            let raw_html = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let clean_text = canonical::canonicalize(&raw_html);
            let title = canonical::extract_title(&raw_html);
            debug!(
                "[fetch] {} status={} bytes={} in {}ms",
                url,
                status,
                raw_html.len(),
                start.elapsed().as_millis()
            );

            return Ok(FetchResult {
                url: url.to_string(),
                status,
                raw_html,
                clean_text,
                title,
                fetched_at: Utc::now(),
                duration: start.elapsed(),
            });
        }

        Err(match last_error {
            Some(e) => WatchError::Network(e),
            None => WatchError::Other(format!("fetch failed for {url}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_identify_the_bot() {
        let options = FetchOptions::default();
        assert!(options.user_agent.contains("WatchbotMonitor"));
        assert_eq!(options.retries, 3);
    }

    #[test]
    fn success_window_is_2xx() {
        let mut result = FetchResult {
            url: "https://ex.com".into(),
            status: 200,
            raw_html: String::new(),
            clean_text: String::new(),
            title: None,
            fetched_at: Utc::now(),
            duration: Duration::from_millis(1),
        };
        assert!(result.is_success());
        result.status = 404;
        assert!(!result.is_success());
        result.status = 299;
        assert!(result.is_success());
    }
}
