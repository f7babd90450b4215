// Search-engine recall layers for the resolver. Each wrapper takes only the
// first hit — search is a fallback, not a ranking problem.

use crate::config::SearchConfig;
use crate::error::{Result, WatchError};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const BING_SEARCH_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    items: Option<Vec<GoogleItem>>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    title: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    value: Vec<BingPage>,
}

#[derive(Debug, Deserialize)]
struct BingPage {
    name: Option<String>,
    url: Option<String>,
}

// ── Client ─────────────────────────────────────────────────────────────────

pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Self {
        SearchClient {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub fn google_enabled(&self) -> bool {
        self.config.google_enabled()
    }

    pub fn bing_enabled(&self) -> bool {
        self.config.bing_enabled()
    }

    /// First Google Custom Search hit for `query`, if the engine is
    /// configured and returned anything.
    pub async fn google_first_hit(&self, query: &str) -> Result<Option<SearchHit>> {
        let (Some(api_key), Some(cx)) =
            (self.config.google_api_key.as_deref(), self.config.google_cx.as_deref())
        else {
            return Err(WatchError::Config("Google search is not configured".into()));
        };

        debug!("[resolver] google search: {:?}", query);
        let response = self
            .client
            .get(GOOGLE_CSE_ENDPOINT)
            .query(&[("key", api_key), ("cx", cx), ("q", query), ("num", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WatchError::Resolver(format!(
                "Google search error {}",
                response.status().as_u16()
            )));
        }

        let parsed: GoogleResponse = response.json().await?;
        let hit = parsed.items.and_then(|items| {
            items.into_iter().find_map(|item| {
                let url = item.link?;
                Some(SearchHit { title: item.title.unwrap_or_default(), url })
            })
        });
        if let Some(ref h) = hit {
            info!("[resolver] google hit: {}", h.url);
        }
        Ok(hit)
    }

    /// First Bing Web Search hit for `query`.
    pub async fn bing_first_hit(&self, query: &str) -> Result<Option<SearchHit>> {
        let Some(api_key) = self.config.bing_api_key.as_deref() else {
            return Err(WatchError::Config("Bing search is not configured".into()));
        };

        debug!("[resolver] bing search: {:?}", query);
        let response = self
            .client
            .get(BING_SEARCH_ENDPOINT)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[("q", query), ("count", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WatchError::Resolver(format!(
                "Bing search error {}",
                response.status().as_u16()
            )));
        }

        let parsed: BingResponse = response.json().await?;
        let hit = parsed.web_pages.and_then(|pages| {
            pages.value.into_iter().find_map(|page| {
                let url = page.url?;
                Some(SearchHit { title: page.name.unwrap_or_default(), url })
            })
        });
        if let Some(ref h) = hit {
            info!("[resolver] bing hit: {}", h.url);
        }
        Ok(hit)
    }
}
