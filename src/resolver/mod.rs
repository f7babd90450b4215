// ── Watchbot: Natural-language resolver ────────────────────────────────────
// Turns a free-form "monitor X" request into validated monitoring URLs via a
// three-layer fallback: model recall → Google Custom Search → Bing. The
// model is told not to fabricate; every URL from any layer must still pass
// validation before it is returned.
//
// Module layout:
//   validate — normalization, DNS hard-check, HEAD/GET soft-probe
//   search   — first-hit wrappers for the two search engines

pub mod search;
pub mod validate;

pub use search::{SearchClient, SearchHit};
pub use validate::{looks_like_url, normalize, UrlValidator, ValidatedUrl};

use crate::config::SearchConfig;
use crate::error::{Result, WatchError};
use crate::llm::{LlmClient, Request};
use crate::types::PageType;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Result envelope ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Direct,
    Llm,
    GoogleSearch,
    BingSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub name: String,
    pub urls: Vec<String>,
    pub page_type: PageType,
    pub confidence: Confidence,
    pub source: ResolutionSource,
    /// Soft-validation notes ("HTTP 403", "probe failed: …").
    pub warning: Option<String>,
}

// ── LLM recall wire shape ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LlmRecall {
    name: Option<String>,
    urls: Option<Vec<String>>,
    page_type: Option<String>,
    confidence: Option<String>,
    error: Option<String>,
}

const RECALL_SYSTEM_PROMPT: &str = "\
You identify the official website URLs for software products and companies. \
Rules: never invent, guess, or construct URLs — only return URLs you are \
certain exist. Respond with JSON only, no prose. On success: \
{\"name\": \"<product name>\", \"urls\": [\"<official url>\", …], \
\"page_type\": \"pricing|changelog|api_docs|blog|features|general\", \
\"confidence\": \"high|low\"}. If you cannot identify the product: \
{\"error\": \"<short reason>\"}.";

// ── Resolver ───────────────────────────────────────────────────────────────

pub struct Resolver {
    llm: Option<Arc<LlmClient>>,
    search: SearchClient,
    validator: UrlValidator,
}

impl Resolver {
    pub fn new(llm: Option<Arc<LlmClient>>, search_config: SearchConfig) -> Self {
        Resolver {
            llm,
            search: SearchClient::new(search_config),
            validator: UrlValidator::new(),
        }
    }

    /// Build from process config. Recall rides on the stronger model when
    /// `LLM_MODEL_PRO` is set — misidentified products are costlier than the
    /// extra tokens.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let llm = config.llm.clone().map(|mut llm_config| {
            if let Some(pro) = &config.llm_model_pro {
                llm_config.model = pro.clone();
            }
            Arc::new(LlmClient::new(llm_config))
        });
        Self::new(llm, config.search.clone())
    }

    /// Resolve free-form input to validated monitoring URLs.
    pub async fn resolve(&self, input: &str) -> Result<Resolution> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WatchError::Resolver("empty input".into()));
        }

        // Pre-check: URLs skip recall entirely.
        if looks_like_url(input) {
            let validated = self.validator.validate(input).await?;
            let page_type = PageType::guess_from_url(&validated.url);
            let name = name_from_url(&validated.url);
            return Ok(Resolution {
                name,
                urls: vec![validated.url],
                page_type,
                confidence: Confidence::High,
                source: ResolutionSource::Direct,
                warning: validated.warning,
            });
        }

        // Layer 1: model recall. Keep any identified product name around for
        // the low-confidence fallback even when no URL survives validation.
        let mut identified_name: Option<String> = None;
        if let Some(llm) = &self.llm {
            match self.recall_via_llm(llm, input).await {
                Ok((Some(resolution), _)) => return Ok(resolution),
                Ok((None, name)) => identified_name = name,
                Err(e) => warn!("[resolver] LLM recall failed: {}", e),
            }
        }

        // Layer 2: Google Custom Search.
        if self.search.google_enabled() {
            match self.search.google_first_hit(input).await {
                Ok(Some(hit)) => {
                    if let Ok(resolution) =
                        self.resolution_from_hit(hit, ResolutionSource::GoogleSearch).await
                    {
                        return Ok(resolution);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[resolver] google search failed: {}", e),
            }
        }

        // Layer 3: Bing Web Search.
        if self.search.bing_enabled() {
            match self.search.bing_first_hit(input).await {
                Ok(Some(hit)) => {
                    if let Ok(resolution) =
                        self.resolution_from_hit(hit, ResolutionSource::BingSearch).await
                    {
                        return Ok(resolution);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[resolver] bing search failed: {}", e),
            }
        }

        // All layers dry: a name alone is still worth returning.
        if let Some(name) = identified_name {
            info!("[resolver] no URL found, returning low-confidence name {:?}", name);
            return Ok(Resolution {
                name,
                urls: Vec::new(),
                page_type: PageType::General,
                confidence: Confidence::Low,
                source: ResolutionSource::Llm,
                warning: None,
            });
        }

        Err(WatchError::Resolver(format!("could not resolve {input:?} to any URL")))
    }

    /// Layer 1: strict-prompted model recall. Only high-confidence URLs that
    /// also pass validation are accepted; the identified name (if any) is
    /// returned either way.
    async fn recall_via_llm(
        &self,
        llm: &LlmClient,
        input: &str,
    ) -> Result<(Option<Resolution>, Option<String>)> {
        let request = Request::from_prompt(format!("Identify the official website for: {input}"))
            .with_system(RECALL_SYSTEM_PROMPT);
        let recall: LlmRecall = llm.generate_json(&request).await?;

        if let Some(error) = recall.error {
            info!("[resolver] model declined: {}", error);
            return Ok((None, None));
        }
        let name = recall.name.filter(|n| !n.trim().is_empty());

        let high_confidence = recall.confidence.as_deref().map(str::to_ascii_lowercase)
            == Some("high".into());
        if !high_confidence {
            return Ok((None, name));
        }

        let mut urls = Vec::new();
        let mut warning = None;
        for raw in recall.urls.unwrap_or_default() {
            match self.validator.validate(&raw).await {
                Ok(validated) => {
                    if warning.is_none() {
                        warning = validated.warning.clone();
                    }
                    urls.push(validated.url);
                }
                Err(e) => warn!("[resolver] rejecting model URL {:?}: {}", raw, e),
            }
        }
        if urls.is_empty() {
            return Ok((None, name));
        }

        let page_type = recall
            .page_type
            .as_deref()
            .map(PageType::parse)
            .unwrap_or_else(|| PageType::guess_from_url(&urls[0]));

        let resolution = Resolution {
            name: name.clone().unwrap_or_else(|| input.to_string()),
            urls,
            page_type,
            confidence: Confidence::High,
            source: ResolutionSource::Llm,
            warning,
        };
        Ok((Some(resolution), name))
    }

    async fn resolution_from_hit(
        &self,
        hit: SearchHit,
        source: ResolutionSource,
    ) -> Result<Resolution> {
        let validated = self.validator.validate(&hit.url).await?;
        let page_type = PageType::guess_from_url(&validated.url);
        let name = if hit.title.is_empty() {
            name_from_url(&validated.url)
        } else {
            hit.title
        };
        Ok(Resolution {
            name,
            urls: vec![validated.url],
            page_type,
            confidence: Confidence::Medium,
            source,
            warning: validated.warning,
        })
    }
}

/// "https://www.stripe.com/pricing" → "Stripe"
fn name_from_url(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string());
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let label = host.split('.').next().unwrap_or(host);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_from_url_capitalizes_domain_label() {
        assert_eq!(name_from_url("https://www.stripe.com/pricing"), "Stripe");
        assert_eq!(name_from_url("https://notion.so"), "Notion");
    }

    #[test]
    fn recall_shape_parses_success_and_error() {
        let ok: LlmRecall = serde_json::from_str(
            r#"{"name":"Stripe","urls":["https://stripe.com"],"page_type":"pricing","confidence":"high"}"#,
        )
        .unwrap();
        assert_eq!(ok.name.as_deref(), Some("Stripe"));
        assert_eq!(ok.confidence.as_deref(), Some("high"));

        let err: LlmRecall = serde_json::from_str(r#"{"error":"unknown product"}"#).unwrap();
        assert!(err.error.is_some());
        assert!(err.urls.is_none());
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let resolver = Resolver::new(None, SearchConfig::default());
        assert!(resolver.resolve("  ").await.is_err());
    }

    #[tokio::test]
    async fn unresolvable_text_without_layers_errors() {
        let resolver = Resolver::new(None, SearchConfig::default());
        let err = resolver.resolve("some unheard-of product").await.unwrap_err();
        assert!(matches!(err, WatchError::Resolver(_)));
    }
}
