// URL normalization and liveness validation for the resolver.
// DNS failure is hard-invalid (the domain doesn't exist, don't monitor it);
// transport and HTTP-level failures are soft-invalid (the site may just
// dislike our probe — accept with a warning).

use crate::error::{Result, WatchError};
use log::{debug, warn};
use reqwest::Client;
use std::time::Duration;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// TLDs that make a bare token ("stripe.com") count as a URL in the
/// resolver's pre-check.
const COMMON_TLDS: &[&str] = &[
    ".com", ".org", ".net", ".io", ".dev", ".ai", ".co", ".app", ".so", ".sh",
];

// ── Pre-check ──────────────────────────────────────────────────────────────

/// Does this input look like a URL already (skip natural-language recall)?
pub fn looks_like_url(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.contains("://") {
        return true;
    }
    // A single token ending in (or containing) a common TLD.
    if trimmed.split_whitespace().count() == 1 {
        let token = trimmed.to_ascii_lowercase();
        return COMMON_TLDS
            .iter()
            .any(|tld| token.ends_with(tld) || token.contains(&format!("{tld}/")));
    }
    false
}

// ── Normalization ──────────────────────────────────────────────────────────

/// Normalize raw input into an http(s) URL: prepend `https://` when no
/// scheme is present, drop the fragment, require a host.
pub fn normalize(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WatchError::Resolver("empty URL".into()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| WatchError::Resolver(format!("invalid URL {trimmed:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WatchError::Resolver(format!(
            "unsupported scheme {:?} in {trimmed:?}",
            url.scheme()
        )));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(WatchError::Resolver(format!("URL has no host: {trimmed:?}")));
    }
    url.set_fragment(None);
    Ok(url)
}

// ── Validation ─────────────────────────────────────────────────────────────

/// A URL that passed validation. `warning` is set for soft-invalid results
/// (reachable DNS, unhappy HTTP probe).
#[derive(Debug, Clone)]
pub struct ValidatedUrl {
    pub url: String,
    pub warning: Option<String>,
}

pub struct UrlValidator {
    client: Client,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        UrlValidator {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(PROBE_TIMEOUT)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Normalize + DNS + HEAD-probe (GET fallback) one raw URL.
    pub async fn validate(&self, raw: &str) -> Result<ValidatedUrl> {
        let url = normalize(raw)?;
        let host = url
            .host_str()
            .ok_or_else(|| WatchError::Resolver(format!("URL has no host: {raw:?}")))?;
        let port = url.port_or_known_default().unwrap_or(443);

        // DNS failure is a hard reject: nothing to monitor behind it.
        tokio::net::lookup_host((host, port)).await.map_err(|e| {
            WatchError::Resolver(format!("DNS lookup failed for {host}: {e}"))
        })?;

        let warning = match self.probe(url.as_str()).await {
            Ok(status) if (200..400).contains(&status) => None,
            Ok(status) => {
                warn!("[resolver] probe of {} returned HTTP {}", url, status);
                Some(format!("HTTP {status}"))
            }
            Err(e) => {
                warn!("[resolver] probe of {} failed: {}", url, e);
                Some(format!("probe failed: {e}"))
            }
        };

        Ok(ValidatedUrl { url: url.to_string(), warning })
    }

    /// HEAD, falling back to GET for servers that reject HEAD.
    async fn probe(&self, url: &str) -> std::result::Result<u16, reqwest::Error> {
        match self.client.head(url).send().await {
            Ok(response) if response.status() != reqwest::StatusCode::METHOD_NOT_ALLOWED => {
                Ok(response.status().as_u16())
            }
            _ => {
                debug!("[resolver] HEAD rejected, retrying {} with GET", url);
                let response = self.client.get(url).send().await?;
                Ok(response.status().as_u16())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domains_look_like_urls() {
        assert!(looks_like_url("stripe.com"));
        assert!(looks_like_url("https://stripe.com/pricing"));
        assert!(looks_like_url("stripe.com/pricing"));
        assert!(!looks_like_url("the stripe payments company"));
        assert!(!looks_like_url("monitor notion please"));
    }

    #[test]
    fn normalize_adds_scheme_and_drops_fragment() {
        let url = normalize("stripe.com/pricing#plans").unwrap();
        assert_eq!(url.as_str(), "https://stripe.com/pricing");
    }

    #[test]
    fn normalize_rejects_non_http_schemes() {
        assert!(normalize("ftp://stripe.com").is_err());
        assert!(normalize("javascript:alert(1)").is_err());
    }

    #[test]
    fn normalize_requires_a_host() {
        assert!(normalize("").is_err());
        assert!(normalize("https://").is_err());
    }

    #[test]
    fn normalize_keeps_existing_scheme() {
        let url = normalize("http://localhost:8080/x").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8080));
    }
}
