// ── Watchbot: Configuration ────────────────────────────────────────────────
// Process-scoped configuration derived from environment variables. All keys
// are optional; subsystems whose variables are absent simply stay disabled
// (no LLM → diff-summary analysis, no SMTP → broadcast/stdout fallback).
//
// Loaded once in main() and shared behind an Arc. Partial SMTP configuration
// (host without password, etc.) is a startup error rather than a silent
// half-working notifier.

use crate::error::{Result, WatchError};
use crate::llm::{LlmConfig, Provider};
use std::env;
use std::time::Duration;

// ── Defaults ───────────────────────────────────────────────────────────────

const DEFAULT_DB_PATH: &str = "watchbot.db";
const DEFAULT_INTERVAL_HOURS: u64 = 6;
const DEFAULT_SMTP_PORT: u16 = 465;

// ── Sub-configs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 (implicit TLS) or 587 (STARTTLS). The mailer tries the other
    /// port when the configured one fails.
    pub port: u16,
    pub from: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

/// Search-engine keys for the resolver's recall layers.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub bing_api_key: Option<String>,
}

impl SearchConfig {
    pub fn google_enabled(&self) -> bool {
        self.google_api_key.is_some() && self.google_cx.is_some()
    }

    pub fn bing_enabled(&self) -> bool {
        self.bing_api_key.is_some()
    }
}

// ── Top-level config ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path (or ":memory:" for tests).
    pub db_path: String,
    /// Time between monitoring rounds.
    pub check_interval: Duration,
    pub llm: Option<LlmConfig>,
    /// Stronger model for the resolver's recall prompt, when configured.
    pub llm_model_pro: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub telegram: Option<TelegramConfig>,
    pub webhook: Option<WebhookConfig>,
    pub search: SearchConfig,
}

impl Config {
    /// Read configuration from the environment. Fatal on inconsistent
    /// settings (partial SMTP, unknown provider name).
    pub fn from_env() -> Result<Self> {
        let db_path = env::var("WATCHBOT_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let interval_hours = match env::var("WATCHBOT_INTERVAL_HOURS") {
            Ok(v) => v.parse::<u64>().map_err(|_| {
                WatchError::Config(format!("WATCHBOT_INTERVAL_HOURS is not a number: {v:?}"))
            })?,
            Err(_) => DEFAULT_INTERVAL_HOURS,
        };
        if interval_hours == 0 {
            return Err(WatchError::Config("WATCHBOT_INTERVAL_HOURS must be >= 1".into()));
        }

        let llm = Self::llm_from_env()?;
        let llm_model_pro = non_empty(env::var("LLM_MODEL_PRO").ok());
        let smtp = Self::smtp_from_env()?;
        let telegram = Self::telegram_from_env();
        let webhook = non_empty(env::var("WATCHBOT_WEBHOOK_URL").ok()).map(|url| WebhookConfig {
            url,
            auth_token: non_empty(env::var("WATCHBOT_WEBHOOK_TOKEN").ok()),
        });
        let search = SearchConfig {
            google_api_key: non_empty(env::var("GOOGLE_API_KEY").ok()),
            google_cx: non_empty(env::var("GOOGLE_CX").ok()),
            bing_api_key: non_empty(env::var("BING_API_KEY").ok()),
        };

        Ok(Config {
            db_path,
            check_interval: Duration::from_secs(interval_hours * 3600),
            llm,
            llm_model_pro,
            smtp,
            telegram,
            webhook,
            search,
        })
    }

    fn llm_from_env() -> Result<Option<LlmConfig>> {
        let provider = match non_empty(env::var("LLM_PROVIDER").ok()) {
            Some(p) => p,
            None => return Ok(None),
        };
        let provider = Provider::parse(&provider)
            .ok_or_else(|| WatchError::Config(format!("unknown LLM_PROVIDER: {provider:?}")))?;

        let model = non_empty(env::var("LLM_MODEL").ok())
            .unwrap_or_else(|| provider.default_model().to_string());
        let api_key = non_empty(env::var("LLM_API_KEY").ok()).unwrap_or_default();
        if api_key.is_empty() && provider.requires_api_key() {
            return Err(WatchError::Config(format!(
                "LLM_PROVIDER={} requires LLM_API_KEY",
                provider.as_str()
            )));
        }

        Ok(Some(LlmConfig::new(provider, model, api_key)))
    }

    fn smtp_from_env() -> Result<Option<SmtpConfig>> {
        let host = non_empty(env::var("SMTP_HOST").ok());
        let from = non_empty(env::var("SMTP_FROM").ok());
        let password = non_empty(env::var("SMTP_PASSWORD").ok());

        match (host, from, password) {
            (None, None, None) => Ok(None),
            (Some(host), Some(from), Some(password)) => {
                let port = match env::var("SMTP_PORT") {
                    Ok(v) => v.parse::<u16>().map_err(|_| {
                        WatchError::Config(format!("SMTP_PORT is not a port number: {v:?}"))
                    })?,
                    Err(_) => DEFAULT_SMTP_PORT,
                };
                Ok(Some(SmtpConfig { host, port, from, password }))
            }
            _ => Err(WatchError::Config(
                "partial SMTP config: SMTP_HOST, SMTP_FROM and SMTP_PASSWORD must all be set".into(),
            )),
        }
    }

    fn telegram_from_env() -> Option<TelegramConfig> {
        let bot_token = non_empty(env::var("TELEGRAM_BOT_TOKEN").ok())?;
        let channel_id = non_empty(env::var("TELEGRAM_CHANNEL_ID").ok())?;
        Some(TelegramConfig { bot_token, channel_id })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_filters_blank() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn search_config_enablement() {
        let mut s = SearchConfig::default();
        assert!(!s.google_enabled());
        assert!(!s.bing_enabled());
        s.google_api_key = Some("k".into());
        assert!(!s.google_enabled()); // needs CX too
        s.google_cx = Some("cx".into());
        assert!(s.google_enabled());
        s.bing_api_key = Some("b".into());
        assert!(s.bing_enabled());
    }
}
