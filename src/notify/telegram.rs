// ── Watchbot notify: Telegram channel ──────────────────────────────────────
// Broadcast digests to a Telegram channel via the Bot API. No webhooks —
// one POST per message chunk. Telegram caps messages at 4096 chars, so long
// digests are split on line boundaries; if Markdown parsing fails on
// Telegram's side the chunk is retried without parse_mode.

use super::digest::Message;
use crate::config::TelegramConfig;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const TG_API: &str = "https://api.telegram.org/bot";

/// Stay under Telegram's 4096-char limit with headroom.
const CHUNK_LIMIT: usize = 4000;

#[derive(Debug, Deserialize)]
struct TgResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        TelegramChannel {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn send_chunk(&self, text: &str, markdown: bool) -> Result<()> {
        let url = format!("{}{}/sendMessage", TG_API, self.config.bot_token);
        let mut body = json!({
            "chat_id": self.config.channel_id,
            "text": text,
        });
        if markdown {
            body["parse_mode"] = json!("Markdown");
        }

        let response = self.client.post(&url).json(&body).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let parsed: Option<TgResponse> = response.json().await.ok();
        let description = parsed
            .and_then(|r| if r.ok { None } else { r.description })
            .unwrap_or_default();

        if markdown {
            // Digest bodies sometimes break Telegram's Markdown parser
            // (unbalanced underscores in URLs); retry as plain text.
            warn!("[notify] telegram markdown send failed ({status} {description}), retrying plain");
            return Box::pin(self.send_chunk(text, false)).await;
        }

        Err(WatchError::channel(
            "telegram",
            format!("sendMessage failed: {status} {description}"),
        ))
    }
}

#[async_trait]
impl super::Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Broadcast: the recipient is the configured channel, not the user.
    async fn send(&self, _recipient: Option<&str>, message: &Message) -> Result<()> {
        let text = format!("{}\n\n{}", message.title, message.body);
        for chunk in split_message(&text, CHUNK_LIMIT) {
            self.send_chunk(&chunk, true).await?;
        }
        info!("[notify] telegram digest posted to {}", self.config.channel_id);
        Ok(())
    }
}

/// Split text into chunks of at most `limit` bytes, preferring newline
/// boundaries and never splitting inside a UTF-8 character.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let mut cut = limit;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        // Prefer the last newline inside the window.
        let window = &rest[..cut];
        let split_at = window.rfind('\n').filter(|&i| i > 0).unwrap_or(cut);
        chunks.push(rest[..split_at].trim_end_matches('\n').to_string());
        rest = rest[split_at..].trim_start_matches('\n');
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn long_text_splits_on_newlines() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(30));
        assert_eq!(chunks[1], "b".repeat(30));
    }

    #[test]
    fn split_respects_char_boundaries() {
        let text = "é".repeat(100); // 2 bytes each
        let chunks = split_message(&text, 33);
        assert!(chunks.iter().all(|c| c.len() <= 33));
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn split_never_loses_content_without_newlines() {
        let text = "x".repeat(95);
        let chunks = split_message(&text, 40);
        assert_eq!(chunks.join(""), text);
    }
}
