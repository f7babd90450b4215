// ── Watchbot notify: Webhook channel ───────────────────────────────────────
// Outbound JSON POST for systems that want the raw digest (Zapier, n8n,
// internal dashboards). The payload carries both bodies so receivers can
// pick their rendering. Optional bearer token.

use super::digest::Message;
use crate::config::WebhookConfig;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        WebhookChannel {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
        }
    }
}

#[async_trait]
impl super::Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, recipient: Option<&str>, message: &Message) -> Result<()> {
        let payload = json!({
            "recipient": recipient,
            "title": message.title,
            "body": message.body,
            "html_body": message.html_body,
            "format": message.format,
        });

        let mut request = self.client.post(&self.config.url).json(&payload);
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WatchError::channel(
                "webhook",
                format!("POST {} returned {}", self.config.url, response.status().as_u16()),
            ));
        }
        info!("[notify] webhook digest posted to {}", self.config.url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::digest::MessageFormat;

    #[test]
    fn payload_shape_includes_both_bodies() {
        let message = Message {
            title: "t".into(),
            body: "plain".into(),
            html_body: "<html></html>".into(),
            format: MessageFormat::Html,
        };
        let payload = json!({
            "recipient": Some("u@example.com"),
            "title": message.title,
            "body": message.body,
            "html_body": message.html_body,
            "format": message.format,
        });
        assert_eq!(payload["format"], "html");
        assert_eq!(payload["body"], "plain");
        assert_eq!(payload["recipient"], "u@example.com");
    }
}
