// ── Watchbot: Notifier ─────────────────────────────────────────────────────
// Channel abstraction and per-subscriber dispatch. Preference order:
// the subscriber's email when SMTP is configured, otherwise the broadcast
// channels (Telegram), otherwise stdout. A failed send is logged and never
// aborts the round or the other subscribers.
//
// Module layout:
//   digest   — grouping + message rendering
//   format   — escaping, restricted markdown, HTML email skeleton
//   email    — SMTP via lettre (465 implicit TLS / 587 STARTTLS, fallback)
//   telegram — Bot API broadcast with chunking
//   webhook  — outbound JSON POST broadcast

pub mod digest;
pub mod email;
pub mod format;
pub mod telegram;
pub mod webhook;

pub use digest::{assemble, render, render_heartbeat, Digest, Message, MessageFormat};

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use log::{error, info};

// ── Channel seam ───────────────────────────────────────────────────────────

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. `recipient` is the subscriber address for
    /// point-to-point channels and ignored by broadcast channels.
    async fn send(&self, recipient: Option<&str>, message: &Message) -> Result<()>;
}

// ── Dispatcher ─────────────────────────────────────────────────────────────

pub struct Notifier {
    email: Option<email::EmailChannel>,
    broadcast: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        let email = config.smtp.clone().map(email::EmailChannel::new);
        let mut broadcast: Vec<Box<dyn Channel>> = Vec::new();
        if let Some(tg) = config.telegram.clone() {
            broadcast.push(Box::new(telegram::TelegramChannel::new(tg)));
        }
        if let Some(wh) = config.webhook.clone() {
            broadcast.push(Box::new(webhook::WebhookChannel::new(wh)));
        }
        Notifier { email, broadcast }
    }

    /// A notifier with no configured channels (stdout only) — used by tests.
    pub fn disabled() -> Self {
        Notifier { email: None, broadcast: Vec::new() }
    }

    /// Explicit channel injection, for tests and embedders.
    pub fn with_channels(
        email: Option<email::EmailChannel>,
        broadcast: Vec<Box<dyn Channel>>,
    ) -> Self {
        Notifier { email, broadcast }
    }

    /// Deliver one subscriber's digest. Errors are logged per channel; this
    /// function only fails when even the stdout fallback is unreachable,
    /// i.e. never.
    pub async fn deliver(&self, recipient_email: &str, message: &Message) {
        if let Some(email) = &self.email {
            match email.send(Some(recipient_email), message).await {
                Ok(()) => return,
                Err(e) => {
                    error!("[notify] email to {} failed: {}", recipient_email, e);
                    // Fall through to broadcast/stdout so the digest is not
                    // silently lost.
                }
            }
        }

        if !self.broadcast.is_empty() {
            let mut delivered = false;
            for channel in &self.broadcast {
                // Broadcast channels may ignore the recipient; it is passed
                // through so point-to-point embedders can use it.
                match channel.send(Some(recipient_email), message).await {
                    Ok(()) => delivered = true,
                    Err(e) => error!("[notify] {} broadcast failed: {}", channel.name(), e),
                }
            }
            if delivered {
                return;
            }
        }

        // Final fallback: stdout.
        info!("[notify] falling back to stdout for {}", recipient_email);
        println!("=== {} ===\n{}\n", message.title, message.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest::MessageFormat;

    #[tokio::test]
    async fn disabled_notifier_falls_back_to_stdout() {
        let notifier = Notifier::disabled();
        let message = Message {
            title: "t".into(),
            body: "b".into(),
            html_body: "<html></html>".into(),
            format: MessageFormat::Html,
        };
        // Must not error or panic.
        notifier.deliver("user@example.com", &message).await;
    }
}
