// ── Watchbot notify: Email channel ─────────────────────────────────────────
// SMTP delivery via lettre. Port 465 speaks implicit TLS, 587 speaks
// STARTTLS; when the configured port fails we try the other one before
// giving up. Subject headers are RFC-2047 encoded and the HTML body is
// base64 transfer-encoded by lettre's message builder.

use super::digest::Message;
use crate::config::SmtpConfig;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use log::{info, warn};

pub struct EmailChannel {
    config: SmtpConfig,
}

impl EmailChannel {
    pub fn new(config: SmtpConfig) -> Self {
        EmailChannel { config }
    }

    fn build_email(&self, recipient: &str, message: &Message) -> Result<lettre::Message> {
        let from = self
            .config
            .from
            .parse()
            .map_err(|e| WatchError::channel("email", format!("bad from address: {e}")))?;
        let to = recipient
            .parse()
            .map_err(|e| WatchError::channel("email", format!("bad recipient {recipient:?}: {e}")))?;

        let email = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(message.title.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.body.clone(),
                message.html_body.clone(),
            ))
            .map_err(|e| WatchError::channel("email", format!("message build failed: {e}")))?;
        Ok(email)
    }

    fn transport(&self, port: u16) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials =
            Credentials::new(self.config.from.clone(), self.config.password.clone());
        let builder = if port == 465 {
            // Implicit TLS from the first byte.
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        } else {
            // Plain connection upgraded via STARTTLS.
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        }
        .map_err(|e| WatchError::channel("email", format!("transport build failed: {e}")))?;
        Ok(builder.port(port).credentials(credentials).build())
    }

    /// The other TLS flavor, for the port-fallback retry.
    fn fallback_port(&self) -> u16 {
        if self.config.port == 465 {
            587
        } else {
            465
        }
    }
}

#[async_trait]
impl super::Channel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, recipient: Option<&str>, message: &Message) -> Result<()> {
        let recipient = recipient
            .ok_or_else(|| WatchError::channel("email", "no recipient address".to_string()))?;
        let email = self.build_email(recipient, message)?;

        let primary = self.config.port;
        match self.transport(primary)?.send(email.clone()).await {
            Ok(_) => {
                info!("[notify] email sent to {} via {}:{}", recipient, self.config.host, primary);
                Ok(())
            }
            Err(first_err) => {
                let fallback = self.fallback_port();
                warn!(
                    "[notify] email via {}:{} failed ({}), retrying on port {}",
                    self.config.host, primary, first_err, fallback
                );
                self.transport(fallback)?
                    .send(email)
                    .await
                    .map_err(|e| {
                        WatchError::channel(
                            "email",
                            format!("send to {recipient} failed on both ports: {first_err}; {e}"),
                        )
                    })?;
                info!("[notify] email sent to {} via {}:{}", recipient, self.config.host, fallback);
                Ok(())
            }
        }
    }
}
