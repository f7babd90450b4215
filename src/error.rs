// ── Watchbot: Error Types ──────────────────────────────────────────────────
// Single canonical error enum for the whole crate, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Network, Provider…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • No variant carries secret material (API keys, SMTP passwords) in its
//     message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WatchError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// LLM provider HTTP or API-level failure (non-secret detail only).
    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Notification channel failure.
    #[error("Channel error: {channel}: {message}")]
    Channel { channel: String, message: String },

    /// URL resolution failure (bad input, no recall hit, validation reject).
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Startup configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The round or an external call was cancelled by shutdown.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl WatchError {
    /// Create a provider error with name and message.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { provider: provider.into(), message: message.into() }
    }

    /// Create a channel error with name and message.
    pub fn channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Channel { channel: channel.into(), message: message.into() }
    }
}

// ── String bridges ─────────────────────────────────────────────────────────
// Allow `?` on helpers still returning `Result<T, String>` inside functions
// that return `Result<T>`.

impl From<String> for WatchError {
    fn from(s: String) -> Self {
        WatchError::Other(s)
    }
}

impl From<&str> for WatchError {
    fn from(s: &str) -> Self {
        WatchError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All watchbot operations should return this type.
pub type Result<T> = std::result::Result<T, WatchError>;
