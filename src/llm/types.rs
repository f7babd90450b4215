// ── Watchbot LLM: Core types ───────────────────────────────────────────────
// Provider-independent request/response envelopes. These are the shapes that
// flow through the whole client; each provider maps them onto its own wire
// format.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Provider kinds ─────────────────────────────────────────────────────────

/// Which backend family serves the request. Minimax speaks the
/// chat-completions dialect, so it shares the OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Claude,
    Ollama,
    Minimax,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "gemini" | "google" => Some(Provider::Gemini),
            "claude" | "anthropic" => Some(Provider::Claude),
            "ollama" => Some(Provider::Ollama),
            "minimax" => Some(Provider::Minimax),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::Ollama => "ollama",
            Provider::Minimax => "minimax",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::Claude => "https://api.anthropic.com",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Minimax => "https://api.minimax.chat/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Gemini => "gemini-2.0-flash",
            Provider::Claude => "claude-3-5-haiku-20241022",
            Provider::Ollama => "llama3.1",
            Provider::Minimax => "abab6.5s-chat",
        }
    }

    /// Local endpoints run without credentials.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

// ── Client config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    /// Retry wrapping is applied when this is > 1.
    pub max_retries: u32,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl LlmConfig {
    pub fn new(provider: Provider, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        LlmConfig {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            base_url: None,
            max_retries: 3,
            timeout: Duration::from_secs(60),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

// ── Messages ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::Assistant, content: content.into() }
    }
}

// ── Request / Response envelopes ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub json_mode: bool,
}

impl Request {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Request {
            messages: vec![ChatMessage::user(prompt)],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// What a provider hands back before the client layers on sanitization,
/// cost and latency.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// The client's final answer for one generation.
#[derive(Debug, Clone)]
pub struct Response {
    pub content: String,
    pub finish_reason: Option<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// USD estimate from the static pricing table; 0 for unknown models.
    pub cost: f64,
    pub model: String,
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_aliases() {
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::OpenAi));
        assert_eq!(Provider::parse("anthropic"), Some(Provider::Claude));
        assert_eq!(Provider::parse("google"), Some(Provider::Gemini));
        assert_eq!(Provider::parse("minimax"), Some(Provider::Minimax));
        assert_eq!(Provider::parse("frontier9000"), None);
    }

    #[test]
    fn ollama_needs_no_key() {
        assert!(!Provider::Ollama.requires_api_key());
        assert!(Provider::OpenAi.requires_api_key());
    }

    #[test]
    fn config_base_url_falls_back_to_provider_default() {
        let config = LlmConfig::new(Provider::Gemini, "gemini-2.0-flash", "k");
        assert_eq!(config.base_url(), "https://generativelanguage.googleapis.com/v1beta");
        let config = config.with_base_url("http://localhost:9999");
        assert_eq!(config.base_url(), "http://localhost:9999");
    }
}
