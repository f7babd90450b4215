// ── Watchbot LLM: Client ───────────────────────────────────────────────────
// Provider-polymorphic chat client. Callers hold an `LlmClient` and call
// `generate()` / `generate_json()` without knowing which backend serves it.
//
// Module layout:
//   types     — config, provider kinds, request/response envelopes
//   openai    — OpenAI-compatible wire format (openai, ollama, minimax)
//   anthropic — Claude messages API
//   google    — Gemini generateContent API
//   retry     — transient-error classification + exponential backoff
//   parsing   — think-block stripping, code-fence extraction
//   pricing   — static model→rate table for cost accounting

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod parsing;
pub mod pricing;
pub mod retry;
pub mod types;

pub use types::{ChatMessage, LlmConfig, Provider, ProviderResponse, Request, Response, Role};

use crate::error::{Result, WatchError};
use async_trait::async_trait;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tokio::sync::watch;

// ── Provider trait ─────────────────────────────────────────────────────────

/// One chat backend. Implementations are safe for concurrent use; the retry
/// layer lives above this seam so providers stay single-shot.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send one completion request. Transient failures must surface in the
    /// error message (status code or reqwest text) for the retry layer to
    /// classify.
    async fn complete(&self, request: &Request, model: &str) -> Result<ProviderResponse>;
}

/// Construct the right concrete provider from an `LlmConfig`.
/// All chat-completions dialects share the OpenAI provider; only Claude and
/// Gemini carry unique wire formats.
pub fn provider_from_config(config: &LlmConfig) -> Box<dyn ChatProvider> {
    match config.provider {
        Provider::Claude => Box::new(anthropic::AnthropicProvider::new(config)),
        Provider::Gemini => Box::new(google::GoogleProvider::new(config)),
        // OpenAI-compatible variants: OpenAI, Ollama, Minimax
        _ => Box::new(openai::OpenAiProvider::new(config)),
    }
}

// ── Client ─────────────────────────────────────────────────────────────────

/// Retrying, sanitizing, cost-accounting facade over one provider.
pub struct LlmClient {
    provider: Box<dyn ChatProvider>,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let provider = provider_from_config(&config);
        LlmClient { provider, config }
    }

    /// Build a client around an explicit provider — the injection seam for
    /// tests and custom backends.
    pub fn from_provider(provider: Box<dyn ChatProvider>, config: LlmConfig) -> Self {
        LlmClient { provider, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One generation, with retry on transient failures and response
    /// sanitization. `shutdown` preempts backoff sleeps.
    pub async fn generate_with_shutdown(
        &self,
        request: &Request,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<Response> {
        let start = Instant::now();
        let attempts = self.config.max_retries.max(1);
        let mut last_error: Option<String> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = retry::backoff_delay(attempt - 1);
                warn!(
                    "[llm] {} retry {}/{} after {}ms",
                    self.provider.name(),
                    attempt,
                    attempts - 1,
                    delay.as_millis()
                );
                if retry::sleep_or_cancel(delay, shutdown).await {
                    return Err(WatchError::Cancelled);
                }
            }

            match self.provider.complete(request, &self.config.model).await {
                Ok(raw) => {
                    let content = parsing::strip_think_blocks(&raw.content);
                    let cost =
                        pricing::estimate_cost_usd(&self.config.model, raw.tokens_in, raw.tokens_out);
                    info!(
                        "[llm] {} ok model={} in={} out={} cost=${:.6}",
                        self.provider.name(),
                        self.config.model,
                        raw.tokens_in,
                        raw.tokens_out,
                        cost
                    );
                    return Ok(Response {
                        content,
                        finish_reason: raw.finish_reason,
                        tokens_in: raw.tokens_in,
                        tokens_out: raw.tokens_out,
                        cost,
                        model: self.config.model.clone(),
                        latency_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    let retryable = self.config.max_retries > 1 && retry::is_retryable(&message);
                    if !retryable {
                        return Err(e);
                    }
                    if attempt + 1 >= attempts {
                        last_error = Some(message);
                        break;
                    }
                    last_error = Some(message);
                }
            }
        }

        Err(WatchError::provider(
            self.provider.name(),
            format!(
                "max retries exceeded after {} attempts: {}",
                attempts,
                last_error.unwrap_or_default()
            ),
        ))
    }

    pub async fn generate(&self, request: &Request) -> Result<Response> {
        self.generate_with_shutdown(request, None).await
    }

    /// JSON-mode convenience: forces json_mode, strips markdown fences for
    /// providers without structured output, and parses into `T`.
    pub async fn generate_json<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let mut request = request.clone();
        request.json_mode = true;
        let response = self.generate(&request).await?;
        let cleaned = parsing::strip_code_fences(&response.content);
        let parsed = serde_json::from_str(&cleaned)?;
        Ok(parsed)
    }
}

// ── Test stub ──────────────────────────────────────────────────────────────

/// Scripted provider for tests: yields the queued outcomes in order,
/// repeating the last one when the script runs dry. Counts attempts so retry
/// behavior is observable.
pub struct StubProvider {
    script: parking_lot::Mutex<Vec<std::result::Result<String, String>>>,
    attempts: std::sync::atomic::AtomicU32,
}

impl StubProvider {
    pub fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        StubProvider {
            script: parking_lot::Mutex::new(script),
            attempts: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// A stub that always answers with `content`.
    pub fn always(content: impl Into<String>) -> Self {
        Self::new(vec![Ok(content.into())])
    }

    /// A stub that always fails with `message`.
    pub fn always_err(message: impl Into<String>) -> Self {
        Self::new(vec![Err(message.into())])
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: &Request, _model: &str) -> Result<ProviderResponse> {
        self.attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut script = self.script.lock();
        let outcome = if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().cloned().unwrap_or(Err("stub script empty".into()))
        };
        match outcome {
            Ok(content) => Ok(ProviderResponse {
                content,
                finish_reason: Some("stop".into()),
                tokens_in: 10,
                tokens_out: 5,
            }),
            Err(message) => Err(WatchError::provider("stub", message)),
        }
    }
}
