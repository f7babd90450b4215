// ── Watchbot LLM: OpenAI-compatible provider ───────────────────────────────
// Handles OpenAI, Ollama, Minimax, and any chat-completions REST endpoint.
// Digest analysis wants whole responses, so requests are non-streaming.

use super::types::{LlmConfig, Provider, ProviderResponse, Request};
use super::ChatProvider;
use crate::error::{Result, WatchError};
use crate::types::truncate_utf8;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::{json, Value};

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    kind: Provider,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        OpenAiProvider {
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            kind: config.provider,
        }
    }

    fn format_messages(request: &Request) -> Vec<Value> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            messages.push(json!({"role": msg.role.as_str(), "content": msg.content}));
        }
        messages
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn complete(&self, request: &Request, model: &str) -> Result<ProviderResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": model,
            "messages": Self::format_messages(request),
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        debug!("[llm] {} request to {} model={}", self.name(), url, model);

        let mut req = self.client.post(&url).header("Content-Type", "application/json");
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::provider(self.name(), format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(
                "[llm] {} error {}: {}",
                self.name(),
                status.as_u16(),
                truncate_utf8(&body_text, 500)
            );
            return Err(WatchError::provider(
                self.name(),
                format!("API error {}: {}", status.as_u16(), truncate_utf8(&body_text, 200)),
            ));
        }

        let v: Value = serde_json::from_str(&body_text).map_err(|e| {
            WatchError::provider(self.name(), format!("unparseable response body: {e}"))
        })?;

        let choice = &v["choices"][0];
        let content = choice["message"]["content"].as_str().unwrap_or_default().to_string();
        let finish_reason = choice["finish_reason"].as_str().map(|s| s.to_string());
        let tokens_in = v["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let tokens_out = v["usage"]["completion_tokens"].as_u64().unwrap_or(0);

        Ok(ProviderResponse { content, finish_reason, tokens_in, tokens_out })
    }
}
