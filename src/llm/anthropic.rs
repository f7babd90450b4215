// ── Watchbot LLM: Anthropic Claude provider ────────────────────────────────
// Messages API. System prompt rides in a top-level field; the API requires
// max_tokens, so the config default applies when a request leaves it unset.

use super::types::{LlmConfig, ProviderResponse, Request, Role};
use super::ChatProvider;
use crate::error::{Result, WatchError};
use crate::types::truncate_utf8;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    default_max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Self {
        AnthropicProvider {
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_max_tokens: config.max_tokens,
        }
    }

    fn format_messages(request: &Request) -> Vec<Value> {
        request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "assistant",
                    // Anthropic has no system role inside messages
                    _ => "user",
                };
                json!({"role": role, "content": msg.content})
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &Request, model: &str) -> Result<ProviderResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens.unwrap_or(self.default_max_tokens),
            "messages": Self::format_messages(request),
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        debug!("[llm] claude request to {} model={}", url, model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::provider("claude", format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("[llm] claude error {}: {}", status.as_u16(), truncate_utf8(&body_text, 500));
            return Err(WatchError::provider(
                "claude",
                format!("API error {}: {}", status.as_u16(), truncate_utf8(&body_text, 200)),
            ));
        }

        let v: Value = serde_json::from_str(&body_text)
            .map_err(|e| WatchError::provider("claude", format!("unparseable response body: {e}")))?;

        // Join all text blocks; tool blocks are not requested here.
        let content = v["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let finish_reason = v["stop_reason"].as_str().map(|s| s.to_string());
        let tokens_in = v["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let tokens_out = v["usage"]["output_tokens"].as_u64().unwrap_or(0);

        Ok(ProviderResponse { content, finish_reason, tokens_in, tokens_out })
    }
}
