// ── Watchbot LLM: Google Gemini provider ───────────────────────────────────
// generateContent API. System prompts become systemInstruction; JSON mode
// maps onto responseMimeType.

use super::types::{LlmConfig, ProviderResponse, Request, Role};
use super::ChatProvider;
use crate::error::{Result, WatchError};
use crate::types::truncate_utf8;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::{json, Value};

pub struct GoogleProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleProvider {
    pub fn new(config: &LlmConfig) -> Self {
        GoogleProvider {
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn format_contents(request: &Request) -> Vec<Value> {
        request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": msg.content}]})
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for GoogleProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &Request, model: &str) -> Result<ProviderResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let mut generation_config = json!({});
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if request.json_mode {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": Self::format_contents(request),
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        debug!("[llm] gemini request to {} model={}", url, model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::provider("gemini", format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("[llm] gemini error {}: {}", status.as_u16(), truncate_utf8(&body_text, 500));
            return Err(WatchError::provider(
                "gemini",
                format!("API error {}: {}", status.as_u16(), truncate_utf8(&body_text, 200)),
            ));
        }

        let v: Value = serde_json::from_str(&body_text)
            .map_err(|e| WatchError::provider("gemini", format!("unparseable response body: {e}")))?;

        let candidate = &v["candidates"][0];
        let content = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let finish_reason = candidate["finishReason"].as_str().map(|s| s.to_string());
        let tokens_in = v["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0);
        let tokens_out = v["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0);

        Ok(ProviderResponse { content, finish_reason, tokens_in, tokens_out })
    }
}
