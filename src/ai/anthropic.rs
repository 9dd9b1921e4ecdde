use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{check_response, LlmClient, LlmError};
use crate::config::LlmConfig;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful cybersecurity assistant.";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ContentBlock>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

pub struct AnthropicClient {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str, config: &LlmConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Anthropic")?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
            client,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn query(&self, prompt: &str, system_prompt: Option<&str>, model: Option<&str>) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "model": model.unwrap_or(&self.model),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self.client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout(self.timeout) } else { LlmError::Http(e) })?;

        let status = response.status();
        let parsed: MessagesResponse = response.json().await?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Api {
                provider: "anthropic".to_string(),
                status: status.as_u16(),
                message: error.message.unwrap_or_else(|| "Unknown API error".to_string()),
            });
        }

        let text = parsed.content
            .unwrap_or_default()
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<String>>()
            .join("\n");

        check_response(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
