use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{check_response, LlmClient, LlmError};
use crate::config::LlmConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

pub struct OpenAiClient {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &LlmConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for OpenAI")?;

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
impl LlmClient for OpenAiClient {
    async fn query(&self, prompt: &str, system_prompt: Option<&str>, model: Option<&str>) -> Result<String, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let request_body = serde_json::json!({
            "model": model.unwrap_or(&self.model),
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self.client
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout(self.timeout) } else { LlmError::Http(e) })?;

        let status = response.status();
        let parsed: ChatResponse = response.json().await?;

        if let Some(error) = parsed.error {
            return Err(LlmError::Api {
                provider: "openai".to_string(),
                status: status.as_u16(),
                message: error.message.unwrap_or_else(|| "Unknown API error".to_string()),
            });
        }

        let text = parsed.choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        check_response(text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
