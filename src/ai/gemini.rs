use std::time::Duration;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_response, LlmClient, LlmError};
use crate::config::LlmConfig;

// API response structures
#[derive(Debug, Serialize, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CandidateContent {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiError {
    code: Option<i32>,
    message: Option<String>,
    status: Option<String>,
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, config: &LlmConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Gemini")?;

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
impl LlmClient for GeminiClient {
    async fn query(&self, prompt: &str, system_prompt: Option<&str>, model: Option<&str>) -> Result<String, LlmError> {
        // Gemini has no system role here; prepend the system prompt to the user turn
        let text = match system_prompt {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let request_body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": text}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1/models/{}:generateContent",
            model.unwrap_or(&self.model)
        );

        let response_text = self.client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { LlmError::Timeout(self.timeout) } else { LlmError::Http(e) })?
            .text()
            .await?;

        match serde_json::from_str::<GeminiResponse>(&response_text) {
            Ok(response) => {
                if let Some(error) = response.error {
                    return Err(LlmError::Api {
                        provider: "gemini".to_string(),
                        status: error.code.unwrap_or_default() as u16,
                        message: error.message
                            .or(error.status)
                            .unwrap_or_else(|| "Unknown API error".to_string()),
                    });
                }

                let candidate = response.candidates
                    .and_then(|candidates| candidates.into_iter().next())
                    .ok_or(LlmError::EmptyResponse)?;

                if candidate.finish_reason.as_deref() == Some("SAFETY") {
                    log::warn!("Gemini stopped generation for safety reasons");
                }

                let text = candidate.content.parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<String>>()
                    .join("");

                check_response(text)
            }
            Err(_) => {
                // Try to find an error message in an unexpected shape
                let v: Value = serde_json::from_str(&response_text).unwrap_or(Value::Null);
                match v["error"]["message"].as_str() {
                    Some(message) => Err(LlmError::Api {
                        provider: "gemini".to_string(),
                        status: 0,
                        message: message.to_string(),
                    }),
                    None => Err(LlmError::ErrorText(format!(
                        "unexpected API response format: {}",
                        crate::utils::truncate_chars(&response_text, 200)
                    ))),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
