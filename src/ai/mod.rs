use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompts;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::LlmConfig;

/// Prefix some providers use to report failures as ordinary text.
pub const ERROR_TEXT_PREFIX: &str = "Error querying LLM:";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api { provider: String, status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("no provider configured for model '{0}'")]
    NotConfigured(String),

    #[error("provider reported an error: {0}")]
    ErrorText(String),

    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// The narrow request/response seam between the core and any model provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn query(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        model: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Provider name for display
    fn name(&self) -> &str;
}

/// Reject error-tagged or empty text so it follows the same path as a
/// raised failure.
pub fn check_response(text: String) -> Result<String, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    if let Some(rest) = trimmed.strip_prefix(ERROR_TEXT_PREFIX) {
        return Err(LlmError::ErrorText(rest.trim().to_string()));
    }
    Ok(text)
}

/// Stand-in used when no API key matches the configured model. Every query
/// fails, so the assistant runs on templates alone.
pub struct OfflineClient {
    model: String,
}

impl OfflineClient {
    pub fn new(model: &str) -> Self {
        Self { model: model.to_string() }
    }
}

#[async_trait]
impl LlmClient for OfflineClient {
    async fn query(&self, _prompt: &str, _system_prompt: Option<&str>, _model: Option<&str>) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(self.model.clone()))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Pick a provider from the model name prefix, falling back to offline mode
/// when the matching API key is missing.
pub fn build_client(config: &LlmConfig) -> anyhow::Result<Box<dyn LlmClient>> {
    let model = config.model.as_str();
    let timeout = Duration::from_secs(config.timeout_secs);

    let client: Box<dyn LlmClient> = if model.starts_with("gpt") || model.starts_with("o1") {
        match &config.openai_api_key {
            Some(key) => Box::new(OpenAiClient::new(key, config, timeout)?),
            None => Box::new(OfflineClient::new(model)),
        }
    } else if model.starts_with("claude") {
        match &config.anthropic_api_key {
            Some(key) => Box::new(AnthropicClient::new(key, config, timeout)?),
            None => Box::new(OfflineClient::new(model)),
        }
    } else if model.starts_with("gemini") {
        match &config.gemini_api_key {
            Some(key) => Box::new(GeminiClient::new(key, config, timeout)?),
            None => Box::new(OfflineClient::new(model)),
        }
    } else {
        Box::new(OfflineClient::new(model))
    };

    log::debug!("Using LLM provider '{}' for model '{}'", client.name(), model);
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tagged_text_is_a_failure() {
        let err = check_response("Error querying LLM: rate limited".to_string()).unwrap_err();
        match err {
            LlmError::ErrorText(msg) => assert_eq!(msg, "rate limited"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_text_is_a_failure() {
        assert!(matches!(check_response("  \n".to_string()), Err(LlmError::EmptyResponse)));
        assert_eq!(check_response("{}".to_string()).unwrap(), "{}");
    }

    #[test]
    fn missing_key_means_offline() {
        let config = LlmConfig {
            model: "claude-3-sonnet-20240229".to_string(),
            anthropic_api_key: None,
            ..LlmConfig::default()
        };
        let client = build_client(&config).unwrap();
        assert_eq!(client.name(), "offline");
    }

    #[tokio::test]
    async fn offline_client_always_fails() {
        let client = OfflineClient::new("gpt-4");
        let err = client.query("hi", None, None).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(model) if model == "gpt-4"));
    }
}
