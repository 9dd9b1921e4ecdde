use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};

use crate::core::options::{Mode, PipelineOptions};

pub const DEFAULT_CONFIG_FILE: &str = "secagent.toml";
const ENV_PREFIX: &str = "SECAGENT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub pipeline: PipelineConfig,
    /// Extra template values such as `lhost` or `wordlist`
    pub placeholders: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where snapshots are written
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_fallback: Option<bool>,
    pub cancel_on_interrupt: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_secs: 60,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Layer the optional TOML file, then `SECAGENT__*` variables
    /// (`SECAGENT__LLM__MODEL=claude-3-opus`), then the providers' own
    /// API key variables for keys still unset.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.llm.apply_env_keys();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        Ok(())
    }

    /// Mode preset with the file's overrides applied.
    pub fn pipeline_options(&self) -> PipelineOptions {
        let mut options = PipelineOptions::for_mode(self.pipeline.mode);

        if let Some(limit) = self.pipeline.output_limit {
            options.output_limit = limit;
        }
        if let Some(fallback) = self.pipeline.template_fallback {
            options.template_fallback = fallback;
        }
        options.cancel_on_interrupt = self.pipeline.cancel_on_interrupt;
        options.llm_timeout = Duration::from_secs(self.llm.timeout_secs);
        options
    }
}

impl LlmConfig {
    fn apply_env_keys(&mut self) {
        fill_from_env(&mut self.openai_api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.anthropic_api_key, "ANTHROPIC_API_KEY");
        fill_from_env(&mut self.gemini_api_key, "GEMINI_API_KEY");
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = std::env::var(var).ok().filter(|value| !value.trim().is_empty());
    }
}
