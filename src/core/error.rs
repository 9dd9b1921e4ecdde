use thiserror::Error;

use crate::ai::LlmError;

/// Failures inside the orchestration core. Only `InvalidPhase` ever reaches
/// the user as an error; LLM and parsing failures are absorbed by the
/// fallback chains and travel inside a `Resolution::Fallback`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("invalid phase '{name}'. Available: {valid}")]
    InvalidPhase { name: String, valid: String },

    #[error("no output supplied")]
    EmptyOutput,
}

/// Result of a model-backed step: either the model's structured answer, or a
/// well-defined fallback value together with the reason it was needed.
#[derive(Debug)]
pub enum Resolution<T> {
    Parsed(T),
    Fallback { value: T, reason: PipelineError },
}

impl<T> Resolution<T> {
    pub fn value(&self) -> &T {
        match self {
            Resolution::Parsed(value) => value,
            Resolution::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Resolution::Parsed(value) => value,
            Resolution::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&PipelineError> {
        match self {
            Resolution::Parsed(_) => None,
            Resolution::Fallback { reason, .. } => Some(reason),
        }
    }
}
