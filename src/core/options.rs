use std::time::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Operating presets, one per assistant flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Short prompts, 1000-char output cutoff, paste ends on two blank lines
    Simple,
    /// No templates, 3000-char output cutoff
    Standard,
    /// Template hints and fallback, 2000-char output cutoff
    #[default]
    Enhanced,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simple => "simple",
            Mode::Standard => "standard",
            Mode::Enhanced => "enhanced",
        }
    }
}

/// How a pasted block of command output is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteTerminator {
    /// Read until end-of-input (Ctrl-D)
    EndOfInput,
    /// Read until this many consecutive blank lines
    BlankLines(usize),
}

/// Knobs of the single orchestration core.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Put the top template matches into the generation prompt
    pub template_hints: bool,
    /// Fall back to the best template match when the model fails
    pub template_fallback: bool,
    /// Characters of command output sent to the model
    pub output_limit: usize,
    pub paste_terminator: PasteTerminator,
    pub verbose: bool,
    pub model: Option<String>,
    pub llm_timeout: Duration,
    /// Ctrl-C while a model request is outstanding abandons it
    pub cancel_on_interrupt: bool,
}

pub const TEMPLATE_HINT_COUNT: usize = 3;
pub const SEARCH_RESULT_LIMIT: usize = 5;

impl PipelineOptions {
    pub fn for_mode(mode: Mode) -> Self {
        let base = Self {
            template_hints: true,
            template_fallback: true,
            output_limit: 2000,
            paste_terminator: PasteTerminator::EndOfInput,
            verbose: false,
            model: None,
            llm_timeout: Duration::from_secs(60),
            cancel_on_interrupt: false,
        };

        match mode {
            Mode::Simple => Self {
                template_hints: false,
                output_limit: 1000,
                paste_terminator: PasteTerminator::BlankLines(2),
                ..base
            },
            Mode::Standard => Self {
                template_hints: false,
                template_fallback: false,
                output_limit: 3000,
                ..base
            },
            Mode::Enhanced => base,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::for_mode(Mode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_where_the_assistants_did() {
        let simple = PipelineOptions::for_mode(Mode::Simple);
        let standard = PipelineOptions::for_mode(Mode::Standard);
        let enhanced = PipelineOptions::for_mode(Mode::Enhanced);

        assert_eq!(simple.output_limit, 1000);
        assert_eq!(standard.output_limit, 3000);
        assert_eq!(enhanced.output_limit, 2000);

        assert!(simple.template_fallback && !simple.template_hints);
        assert!(!standard.template_fallback && !standard.template_hints);
        assert!(enhanced.template_fallback && enhanced.template_hints);

        assert_eq!(simple.paste_terminator, PasteTerminator::BlankLines(2));
        assert_eq!(enhanced.paste_terminator, PasteTerminator::EndOfInput);
    }

    #[test]
    fn default_is_enhanced() {
        assert_eq!(PipelineOptions::default(), PipelineOptions::for_mode(Mode::Enhanced));
    }
}
