use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use log::{debug, warn};
use regex::Regex;

use crate::ai::{prompts, LlmClient};

use super::error::{PipelineError, Resolution};
use super::extract::extract_as;
use super::model::{CommandSuggestion, RawSuggestion, NO_TEMPLATE};
use super::options::{PipelineOptions, TEMPLATE_HINT_COUNT};
use super::phase::Phase;
use super::request::query_bounded;
use super::templates::{Placeholders, TemplateCatalog, TemplateEntry};

const RUN_AND_PASTE: &str = "Run the command and paste its output for analysis";

/// Turns a natural-language request into one concrete command.
pub struct CommandGenerator {
    catalog: Arc<TemplateCatalog>,
    client: Arc<dyn LlmClient>,
    options: PipelineOptions,
    extra_placeholders: HashMap<String, String>,
}

impl CommandGenerator {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        client: Arc<dyn LlmClient>,
        options: PipelineOptions,
        extra_placeholders: HashMap<String, String>,
    ) -> Self {
        Self {
            catalog,
            client,
            options,
            extra_placeholders,
        }
    }

    /// Templates relevant to `request`, best first.
    ///
    /// Substring search within the phase, then across phases, then keyword
    /// scoring with the same widening.
    pub fn matching_templates(&self, request: &str, phase: Phase, target: Option<&str>) -> Vec<&TemplateEntry> {
        let mut matches = self.catalog.search(request, Some(phase));
        if matches.is_empty() {
            matches = self.catalog.search(request, None);
        }
        if matches.is_empty() {
            matches = self.catalog.match_keywords(request, Some(phase), target);
        }
        if matches.is_empty() {
            matches = self.catalog.match_keywords(request, None, target);
        }
        matches
    }

    /// Always yields a suggestion. A model failure of any kind lands on the
    /// best matching template, or on a neutral stub when there is none.
    pub async fn generate(&self, request: &str, phase: Phase, target: Option<&str>) -> Resolution<CommandSuggestion> {
        let inferred;
        let target = match target {
            Some(target) => Some(target),
            None => {
                inferred = extract_domain(request);
                if let Some(domain) = &inferred {
                    debug!("Inferred target '{}' from request", domain);
                }
                inferred.as_deref()
            }
        };

        let matches = self.matching_templates(request, phase, target);
        let hints: Vec<&TemplateEntry> = if self.options.template_hints {
            matches.iter().take(TEMPLATE_HINT_COUNT).copied().collect()
        } else {
            Vec::new()
        };

        let system_prompt = prompts::command_system_prompt(phase, target, &hints);
        let prompt = prompts::command_prompt(request, target);

        let parsed = match query_bounded(self.client.as_ref(), &prompt, &system_prompt, &self.options).await {
            Ok(response) => extract_as::<RawSuggestion>(&response).and_then(|raw| raw.resolve(phase)),
            Err(e) => Err(PipelineError::from(e)),
        };

        match parsed {
            Ok(suggestion) => Resolution::Parsed(suggestion),
            Err(reason) => {
                warn!("Command generation fell back: {}", reason);
                let value = match matches.first().filter(|_| self.options.template_fallback) {
                    Some(entry) => self.from_template(entry, phase, target),
                    None => stub_suggestion(phase, &reason),
                };
                Resolution::Fallback { value, reason }
            }
        }
    }

    fn from_template(&self, entry: &TemplateEntry, phase: Phase, target: Option<&str>) -> CommandSuggestion {
        let rendered = Placeholders::for_target(target, &self.extra_placeholders).render(&entry.pattern);

        let mut warnings = "Template-based command - verify parameters before running".to_string();
        if !rendered.unresolved.is_empty() {
            warnings.push_str(&format!(". Fill in: {}", rendered.unresolved.join(", ")));
        }

        CommandSuggestion {
            command: rendered.command,
            explanation: entry.description.clone(),
            expected_output: "See command documentation".to_string(),
            warnings,
            phase_relevance: format!("Part of the {} phase", phase),
            template_used: entry.name.clone(),
            next_steps: vec![RUN_AND_PASTE.to_string()],
        }
    }
}

fn stub_suggestion(phase: Phase, reason: &PipelineError) -> CommandSuggestion {
    CommandSuggestion {
        command: "echo 'Could not generate a command; try rephrasing the request'".to_string(),
        explanation: "No command could be generated for this request".to_string(),
        expected_output: "None".to_string(),
        warnings: reason.to_string(),
        phase_relevance: format!("Part of the {} phase", phase),
        template_used: NO_TEMPLATE.to_string(),
        next_steps: vec!["Rephrase the request or browse templates with 'templates'".to_string()],
    }
}

/// First domain-looking token in free text.
pub fn extract_domain(message: &str) -> Option<String> {
    static DOMAIN: OnceLock<Option<Regex>> = OnceLock::new();
    let domain_regex = DOMAIN
        .get_or_init(|| {
            Regex::new(r"(?:https?://)?(?:www\.)?([a-zA-Z0-9][-a-zA-Z0-9]*\.[a-zA-Z0-9]+(?:\.[a-zA-Z0-9]+)*)").ok()
        })
        .as_ref()?;

    domain_regex
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|domain| domain.as_str().to_string())
}
