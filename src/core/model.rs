//! Structured payloads exchanged with the model and stored in the session.
//!
//! Model replies are parsed through the `Raw*` wire types, which accept the
//! loose shapes models actually produce (numbers for strings, a lone string
//! for a list, vulnerabilities as bare labels) and are then resolved into the
//! fully populated public types. Nothing downstream ever sees a partial value.

use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::PipelineError;
use super::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Unknown labels score as Medium.
    pub fn parse_lenient(label: &str) -> Severity {
        match label.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            "info" | "informational" | "none" => Severity::Info,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(label) => Severity::parse_lenient(&label),
            _ => Severity::Medium,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "type", default = "unnamed_vulnerability", deserialize_with = "lenient::text")]
    pub kind: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub impact: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub remediation: String,
}

fn unnamed_vulnerability() -> String {
    "Unspecified".to_string()
}

impl Vulnerability {
    pub fn new(kind: &str, severity: Severity) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            description: String::new(),
            impact: String::new(),
            remediation: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSuggestion {
    pub command: String,
    pub explanation: String,
    pub expected_output: String,
    pub warnings: String,
    pub phase_relevance: String,
    pub template_used: String,
    pub next_steps: Vec<String>,
}

/// Marker for suggestions the model wrote itself.
pub const CUSTOM_TEMPLATE: &str = "custom";
/// Marker for the neutral stub suggestion.
pub const NO_TEMPLATE: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub findings: Vec<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub attack_vectors: Vec<String>,
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub recommended_commands: Vec<String>,
    pub advance_phase: bool,
    pub next_phase: Phase,
    pub risk_level: String,
    pub summary: String,
    pub intelligence_value: String,
}

impl AnalysisResult {
    /// Neutral result used when no structured analysis could be obtained.
    pub fn neutral(output: &str, current: Phase, reason: &str) -> Self {
        Self {
            findings: vec![format!("Command output received ({} bytes)", output.len())],
            vulnerabilities: Vec::new(),
            attack_vectors: Vec::new(),
            next_steps: vec!["Manual analysis required".to_string()],
            recommended_commands: Vec::new(),
            advance_phase: false,
            next_phase: current,
            risk_level: "Unknown".to_string(),
            summary: format!("Automated analysis unavailable ({}); manual review required", reason),
            intelligence_value: "Low".to_string(),
        }
    }

    /// True when the model proposes moving to a different phase.
    pub fn proposes_advance(&self, current: Phase) -> bool {
        self.advance_phase && self.next_phase != current
    }
}

/// Command suggestion as the model wrote it.
#[derive(Debug, Default, Deserialize)]
pub struct RawSuggestion {
    #[serde(default, deserialize_with = "lenient::text")]
    command: String,
    #[serde(default, deserialize_with = "lenient::text")]
    explanation: String,
    #[serde(default, deserialize_with = "lenient::text")]
    expected_output: String,
    #[serde(default, deserialize_with = "lenient::text")]
    warnings: String,
    #[serde(default, deserialize_with = "lenient::text")]
    phase_relevance: String,
    #[serde(default, deserialize_with = "lenient::text")]
    template_used: String,
    #[serde(default, deserialize_with = "lenient::list")]
    next_steps: Vec<String>,
}

impl RawSuggestion {
    /// `command` is the one required field; everything else gets a default.
    pub fn resolve(self, phase: Phase) -> Result<CommandSuggestion, PipelineError> {
        let command = self.command.trim().to_string();
        if command.is_empty() {
            return Err(PipelineError::MalformedResponse(
                "response object has no 'command' field".to_string(),
            ));
        }

        Ok(CommandSuggestion {
            command,
            explanation: or_default(self.explanation, "No explanation provided"),
            expected_output: or_default(self.expected_output, "See command documentation"),
            warnings: or_default(self.warnings, "Ensure you have authorization before running"),
            phase_relevance: or_else(self.phase_relevance, || format!("Relevant to the {} phase", phase)),
            template_used: or_default(self.template_used, CUSTOM_TEMPLATE),
            next_steps: if self.next_steps.is_empty() {
                vec!["Run the command and paste its output for analysis".to_string()]
            } else {
                self.next_steps
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVulnerability {
    Detailed(Vulnerability),
    Label(String),
    Other(Value),
}

/// Output analysis as the model wrote it.
#[derive(Debug, Default, Deserialize)]
pub struct RawAnalysis {
    #[serde(default, deserialize_with = "lenient::list")]
    findings: Vec<String>,
    #[serde(default)]
    vulnerabilities: Vec<RawVulnerability>,
    #[serde(default, deserialize_with = "lenient::list")]
    attack_vectors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    next_steps: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    recommended_commands: Vec<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    advance_phase: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    next_phase: String,
    #[serde(default, deserialize_with = "lenient::text")]
    risk_level: String,
    #[serde(default, deserialize_with = "lenient::text")]
    summary: String,
    #[serde(default, deserialize_with = "lenient::text")]
    intelligence_value: String,
}

impl RawAnalysis {
    pub fn resolve(self, current: Phase) -> AnalysisResult {
        let vulnerabilities = self.vulnerabilities
            .into_iter()
            .filter_map(|raw| match raw {
                RawVulnerability::Detailed(vuln) => Some(vuln),
                RawVulnerability::Label(label) if !label.trim().is_empty() => {
                    Some(Vulnerability::new(label.trim(), Severity::Medium))
                }
                _ => None,
            })
            .collect();

        let next_phase = self.next_phase.parse::<Phase>().unwrap_or(current);

        AnalysisResult {
            findings: self.findings,
            vulnerabilities,
            attack_vectors: self.attack_vectors,
            next_steps: self.next_steps,
            recommended_commands: self.recommended_commands,
            advance_phase: self.advance_phase,
            next_phase,
            risk_level: or_default(self.risk_level, "Unknown"),
            summary: or_default(self.summary, "No summary provided"),
            intelligence_value: or_default(self.intelligence_value, "Medium"),
        }
    }
}

fn or_default(value: String, default: &str) -> String {
    or_else(value, || default.to_string())
}

fn or_else(value: String, default: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        default()
    } else {
        value
    }
}

/// Deserializers that coerce whatever JSON shape arrives into the field type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(value_to_text(Value::deserialize(deserializer)?))
    }

    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .map(value_to_text)
                .filter(|item| !item.trim().is_empty())
                .collect(),
            Value::Null => Vec::new(),
            other => {
                let item = value_to_text(other);
                if item.trim().is_empty() { Vec::new() } else { vec![item] }
            }
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(flag) => flag,
            Value::String(text) => matches!(text.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
            Value::Number(n) => n.as_i64().map_or(false, |n| n != 0),
            _ => false,
        })
    }

    fn value_to_text(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(text) => text,
            Value::Bool(flag) => flag.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => items
                .into_iter()
                .map(value_to_text)
                .filter(|item| !item.is_empty())
                .collect::<Vec<String>>()
                .join("; "),
            Value::Object(_) => value.to_string(),
        }
    }
}
