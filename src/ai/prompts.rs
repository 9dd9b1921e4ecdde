//! Prompt assembly for command generation and output analysis.

use crate::core::phase::Phase;
use crate::core::templates::TemplateEntry;

const COMMAND_SCHEMA: &str = r#"{
    "command": "exact command to run",
    "explanation": "detailed explanation of what this command does",
    "expected_output": "what kind of output to expect",
    "warnings": "important warnings or prerequisites",
    "phase_relevance": "how this relates to the current kill chain phase",
    "template_used": "name of template if used, or 'custom' if AI-generated",
    "next_steps": ["suggested follow-up actions"]
}"#;

const ANALYSIS_SCHEMA: &str = r#"{
    "findings": ["key discoveries"],
    "vulnerabilities": [
        {
            "type": "vulnerability type",
            "severity": "Low/Medium/High/Critical",
            "description": "detailed description",
            "impact": "potential impact",
            "remediation": "how to fix"
        }
    ],
    "attack_vectors": ["potential attack methods"],
    "next_steps": ["recommended actions"],
    "advance_phase": true,
    "next_phase": "one of the kill chain phase names",
    "recommended_commands": ["specific commands for next steps"],
    "risk_level": "overall risk assessment",
    "summary": "executive summary",
    "intelligence_value": "High/Medium/Low"
}"#;

pub fn command_system_prompt(phase: Phase, target: Option<&str>, hints: &[&TemplateEntry]) -> String {
    let mut prompt = format!(
        "You are an expert penetration tester providing exact terminal commands for an authorized assessment.\n\n\
         Current Context:\n\
         - Target: {}\n\
         - Current Phase: {}\n\
         - Phase Description: {}\n",
        target.unwrap_or("Not set"),
        phase,
        phase.description(),
    );

    if !hints.is_empty() {
        prompt.push_str("\nAvailable templates for this request:\n");
        for entry in hints {
            prompt.push_str(&format!("- {}: {}\n", entry.name, entry.pattern));
        }
    }

    prompt.push_str(
        "\nProvide the most appropriate command considering the current kill chain phase, \
         the available templates and the target. Respond with a single JSON object and nothing else.",
    );
    prompt
}

pub fn command_prompt(user_request: &str, target: Option<&str>) -> String {
    format!(
        "User Request: \"{}\"\n\nTarget: {}\n\nGenerate the best command for this request. Response format:\n{}",
        user_request,
        target.unwrap_or("Not set"),
        COMMAND_SCHEMA,
    )
}

pub fn analysis_system_prompt(phase: Phase, target: Option<&str>, command: &str) -> String {
    format!(
        "You are an expert penetration tester analyzing command output from an authorized assessment.\n\n\
         Current Context:\n\
         - Target: {}\n\
         - Current Phase: {}\n\
         - Phase Description: {}\n\
         - Command: {}\n\n\
         Kill chain phases, in order: {}.\n\n\
         Analyze the output for key findings, security vulnerabilities, potential attack vectors, \
         next recommended actions, phase advancement opportunities and overall risk. \
         Respond with a single JSON object and nothing else.",
        target.unwrap_or("Not set"),
        phase,
        phase.description(),
        command,
        Phase::names().join(", "),
    )
}

/// `output` must already be cut to the configured limit.
pub fn analysis_prompt(command: &str, output: &str, truncated: bool) -> String {
    let note = if truncated { "\n[output truncated]" } else { "" };
    format!(
        "Command: {}\nOutput:\n{}{}\n\nProvide comprehensive analysis in JSON format:\n{}",
        command, output, note, ANALYSIS_SCHEMA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::templates::TemplateCatalog;

    #[test]
    fn command_prompt_carries_context_and_hints() {
        let catalog = TemplateCatalog::builtin();
        let hints = catalog.search("port_scan", Some(Phase::Reconnaissance));
        let system = command_system_prompt(Phase::Reconnaissance, Some("example.com"), &hints[..2]);

        assert!(system.contains("Target: example.com"));
        assert!(system.contains("Gathering information about the target"));
        assert!(system.contains("- port_scan_basic: nmap -sS -sV {target}"));
        assert!(!system.contains("port_scan_udp"));
    }

    #[test]
    fn command_prompt_without_hints_has_no_template_section() {
        let system = command_system_prompt(Phase::Delivery, None, &[]);
        assert!(system.contains("Target: Not set"));
        assert!(!system.contains("Available templates"));
    }

    #[test]
    fn analysis_prompt_marks_truncation() {
        assert!(analysis_prompt("nmap", "22/tcp open", true).contains("[output truncated]"));
        assert!(!analysis_prompt("nmap", "22/tcp open", false).contains("[output truncated]"));
    }
}
