use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use secagent::ai::{LlmClient, LlmError};
use secagent::core::risk::RiskLevel;
use secagent::core::{
    Assistant, ControlCommand, ControlOutcome, Phase, PipelineError, PipelineOptions, SessionStore, Severity,
};

/// Replays canned responses in order; runs dry with a provider error.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn query(&self, _prompt: &str, _system: Option<&str>, _model: Option<&str>) -> Result<String, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ErrorText("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn assistant(client: Arc<ScriptedClient>, dir: &Path) -> Assistant {
    Assistant::new(
        client,
        SessionStore::new("example.com"),
        PipelineOptions::default(),
        HashMap::new(),
        dir,
    )
}

#[tokio::test]
async fn provider_failure_falls_back_to_port_scan_template() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![Err(LlmError::Api {
        provider: "openai".to_string(),
        status: 500,
        message: "internal error".to_string(),
    })]);
    let assistant = assistant(client, dir.path());

    let resolution = assistant.suggest("scan ports on example.com").await;
    assert!(matches!(resolution.fallback_reason(), Some(PipelineError::Llm(_))));

    let suggestion = resolution.value();
    assert_eq!(suggestion.command, "nmap -sS -sV example.com");
    assert_eq!(suggestion.template_used, "port_scan_basic");
}

#[tokio::test]
async fn error_tagged_text_is_treated_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![Ok("Error querying LLM: rate limited".to_string())]);
    let assistant = assistant(client, dir.path());

    let resolution = assistant.suggest("scan ports").await;
    assert!(resolution.is_fallback());
    assert_eq!(resolution.value().command, "nmap -sS -sV example.com");
}

#[tokio::test]
async fn suggestion_is_extracted_from_surrounding_prose() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![Ok(
        "Sure! Here is the command: {\"command\": \"nmap -sV example.com\", \"explanation\": \"x\"} Let me know.".to_string(),
    )]);
    let assistant = assistant(client, dir.path());

    let resolution = assistant.suggest("fingerprint services").await;
    assert!(!resolution.is_fallback());
    assert_eq!(resolution.value().command, "nmap -sV example.com");
    assert_eq!(resolution.value().explanation, "x");
}

#[tokio::test]
async fn analyses_accumulate_vulnerabilities_and_feed_risk() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![
        Ok(r#"{"command": "nmap -sS -sV example.com"}"#.to_string()),
        Ok(r#"{"findings": ["ssh open"], "vulnerabilities": [{"type": "Old OpenSSH", "severity": "High"}]}"#.to_string()),
        Ok(r#"{"command": "nikto -h http://example.com"}"#.to_string()),
        Ok(r#"{"findings": ["admin panel"], "vulnerabilities": [{"type": "Exposed admin", "severity": "critical"}],
               "advance_phase": true, "next_phase": "weaponization"}"#.to_string()),
    ]);
    let mut assistant = assistant(client, dir.path());

    let first = assistant.suggest("scan ports").await.into_value();
    let analysis = assistant.ingest("scan ports", &first, "22/tcp open ssh OpenSSH 7.2").await.unwrap();
    assert!(!analysis.is_fallback());

    let second = assistant.suggest("scan the web server").await.into_value();
    let analysis = assistant.ingest("scan the web server", &second, "+ /admin/ found").await.unwrap();
    assert!(analysis.value().proposes_advance(Phase::Reconnaissance));

    let store = assistant.store();
    assert_eq!(store.vulnerabilities().len(), 2);
    assert_eq!(store.findings().len(), 2);
    assert_eq!(store.command_history().len(), 2);
    assert_eq!(store.phase_progress(Phase::Reconnaissance), 40);

    // Advancement needs an explicit confirmation
    assert_eq!(assistant.current_phase(), Phase::Reconnaissance);

    let report = assistant.risk_report();
    assert_eq!(report.assessment.total_score, 17.0);
    assert_eq!(report.assessment.risk_level, RiskLevel::Medium);
    assert_eq!(report.timeline[0].priority, Severity::Critical);
    assert_eq!(report.timeline[1].priority, Severity::High);
}

#[tokio::test]
async fn empty_output_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![]);
    let mut assistant = assistant(client, dir.path());

    let suggestion = assistant.suggest("scan ports").await.into_value();
    assert!(assistant.ingest("scan ports", &suggestion, "   ").await.is_none());

    let summary = assistant.store().summary();
    assert_eq!(summary.total_commands, 0);
    assert_eq!(summary.findings, 0);
    assert!(summary.phases_touched.is_empty());
}

#[tokio::test]
async fn unparseable_analysis_files_a_neutral_entry() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![
        Ok("I cannot produce JSON today".to_string()),
        Ok("still no JSON".to_string()),
    ]);
    let mut assistant = assistant(client, dir.path());

    let suggestion = assistant.suggest("whois lookup").await.into_value();
    assert_eq!(suggestion.template_used, "whois_lookup");

    let analysis = assistant.ingest("whois lookup", &suggestion, "Registrar: Example").await.unwrap();
    assert!(matches!(analysis.fallback_reason(), Some(PipelineError::MalformedResponse(_))));
    assert_eq!(analysis.value().risk_level, "Unknown");

    let store = assistant.store();
    assert!(store.vulnerabilities().is_empty());
    assert_eq!(store.command_history().len(), 1);
    assert_eq!(store.phase_entries(Phase::Reconnaissance), 1);
}

#[test]
fn invalid_phase_name_keeps_current_phase() {
    let dir = tempfile::tempdir().unwrap();
    let mut assistant = assistant(ScriptedClient::new(vec![]), dir.path());

    assert!(matches!(
        assistant.execute(ControlCommand::Phase("pivoting".to_string())),
        ControlOutcome::Rejected(PipelineError::InvalidPhase { .. })
    ));
    assert_eq!(assistant.current_phase(), Phase::Reconnaissance);

    assert!(matches!(
        assistant.execute(ControlCommand::Phase("exploitation".to_string())),
        ControlOutcome::PhaseChanged { phase: Phase::Exploitation, .. }
    ));
}

#[tokio::test]
async fn saved_session_resumes_with_identical_state() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new(vec![
        Ok(r#"{"command": "nmap -sS -sV example.com"}"#.to_string()),
        Ok(r#"{"findings": ["ssh open"], "vulnerabilities": [{"type": "Weak cipher", "severity": "Low"}]}"#.to_string()),
    ]);
    let mut assistant = assistant(client, dir.path());

    let suggestion = assistant.suggest("scan ports").await.into_value();
    assistant.ingest("scan ports", &suggestion, "22/tcp open ssh").await.unwrap();
    assistant.execute(ControlCommand::Phase("delivery".to_string()));

    let path = match assistant.execute(ControlCommand::Save) {
        ControlOutcome::Saved(path) => path,
        other => panic!("save failed: {:?}", other),
    };

    let restored = SessionStore::load(&path).unwrap();
    let original = assistant.store();
    assert_eq!(restored.record().session_id, original.record().session_id);
    assert_eq!(restored.current_phase(), Phase::Delivery);
    assert_eq!(restored.vulnerabilities(), original.vulnerabilities());
    assert_eq!(restored.findings(), original.findings());
    assert_eq!(restored.command_history().len(), 1);
    assert_eq!(restored.phase_entries(Phase::Reconnaissance), 1);
}
