use std::sync::Arc;
use log::{debug, warn};

use crate::ai::{prompts, LlmClient};
use crate::utils::truncate_chars;

use super::error::{PipelineError, Resolution};
use super::extract::extract_as;
use super::model::{AnalysisResult, RawAnalysis};
use super::options::PipelineOptions;
use super::request::query_bounded;
use super::session::SessionStore;

/// Interprets pasted command output and files the result in the session.
pub struct OutputAnalyzer {
    client: Arc<dyn LlmClient>,
    options: PipelineOptions,
}

impl OutputAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, options: PipelineOptions) -> Self {
        Self { client, options }
    }

    /// Analyze `output` of `command` in the store's current phase.
    ///
    /// Blank output returns `None` and leaves the store untouched. A parsed
    /// analysis appends its findings and vulnerabilities; a fallback only
    /// files a phase entry.
    pub async fn analyze(
        &self,
        store: &mut SessionStore,
        command: &str,
        output: &str,
    ) -> Option<Resolution<AnalysisResult>> {
        if output.trim().is_empty() {
            debug!("Skipping analysis of empty output for '{}'", command);
            return None;
        }

        let phase = store.current_phase();
        let sent = truncate_chars(output, self.options.output_limit);
        let truncated = sent.len() < output.len();
        if truncated {
            debug!("Output truncated to {} characters for analysis", self.options.output_limit);
        }

        let system_prompt = prompts::analysis_system_prompt(phase, store.target(), command);
        let prompt = prompts::analysis_prompt(command, sent, truncated);

        let parsed = match query_bounded(self.client.as_ref(), &prompt, &system_prompt, &self.options).await {
            Ok(response) => extract_as::<RawAnalysis>(&response).map(|raw| raw.resolve(phase)),
            Err(e) => Err(PipelineError::from(e)),
        };

        let resolution = match parsed {
            Ok(analysis) => {
                store.record_analysis(command, &analysis);
                Resolution::Parsed(analysis)
            }
            Err(reason) => {
                warn!("Output analysis fell back: {}", reason);
                let analysis = AnalysisResult::neutral(output, phase, &reason.to_string());
                store.file_phase_entry(command, &analysis);
                Resolution::Fallback { value: analysis, reason }
            }
        };

        Some(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{LlmError, OfflineClient};
    use crate::core::model::Severity;
    use crate::core::phase::Phase;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClient {
        response: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn query(&self, prompt: &str, _: Option<&str>, _: Option<&str>) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn recording(response: &'static str) -> Arc<RecordingClient> {
        Arc::new(RecordingClient { response, prompts: Mutex::new(Vec::new()) })
    }

    #[tokio::test]
    async fn empty_output_changes_nothing() {
        let analyzer = OutputAnalyzer::new(recording("{}"), PipelineOptions::default());
        let mut store = SessionStore::new("example.com");

        assert!(analyzer.analyze(&mut store, "nmap", "  \n\t").await.is_none());
        assert!(store.findings().is_empty());
        assert_eq!(store.phase_entries(Phase::Reconnaissance), 0);
    }

    #[tokio::test]
    async fn parsed_analysis_is_recorded() {
        let client = recording(
            r#"Here you go: {"findings": ["22/tcp open ssh"],
               "vulnerabilities": [{"type": "Weak SSH", "severity": "High"}],
               "advance_phase": true, "next_phase": "weaponization"}"#,
        );
        let analyzer = OutputAnalyzer::new(client, PipelineOptions::default());
        let mut store = SessionStore::new("example.com");

        let result = analyzer.analyze(&mut store, "nmap -sS -sV example.com", "22/tcp open ssh").await.unwrap();
        assert!(!result.is_fallback());
        assert!(result.value().proposes_advance(Phase::Reconnaissance));

        assert_eq!(store.findings(), ["22/tcp open ssh".to_string()]);
        assert_eq!(store.vulnerabilities()[0].severity, Severity::High);
        assert_eq!(store.phase_entries(Phase::Reconnaissance), 1);
        assert_eq!(store.current_phase(), Phase::Reconnaissance);
    }

    #[tokio::test]
    async fn failed_model_files_neutral_entry_only() {
        let analyzer = OutputAnalyzer::new(Arc::new(OfflineClient::new("none")), PipelineOptions::default());
        let mut store = SessionStore::new("example.com");

        let result = analyzer.analyze(&mut store, "whois example.com", "Registrar: X").await.unwrap();
        assert!(result.is_fallback());
        assert_eq!(result.value().findings, ["Command output received (12 bytes)".to_string()]);
        assert!(!result.value().advance_phase);

        assert!(store.findings().is_empty());
        assert!(store.vulnerabilities().is_empty());
        assert_eq!(store.phase_entries(Phase::Reconnaissance), 1);
    }

    #[tokio::test]
    async fn long_output_is_cut_to_the_limit() {
        let client = recording("{}");
        let options = PipelineOptions { output_limit: 10, ..PipelineOptions::default() };
        let analyzer = OutputAnalyzer::new(client.clone(), options);
        let mut store = SessionStore::new("example.com");

        analyzer.analyze(&mut store, "cat log", &"x".repeat(50)).await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains(&format!("{}\n[output truncated]", "x".repeat(10))));
        assert!(!prompts[0].contains(&"x".repeat(11)));
    }
}
