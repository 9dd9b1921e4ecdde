use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;

use crate::ai::LlmClient;

use super::analyzer::OutputAnalyzer;
use super::control::ControlCommand;
use super::error::{PipelineError, Resolution};
use super::generator::CommandGenerator;
use super::model::{AnalysisResult, CommandSuggestion};
use super::options::{PipelineOptions, SEARCH_RESULT_LIMIT};
use super::phase::{Phase, PhaseStatus};
use super::risk::{self, RiskReport};
use super::session::SessionStore;
use super::templates::{TemplateCatalog, TemplateEntry};

/// One row of the status table.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRow {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub progress: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub target: String,
    pub session_id: String,
    pub rows: Vec<PhaseRow>,
    pub commands: usize,
    pub findings: usize,
    pub vulnerabilities: usize,
}

/// What a control command produced, for the terminal to render.
#[derive(Debug)]
pub enum ControlOutcome {
    Help,
    Status(StatusReport),
    Templates { phase: Phase, entries: Vec<TemplateEntry> },
    Search { query: String, matches: Vec<TemplateEntry>, total: usize },
    Saved(PathBuf),
    SaveFailed(String),
    PhaseChanged { phase: Phase, templates: Vec<TemplateEntry> },
    Rejected(PipelineError),
    Risk(RiskReport),
    Usage(&'static str),
    Quit,
}

/// The single orchestration core behind every assistant mode.
pub struct Assistant {
    catalog: Arc<TemplateCatalog>,
    generator: CommandGenerator,
    analyzer: OutputAnalyzer,
    store: SessionStore,
    options: PipelineOptions,
    session_dir: PathBuf,
}

impl Assistant {
    pub fn new(
        client: Arc<dyn LlmClient>,
        store: SessionStore,
        options: PipelineOptions,
        placeholders: HashMap<String, String>,
        session_dir: &Path,
    ) -> Self {
        let catalog = Arc::new(TemplateCatalog::builtin());

        Self {
            generator: CommandGenerator::new(catalog.clone(), client.clone(), options.clone(), placeholders),
            analyzer: OutputAnalyzer::new(client, options.clone()),
            catalog,
            store,
            options,
            session_dir: session_dir.to_path_buf(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn current_phase(&self) -> Phase {
        self.store.current_phase()
    }

    pub async fn suggest(&self, request: &str) -> Resolution<CommandSuggestion> {
        self.generator
            .generate(request, self.store.current_phase(), self.store.target())
            .await
    }

    /// Record an executed command and analyze its output. Blank output is
    /// ignored entirely.
    pub async fn ingest(
        &mut self,
        request: &str,
        suggestion: &CommandSuggestion,
        output: &str,
    ) -> Option<Resolution<AnalysisResult>> {
        if output.trim().is_empty() {
            return None;
        }

        self.store.record_command(request, suggestion, output);
        self.analyzer.analyze(&mut self.store, &suggestion.command, output).await
    }

    /// Apply a confirmed advancement proposal.
    pub fn advance_to(&mut self, phase: Phase) {
        self.store.phase_mut().set(phase);
    }

    pub fn switch_phase(&mut self, name: &str) -> Result<Phase, PipelineError> {
        self.store.phase_mut().transition_to(name)
    }

    pub fn status(&self) -> StatusReport {
        let machine = self.store.phase();
        let record = self.store.record();

        StatusReport {
            target: record.target.clone(),
            session_id: record.session_id.clone(),
            rows: Phase::ALL
                .iter()
                .map(|&phase| PhaseRow {
                    phase,
                    status: machine.status(phase),
                    progress: self.store.phase_progress(phase),
                })
                .collect(),
            commands: record.command_history.len(),
            findings: record.findings.len(),
            vulnerabilities: record.vulnerabilities.len(),
        }
    }

    /// Up to five matches: the current phase first, then the whole catalog.
    pub fn search(&self, query: &str) -> (Vec<TemplateEntry>, usize) {
        let mut matches = self.catalog.search(query, Some(self.current_phase()));
        if matches.is_empty() {
            matches = self.catalog.search(query, None);
        }

        let total = matches.len();
        let shown = matches.into_iter().take(SEARCH_RESULT_LIMIT).cloned().collect();
        (shown, total)
    }

    pub fn risk_report(&self) -> RiskReport {
        risk::report(self.store.vulnerabilities())
    }

    pub fn save(&self) -> Result<PathBuf> {
        self.store.save_to(&self.session_dir)
    }

    pub fn execute(&mut self, command: ControlCommand) -> ControlOutcome {
        match command {
            ControlCommand::Help => ControlOutcome::Help,
            ControlCommand::Status => ControlOutcome::Status(self.status()),
            ControlCommand::Templates(name) => {
                let phase = match name {
                    Some(name) => match name.parse::<Phase>() {
                        Ok(phase) => phase,
                        Err(e) => return ControlOutcome::Rejected(e),
                    },
                    None => self.current_phase(),
                };
                ControlOutcome::Templates { phase, entries: self.phase_templates(phase) }
            }
            ControlCommand::Search(query) if query.trim().is_empty() => ControlOutcome::Usage("search <query>"),
            ControlCommand::Search(query) => {
                let (matches, total) = self.search(&query);
                ControlOutcome::Search { query, matches, total }
            }
            ControlCommand::Save => match self.save() {
                Ok(path) => ControlOutcome::Saved(path),
                Err(e) => ControlOutcome::SaveFailed(format!("{:#}", e)),
            },
            ControlCommand::Phase(name) if name.trim().is_empty() => ControlOutcome::Usage("phase <name>"),
            ControlCommand::Phase(name) => match self.switch_phase(&name) {
                Ok(phase) => ControlOutcome::PhaseChanged { phase, templates: self.phase_templates(phase) },
                Err(e) => ControlOutcome::Rejected(e),
            },
            ControlCommand::Risk => ControlOutcome::Risk(self.risk_report()),
            ControlCommand::Quit => ControlOutcome::Quit,
        }
    }

    fn phase_templates(&self, phase: Phase) -> Vec<TemplateEntry> {
        self.catalog.templates_for(phase).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::OfflineClient;

    fn assistant(dir: &Path) -> Assistant {
        Assistant::new(
            Arc::new(OfflineClient::new("none")),
            SessionStore::new("example.com"),
            PipelineOptions::default(),
            HashMap::new(),
            dir,
        )
    }

    #[test]
    fn invalid_phase_is_rejected_without_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut assistant = assistant(dir.path());

        let outcome = assistant.execute(ControlCommand::Phase("lateral".to_string()));
        match outcome {
            ControlOutcome::Rejected(PipelineError::InvalidPhase { name, valid }) => {
                assert_eq!(name, "lateral");
                assert!(valid.contains("command_control"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(assistant.current_phase(), Phase::Reconnaissance);
    }

    #[test]
    fn phase_switch_lists_new_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut assistant = assistant(dir.path());

        match assistant.execute(ControlCommand::Phase("Command Control".to_string())) {
            ControlOutcome::PhaseChanged { phase, templates } => {
                assert_eq!(phase, Phase::CommandControl);
                assert!(templates.iter().all(|t| t.phase == Phase::CommandControl));
                assert!(!templates.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let status = assistant.status();
        assert_eq!(status.rows[0].status, PhaseStatus::Complete);
        assert_eq!(status.rows[5].status, PhaseStatus::Current);
        assert_eq!(status.rows[6].status, PhaseStatus::Pending);
    }

    #[test]
    fn search_prefers_current_phase_and_caps_results() {
        let dir = tempfile::tempdir().unwrap();
        let assistant = assistant(dir.path());

        let (matches, total) = assistant.search("nmap");
        assert!(matches.len() <= SEARCH_RESULT_LIMIT);
        assert!(total >= matches.len());
        assert!(matches.iter().all(|t| t.phase == Phase::Reconnaissance));

        let (elsewhere, _) = assistant.search("msfvenom");
        assert_eq!(elsewhere[0].phase, Phase::Weaponization);
    }

    #[test]
    fn save_writes_into_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut assistant = assistant(dir.path());

        match assistant.execute(ControlCommand::Save) {
            ControlOutcome::Saved(path) => {
                assert!(path.starts_with(dir.path()));
                assert!(path.exists());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_output_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut assistant = assistant(dir.path());

        let suggestion = assistant.suggest("scan ports").await.into_value();
        assert!(assistant.ingest("scan ports", &suggestion, "\n\n").await.is_none());
        assert!(assistant.store().command_history().is_empty());
    }
}
