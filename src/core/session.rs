use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{AnalysisResult, CommandSuggestion, Vulnerability};
use super::phase::{Phase, PhaseMachine};
use crate::utils::ensure_directory;

/// One suggested command together with the output the operator pasted back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub user_request: String,
    pub command: String,
    pub output: String,
    pub template_used: String,
}

/// Analysis snapshot stored under a phase, keyed by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub command: String,
    pub analysis: AnalysisResult,
    pub intelligence_value: String,
}

/// The accumulated state of one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default = "new_session_id")]
    pub session_id: String,
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    pub target: String,
    #[serde(rename = "current_phase")]
    pub phase: PhaseMachine,
    #[serde(default)]
    pub command_history: Vec<CommandRecord>,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default)]
    pub phase_data: BTreeMap<Phase, BTreeMap<String, PhaseEntry>>,
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Counts derived at save time; ignored on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_commands: usize,
    pub vulnerabilities_found: usize,
    pub findings: usize,
    pub phases_touched: Vec<Phase>,
    pub target: String,
    pub final_phase: Phase,
}

/// On-disk form: the record plus its summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub record: SessionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_summary: Option<SessionSummary>,
}

/// Append-only accumulation of one session's history and results.
///
/// History, findings and vulnerabilities only ever grow; the current phase is
/// the one field that changes in place.
#[derive(Debug, Clone)]
pub struct SessionStore {
    record: SessionRecord,
}

impl SessionStore {
    pub fn new(target: &str) -> Self {
        Self {
            record: SessionRecord {
                session_id: new_session_id(),
                started_at: Utc::now(),
                target: target.trim().to_string(),
                phase: PhaseMachine::default(),
                command_history: Vec::new(),
                findings: Vec::new(),
                vulnerabilities: Vec::new(),
                phase_data: BTreeMap::new(),
            },
        }
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn target(&self) -> Option<&str> {
        Some(self.record.target.as_str()).filter(|t| !t.is_empty())
    }

    pub fn phase(&self) -> &PhaseMachine {
        &self.record.phase
    }

    pub fn phase_mut(&mut self) -> &mut PhaseMachine {
        &mut self.record.phase
    }

    pub fn current_phase(&self) -> Phase {
        self.record.phase.current()
    }

    pub fn command_history(&self) -> &[CommandRecord] {
        &self.record.command_history
    }

    pub fn findings(&self) -> &[String] {
        &self.record.findings
    }

    pub fn vulnerabilities(&self) -> &[Vulnerability] {
        &self.record.vulnerabilities
    }

    pub fn phase_entries(&self, phase: Phase) -> usize {
        self.record.phase_data.get(&phase).map_or(0, |entries| entries.len())
    }

    pub fn record_command(&mut self, user_request: &str, suggestion: &CommandSuggestion, output: &str) {
        self.record.command_history.push(CommandRecord {
            timestamp: Utc::now(),
            phase: self.current_phase(),
            user_request: user_request.to_string(),
            command: suggestion.command.clone(),
            output: output.to_string(),
            template_used: suggestion.template_used.clone(),
        });
    }

    /// Append the analysis' findings and vulnerabilities and file a snapshot
    /// under the current phase.
    pub fn record_analysis(&mut self, command: &str, analysis: &AnalysisResult) {
        self.record.findings.extend(analysis.findings.iter().cloned());
        self.record.vulnerabilities.extend(analysis.vulnerabilities.iter().cloned());
        self.file_phase_entry(command, analysis);
    }

    /// File a snapshot without touching findings or vulnerabilities. Used
    /// for fallback analyses, whose synthetic content is not a discovery.
    pub fn file_phase_entry(&mut self, command: &str, analysis: &AnalysisResult) {
        let phase = self.current_phase();
        let entries = self.record.phase_data.entry(phase).or_default();

        let base = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let mut key = base.clone();
        let mut suffix = 1;
        while entries.contains_key(&key) {
            key = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        entries.insert(key, PhaseEntry {
            command: command.to_string(),
            analysis: analysis.clone(),
            intelligence_value: analysis.intelligence_value.clone(),
        });
    }

    /// Progress shown in the status view: 20% per filed analysis, capped.
    pub fn phase_progress(&self, phase: Phase) -> usize {
        (self.phase_entries(phase) * 20).min(100)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            total_commands: self.record.command_history.len(),
            vulnerabilities_found: self.record.vulnerabilities.len(),
            findings: self.record.findings.len(),
            phases_touched: self.record.phase_data
                .iter()
                .filter(|(_, entries)| !entries.is_empty())
                .map(|(phase, _)| *phase)
                .collect(),
            target: self.record.target.clone(),
            final_phase: self.current_phase(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            record: self.record.clone(),
            session_summary: Some(self.summary()),
        }
    }

    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self { record: snapshot.record }
    }

    pub fn snapshot_file_name(at: DateTime<chrono::Local>) -> String {
        format!("secagent_session_{}.json", at.format("%Y%m%d_%H%M%S"))
    }

    /// Write a snapshot into `dir` and return its path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        ensure_directory(dir)?;
        let path = dir.join(Self::snapshot_file_name(chrono::Local::now()));

        let content = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write session snapshot {}", path.display()))?;

        log::info!("Session saved to {}", path.display());
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session snapshot {}", path.display()))?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Invalid session snapshot {}", path.display()))?;

        Ok(Self::restore(snapshot))
    }
}
