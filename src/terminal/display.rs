use std::io::{self, Write};
use std::path::Path;
use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::core::model::{AnalysisResult, CommandSuggestion, Severity};
use crate::core::orchestrator::{ControlOutcome, StatusReport};
use crate::core::phase::{Phase, PhaseStatus};
use crate::core::risk::RiskReport;
use crate::core::session::SessionSummary;
use crate::core::templates::TemplateEntry;
use crate::core::Resolution;
use crate::utils::title_case;

pub fn setup_terminal() -> Result<()> {
    // Clear screen
    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
    Ok(())
}

pub fn banner(mode: &str, provider: &str) -> Result<()> {
    let mut stdout = io::stdout();

    let art = r"
   ____            _                    _
  / ___|  ___  ___/ \   __ _  ___ _ __ | |_
  \___ \ / _ \/ __/ _ \ / _` |/ _ \ '_ \| __|
   ___) |  __/ (_/ ___ \ (_| |  __/ | | | |_
  |____/ \___|\___/_/   \_\__, |\___|_| |_|\__|
                          |___/
";

    execute!(
        stdout,
        SetForegroundColor(Color::Red),
        Print(art),
        ResetColor,
        Print(format!("\n   [Kill chain assistant | mode: {} | model: {}]\n\n", mode, provider)),
        SetForegroundColor(Color::Yellow),
        Print("   Use only against systems you are authorized to test.\n\n"),
        ResetColor
    )?;
    Ok(())
}

pub fn info(message: &str) -> Result<()> {
    tagged(Color::Green, "[SecAgent]", message)
}

pub fn notice(message: &str) -> Result<()> {
    tagged(Color::Yellow, "[SecAgent]", message)
}

pub fn error(message: &str) -> Result<()> {
    tagged(Color::Red, "[ERROR]", message)
}

fn tagged(color: Color, tag: &str, message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        SetForegroundColor(color),
        Print(format!("{} {}\n", tag, message)),
        ResetColor
    )?;
    Ok(())
}

fn heading(stdout: &mut io::Stdout, title: &str) -> Result<()> {
    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        SetAttribute(Attribute::Bold),
        Print(format!("\n{}\n", title)),
        SetAttribute(Attribute::Reset),
        ResetColor
    )?;
    Ok(())
}

pub fn prompt_label(phase: Phase) -> String {
    format!("[{}] > ", phase)
}

pub fn help() -> Result<()> {
    let mut stdout = io::stdout();
    heading(&mut stdout, "Commands")?;

    let rows = [
        ("help", "Show this help"),
        ("status", "Kill chain progress and session counters"),
        ("templates [phase]", "List command templates for a phase"),
        ("search <query>", "Search templates (current phase first)"),
        ("phase <name>", "Switch to another kill chain phase"),
        ("risk", "Risk score and remediation timeline"),
        ("save", "Write a session snapshot"),
        ("quit | exit | q", "Leave the assistant"),
    ];
    for (command, description) in rows {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print(format!("  {:<20}", command)),
            ResetColor,
            Print(format!("{}\n", description))
        )?;
    }

    execute!(
        stdout,
        Print("\nAnything else is treated as a request, e.g. \"scan ports on example.com\".\n\n")
    )?;
    Ok(())
}

pub fn status(report: &StatusReport) -> Result<()> {
    let mut stdout = io::stdout();
    heading(&mut stdout, "Kill Chain Status")?;

    let target = if report.target.is_empty() { "Not set" } else { report.target.as_str() };
    execute!(
        stdout,
        Print(format!("  Target: {}\n  Session: {}\n\n", target, report.session_id)),
        Print(format!("  {:<24}{:<12}{}\n", "Phase", "Status", "Progress"))
    )?;

    for row in &report.rows {
        let color = match row.status {
            PhaseStatus::Complete => Color::Green,
            PhaseStatus::Current => Color::Yellow,
            PhaseStatus::Pending => Color::DarkGrey,
        };
        execute!(
            stdout,
            Print(format!("  {:<24}", title_case(row.phase.as_str()))),
            SetForegroundColor(color),
            Print(format!("{:<12}", row.status.label())),
            ResetColor,
            Print(format!("{}%\n", row.progress))
        )?;
    }

    execute!(
        stdout,
        Print(format!(
            "\n  Commands: {}  Findings: {}  Vulnerabilities: {}\n\n",
            report.commands, report.findings, report.vulnerabilities
        ))
    )?;
    Ok(())
}

pub fn templates(phase: Phase, entries: &[TemplateEntry]) -> Result<()> {
    let mut stdout = io::stdout();
    heading(&mut stdout, &format!("{} templates", title_case(phase.as_str())))?;
    template_list(&mut stdout, entries)
}

pub fn search_results(query: &str, matches: &[TemplateEntry], total: usize) -> Result<()> {
    let mut stdout = io::stdout();
    if matches.is_empty() {
        return notice(&format!("No templates match '{}'", query));
    }

    heading(&mut stdout, &format!("Templates matching '{}' ({} of {})", query, matches.len(), total))?;
    template_list(&mut stdout, matches)
}

fn template_list(stdout: &mut io::Stdout, entries: &[TemplateEntry]) -> Result<()> {
    for entry in entries {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print(format!("  {}", entry.name)),
            ResetColor,
            Print(format!(" [{}]: {}\n", entry.phase, entry.description)),
            SetForegroundColor(Color::Blue),
            Print(format!("      {}\n", entry.pattern)),
            ResetColor
        )?;
    }
    execute!(stdout, Print("\n"))?;
    Ok(())
}

pub fn suggestion(resolution: &Resolution<CommandSuggestion>, verbose: bool) -> Result<()> {
    let mut stdout = io::stdout();
    let suggestion = resolution.value();

    if let Some(reason) = resolution.fallback_reason() {
        if verbose {
            notice(&format!("Model unavailable ({}); using fallback", reason))?;
        } else {
            notice("Model unavailable; using fallback")?;
        }
    }

    heading(&mut stdout, "Suggested command")?;
    execute!(
        stdout,
        SetForegroundColor(Color::Green),
        SetAttribute(Attribute::Bold),
        Print(format!("  {}\n\n", suggestion.command)),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print(format!("  Explanation: {}\n", suggestion.explanation)),
        Print(format!("  Expected output: {}\n", suggestion.expected_output)),
        Print(format!("  Phase relevance: {}\n", suggestion.phase_relevance)),
        Print(format!("  Template: {}\n", suggestion.template_used)),
        SetForegroundColor(Color::Yellow),
        Print(format!("  Warnings: {}\n", suggestion.warnings)),
        ResetColor
    )?;

    bullet_list(&mut stdout, "Next steps", &suggestion.next_steps)?;
    execute!(stdout, Print("\n"))?;
    Ok(())
}

pub fn analysis(resolution: &Resolution<AnalysisResult>, verbose: bool) -> Result<()> {
    let mut stdout = io::stdout();
    let analysis = resolution.value();

    if let (Some(reason), true) = (resolution.fallback_reason(), verbose) {
        notice(&format!("Automated analysis unavailable ({})", reason))?;
    }

    heading(&mut stdout, "Analysis")?;
    execute!(
        stdout,
        Print(format!("  Summary: {}\n", analysis.summary)),
        Print(format!("  Risk level: {}\n", analysis.risk_level)),
        Print(format!("  Intelligence value: {}\n", analysis.intelligence_value))
    )?;

    bullet_list(&mut stdout, "Findings", &analysis.findings)?;

    if !analysis.vulnerabilities.is_empty() {
        execute!(stdout, Print("  Vulnerabilities:\n"))?;
        for vuln in &analysis.vulnerabilities {
            execute!(
                stdout,
                SetForegroundColor(severity_color(vuln.severity)),
                Print(format!("    [{}] ", vuln.severity.as_str())),
                ResetColor,
                Print(format!("{}", vuln.kind)),
                Print(if vuln.description.is_empty() {
                    "\n".to_string()
                } else {
                    format!(": {}\n", vuln.description)
                })
            )?;
        }
    }

    bullet_list(&mut stdout, "Attack vectors", &analysis.attack_vectors)?;
    bullet_list(&mut stdout, "Next steps", &analysis.next_steps)?;
    bullet_list(&mut stdout, "Recommended commands", &analysis.recommended_commands)?;
    execute!(stdout, Print("\n"))?;
    Ok(())
}

fn bullet_list(stdout: &mut io::Stdout, title: &str, items: &[String]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    execute!(stdout, Print(format!("  {}:\n", title)))?;
    for item in items {
        execute!(stdout, Print(format!("    - {}\n", item)))?;
    }
    Ok(())
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Magenta,
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Info => Color::DarkGrey,
    }
}

pub fn risk_report(report: &RiskReport) -> Result<()> {
    let mut stdout = io::stdout();
    let assessment = &report.assessment;

    heading(&mut stdout, "Risk Assessment")?;
    execute!(
        stdout,
        Print(format!(
            "  Score: {:.1}  Level: {}  Vulnerabilities: {}\n",
            assessment.total_score, assessment.risk_level, assessment.total_vulnerabilities
        ))
    )?;

    for (severity, count) in &assessment.severity_breakdown {
        if *count > 0 {
            execute!(
                stdout,
                SetForegroundColor(severity_color(*severity)),
                Print(format!("    {:<10}", severity.as_str())),
                ResetColor,
                Print(format!("{}\n", count))
            )?;
        }
    }

    if report.timeline.is_empty() {
        execute!(stdout, Print("\n  No vulnerabilities recorded yet.\n\n"))?;
        return Ok(());
    }

    heading(&mut stdout, "Remediation Timeline")?;
    for window in &report.timeline {
        execute!(
            stdout,
            SetForegroundColor(severity_color(window.priority)),
            Print(format!("  {}", window.window)),
            ResetColor,
            Print(format!(" - {} {} issue(s)\n", window.vulnerabilities, window.priority.as_str()))
        )?;
        for action in &window.actions {
            execute!(stdout, Print(format!("    - {}\n", action)))?;
        }
    }
    execute!(stdout, Print("\n"))?;
    Ok(())
}

pub fn saved(path: &Path) -> Result<()> {
    info(&format!("Session saved to {}", path.display()))
}

pub fn summary(summary: &SessionSummary) -> Result<()> {
    let mut stdout = io::stdout();
    heading(&mut stdout, "Session Summary")?;

    let phases = summary.phases_touched
        .iter()
        .map(|phase| phase.as_str())
        .collect::<Vec<&str>>()
        .join(", ");

    execute!(
        stdout,
        Print(format!("  Target: {}\n", summary.target)),
        Print(format!("  Final phase: {}\n", summary.final_phase)),
        Print(format!("  Commands: {}\n", summary.total_commands)),
        Print(format!("  Findings: {}\n", summary.findings)),
        Print(format!("  Vulnerabilities: {}\n", summary.vulnerabilities_found)),
        Print(format!("  Phases analyzed: {}\n\n", if phases.is_empty() { "none" } else { phases.as_str() }))
    )?;
    stdout.flush()?;
    Ok(())
}

/// Render the result of a control command. Returns `false` on quit.
pub fn control_outcome(outcome: &ControlOutcome) -> Result<bool> {
    match outcome {
        ControlOutcome::Help => help()?,
        ControlOutcome::Status(report) => status(report)?,
        ControlOutcome::Templates { phase, entries } => templates(*phase, entries)?,
        ControlOutcome::Search { query, matches, total } => search_results(query, matches, *total)?,
        ControlOutcome::Saved(path) => saved(path)?,
        ControlOutcome::SaveFailed(message) => error(&format!("Failed to save session: {}", message))?,
        ControlOutcome::PhaseChanged { phase, templates: entries } => {
            info(&format!("Switched to {} phase: {}", phase, phase.description()))?;
            templates(*phase, entries)?;
        }
        ControlOutcome::Rejected(e) => error(&e.to_string())?,
        ControlOutcome::Risk(report) => risk_report(report)?,
        ControlOutcome::Usage(usage) => notice(&format!("Usage: {}", usage))?,
        ControlOutcome::Quit => return Ok(false),
    }
    Ok(true)
}
