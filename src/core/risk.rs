use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};

use super::model::{Severity, Vulnerability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Minimal,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 50.0 {
            RiskLevel::Critical
        } else if score >= 30.0 {
            RiskLevel::High
        } else if score >= 15.0 {
            RiskLevel::Medium
        } else if score >= 5.0 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Minimal => "Minimal",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub total_score: f64,
    pub risk_level: RiskLevel,
    pub severity_breakdown: BTreeMap<Severity, usize>,
    pub total_vulnerabilities: usize,
}

/// One remediation window of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationWindow {
    pub window: String,
    pub priority: Severity,
    pub vulnerabilities: usize,
    pub actions: Vec<String>,
}

pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 10.0,
        Severity::High => 7.0,
        Severity::Medium => 4.0,
        Severity::Low => 1.0,
        Severity::Info => 0.5,
    }
}

/// Deterministic severity rollup of a vulnerability list.
pub fn assess(vulnerabilities: &[Vulnerability]) -> RiskAssessment {
    let mut severity_breakdown: BTreeMap<Severity, usize> =
        Severity::ALL.iter().map(|severity| (*severity, 0)).collect();
    let mut total_score = 0.0;

    for vuln in vulnerabilities {
        *severity_breakdown.entry(vuln.severity).or_insert(0) += 1;
        total_score += severity_weight(vuln.severity);
    }

    RiskAssessment {
        total_score,
        risk_level: RiskLevel::from_score(total_score),
        severity_breakdown,
        total_vulnerabilities: vulnerabilities.len(),
    }
}

// Info findings get no window
const WINDOWS: [(Severity, &str, [&str; 4]); 4] = [
    (Severity::Critical, "Immediate (0–7 days)", [
        "Address all critical vulnerabilities immediately",
        "Implement emergency patches",
        "Consider taking affected systems offline if necessary",
        "Notify stakeholders and incident response team",
    ]),
    (Severity::High, "Short-term (1–4 weeks)", [
        "Patch high-severity vulnerabilities",
        "Implement additional security controls",
        "Update security policies and procedures",
        "Conduct security awareness training",
    ]),
    (Severity::Medium, "Medium-term (1–3 months)", [
        "Address medium-severity vulnerabilities",
        "Implement defense-in-depth strategies",
        "Review and update security architecture",
        "Enhance monitoring and detection capabilities",
    ]),
    (Severity::Low, "Long-term (3–6 months)", [
        "Address remaining low-severity issues",
        "Implement security best practices",
        "Conduct regular security assessments",
        "Maintain security hygiene",
    ]),
];

/// Partition vulnerabilities into fixed remediation windows, most urgent
/// first. Empty windows are left out.
pub fn remediation_timeline(vulnerabilities: &[Vulnerability]) -> Vec<RemediationWindow> {
    WINDOWS
        .iter()
        .filter_map(|(severity, window, actions)| {
            let count = vulnerabilities.iter().filter(|v| v.severity == *severity).count();
            if count == 0 {
                return None;
            }

            Some(RemediationWindow {
                window: window.to_string(),
                priority: *severity,
                vulnerabilities: count,
                actions: actions.iter().map(|a| a.to_string()).collect(),
            })
        })
        .collect()
}

/// Assessment and timeline together, as the `risk` command shows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub assessment: RiskAssessment,
    pub timeline: Vec<RemediationWindow>,
}

pub fn report(vulnerabilities: &[Vulnerability]) -> RiskReport {
    RiskReport {
        assessment: assess(vulnerabilities),
        timeline: remediation_timeline(vulnerabilities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vulns(severities: &[Severity]) -> Vec<Vulnerability> {
        severities.iter().map(|s| Vulnerability::new("test", *s)).collect()
    }

    #[test]
    fn three_high_and_one_critical_is_high_risk() {
        use Severity::*;
        let assessment = assess(&vulns(&[High, High, High, Critical]));

        assert_eq!(assessment.total_score, 31.0);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.total_vulnerabilities, 4);
        assert_eq!(assessment.severity_breakdown[&High], 3);
        assert_eq!(assessment.severity_breakdown[&Info], 0);
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(49.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(15.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(5.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(4.5), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Minimal);
    }

    #[test]
    fn info_counts_half_a_point() {
        let assessment = assess(&vulns(&[Severity::Info, Severity::Info, Severity::Low]));
        assert_eq!(assessment.total_score, 2.0);
        assert_eq!(assessment.risk_level, RiskLevel::Minimal);
    }

    #[test]
    fn empty_list_is_minimal() {
        let report = report(&[]);
        assert_eq!(report.assessment.total_score, 0.0);
        assert_eq!(report.assessment.risk_level, RiskLevel::Minimal);
        assert!(report.timeline.is_empty());
    }

    #[test]
    fn timeline_skips_empty_windows_and_keeps_order() {
        use Severity::*;
        let timeline = remediation_timeline(&vulns(&[Low, Critical, Low, Info, Critical, Critical]));

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].window, "Immediate (0–7 days)");
        assert_eq!(timeline[0].priority, Critical);
        assert_eq!(timeline[0].vulnerabilities, 3);
        assert_eq!(timeline[1].window, "Long-term (3–6 months)");
        assert_eq!(timeline[1].vulnerabilities, 2);
        assert_eq!(timeline[1].actions.len(), 4);
    }
}
