use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// One stage of the seven-step kill chain. Declaration order is chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reconnaissance,
    Weaponization,
    Delivery,
    Exploitation,
    Installation,
    CommandControl,
    ActionsObjectives,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Reconnaissance,
        Phase::Weaponization,
        Phase::Delivery,
        Phase::Exploitation,
        Phase::Installation,
        Phase::CommandControl,
        Phase::ActionsObjectives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reconnaissance => "reconnaissance",
            Phase::Weaponization => "weaponization",
            Phase::Delivery => "delivery",
            Phase::Exploitation => "exploitation",
            Phase::Installation => "installation",
            Phase::CommandControl => "command_control",
            Phase::ActionsObjectives => "actions_objectives",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::Reconnaissance => "Gathering information about the target",
            Phase::Weaponization => "Creating and preparing attack tools/payloads",
            Phase::Delivery => "Delivering the weaponized payload to the target",
            Phase::Exploitation => "Exploiting vulnerabilities to gain access",
            Phase::Installation => "Installing persistent access mechanisms",
            Phase::CommandControl => "Establishing command and control channels",
            Phase::ActionsObjectives => "Achieving the final objectives",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The names accepted by `FromStr`, in chain order.
    pub fn names() -> Vec<&'static str> {
        Phase::ALL.iter().map(|phase| phase.as_str()).collect()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PipelineError;

    /// Case-insensitive; spaces and dashes are read as underscores so
    /// `Command Control` and `command-control` both resolve.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == normalized)
            .ok_or_else(|| PipelineError::InvalidPhase {
                name: name.trim().to_string(),
                valid: Phase::names().join(", "),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Complete,
    Current,
    Pending,
}

impl PhaseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseStatus::Complete => "COMPLETE",
            PhaseStatus::Current => "CURRENT",
            PhaseStatus::Pending => "PENDING",
        }
    }
}

/// Holds the current kill-chain stage.
///
/// Navigation is free: an explicit switch may move forward or backward.
/// Statuses are derived from index order only, so moving back marks later
/// phases pending again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseMachine {
    current: Phase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(Phase::Reconnaissance)
    }
}

impl PhaseMachine {
    pub fn new(start: Phase) -> Self {
        Self { current: start }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Move to the named phase. Unknown names leave the state untouched.
    pub fn transition_to(&mut self, name: &str) -> Result<Phase, PipelineError> {
        let phase = name.parse::<Phase>()?;
        self.set(phase);
        Ok(phase)
    }

    pub fn set(&mut self, phase: Phase) {
        if phase != self.current {
            log::info!("Phase changed: {} -> {}", self.current, phase);
        }
        self.current = phase;
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        match phase.index().cmp(&self.current.index()) {
            std::cmp::Ordering::Less => PhaseStatus::Complete,
            std::cmp::Ordering::Equal => PhaseStatus::Current,
            std::cmp::Ordering::Greater => PhaseStatus::Pending,
        }
    }
}
