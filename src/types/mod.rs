pub mod pulse;
pub mod task;
pub mod worker;

pub use pulse::{DecisionRecord, PoolHealth, StatusPulse, StrategicDirective, SwarmMetrics};
pub use task::Task;
pub use worker::{OutputBuffer, OutputEntry, WorkerHandle};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type WorkerId = Uuid;
pub type SupervisorId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Pending,         // Spawned, no task assigned yet
    Running,         // Executing a task
    Completed,       // Terminal
    Killed,          // Intervention issued; non-terminal while respawns remain
    Respawned,       // Replaced by a successor with a fresh id
    FailedPermanent, // Terminal: respawn budget exhausted
}

impl WorkerState {
    pub fn as_str(&self) -> &str {
        match self {
            WorkerState::Pending => "Pending",
            WorkerState::Running => "Running",
            WorkerState::Completed => "Completed",
            WorkerState::Killed => "Killed",
            WorkerState::Respawned => "Respawned",
            WorkerState::FailedPermanent => "FailedPermanent",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::FailedPermanent)
    }
}

impl FromStr for WorkerState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(WorkerState::Pending),
            "Running" => Ok(WorkerState::Running),
            "Completed" => Ok(WorkerState::Completed),
            "Killed" => Ok(WorkerState::Killed),
            "Respawned" => Ok(WorkerState::Respawned),
            "FailedPermanent" => Ok(WorkerState::FailedPermanent),
            other => Err(anyhow::anyhow!("unknown worker state: {}", other)),
        }
    }
}

/// Free-form capability tag identifying what kind of task a worker is
/// suited to perform ("code", "search", "auth_specialist", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Specialty(pub String);

impl Specialty {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Specialty {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for Specialty {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Why a worker was killed or flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Divergence,     // Goal alignment below floor
    Stalling,       // Stall signal above ceiling
    LowCertainty,   // Certainty below floor
    Timeout,        // Hard wall-clock breach, independent of telemetry
    ExecutionError, // The execution backend returned an error
}

impl FailureKind {
    pub fn describe(&self) -> &str {
        match self {
            FailureKind::Divergence => "low goal alignment, task divergence detected",
            FailureKind::Stalling => "high stall signal, retry loop or repetition",
            FailureKind::LowCertainty => "excessive uncertainty in output",
            FailureKind::Timeout => "hard global timeout exceeded",
            FailureKind::ExecutionError => "task execution failed",
        }
    }
}
