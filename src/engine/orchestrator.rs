use anyhow::Result;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::supervisor::AgentSupervisor;
use crate::config::SwarmConfig;
use crate::runtime::TaskRuntime;
use crate::storage::BeliefStore;
use crate::types::{DecisionRecord, StatusPulse, StrategicDirective, SwarmMetrics};

/// Top of the hierarchy. Creates supervisors, collects their pulses, and
/// turns swarm-wide aggregates into strategic directives. It never sees a
/// worker directly; everything below a supervisor is opaque to it.
pub struct Orchestrator {
    beliefs: Arc<dyn BeliefStore>,
    runtime: Arc<dyn TaskRuntime>,
    config: SwarmConfig,
    supervisors: Mutex<Vec<AgentSupervisor>>,
    decisions: Mutex<Vec<DecisionRecord>>,
}

/// Point-in-time summary for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorView {
    pub project_id: String,
    pub phase: String,
    pub turn: u64,
    pub supervisors: usize,
    pub registered_agents: usize,
    pub last_decision: Option<DecisionRecord>,
}

impl Orchestrator {
    pub fn new(
        beliefs: Arc<dyn BeliefStore>,
        runtime: Arc<dyn TaskRuntime>,
        config: SwarmConfig,
    ) -> Self {
        Self {
            beliefs,
            runtime,
            config,
            supervisors: Mutex::new(Vec::new()),
            decisions: Mutex::new(Vec::new()),
        }
    }

    pub fn create_supervisor(&self) -> AgentSupervisor {
        let supervisor = AgentSupervisor::new(
            self.config.supervisor.clone(),
            self.beliefs.clone(),
            self.runtime.clone(),
        );
        self.supervisors.lock().unwrap().push(supervisor.clone());
        supervisor
    }

    pub async fn collect_pulses(&self) -> Vec<StatusPulse> {
        let supervisors: Vec<AgentSupervisor> = self.supervisors.lock().unwrap().clone();
        futures::future::join_all(supervisors.iter().map(|s| s.status_pulse())).await
    }

    /// Fold pulses into swarm metrics and pick a directive. Abort wins over
    /// advance when both thresholds are somehow crossed.
    pub async fn decide(&self, pulses: &[StatusPulse]) -> StrategicDirective {
        let metrics = SwarmMetrics::aggregate(pulses);
        let thresholds = &self.config.decisions;

        let (directive, reason) = if metrics.workers_total == 0 {
            (StrategicDirective::Continue, "no workers yet".to_string())
        } else if metrics.failure_ratio >= thresholds.abort_failure_ratio {
            (
                StrategicDirective::Abort,
                format!("failure ratio {:.2} past abort ceiling", metrics.failure_ratio),
            )
        } else if metrics.completion_ratio >= thresholds.advance_completion_ratio {
            (
                StrategicDirective::AdvancePhase,
                format!("completion ratio {:.2}", metrics.completion_ratio),
            )
        } else if metrics.failure_ratio > thresholds.pause_failure_ratio {
            (
                StrategicDirective::Pause,
                format!("failure ratio {:.2} above pause floor", metrics.failure_ratio),
            )
        } else {
            (StrategicDirective::Continue, "swarm within bounds".to_string())
        };

        let turn = match self.beliefs.snapshot().await {
            Ok(snapshot) => snapshot.turn,
            Err(_) => 0,
        };
        info!("strategic decision: {} ({})", directive.as_str(), reason);
        self.decisions.lock().unwrap().push(DecisionRecord {
            timestamp: Utc::now(),
            turn,
            directive,
            metrics,
            reason,
        });

        directive
    }

    /// Move the shared belief state into a new phase.
    pub async fn advance_phase(&self, label: &str) -> Result<u64> {
        self.beliefs.advance_turn(label).await
    }

    pub fn last_decision(&self) -> Option<DecisionRecord> {
        self.decisions.lock().unwrap().last().cloned()
    }

    pub async fn overview(&self) -> Result<OrchestratorView> {
        let snapshot = self.beliefs.snapshot().await?;
        Ok(OrchestratorView {
            project_id: snapshot.project_id.clone(),
            phase: snapshot.phase.clone(),
            turn: snapshot.turn,
            supervisors: self.supervisors.lock().unwrap().len(),
            registered_agents: snapshot.agents.len(),
            last_decision: self.last_decision(),
        })
    }
}
