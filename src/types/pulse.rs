use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SupervisorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolHealth {
    Healthy,
    Degraded,
    Critical,
}

impl PoolHealth {
    /// Grade a pool from its failure share.
    pub fn grade(failed: usize, total: usize) -> Self {
        if failed == 0 || total == 0 {
            PoolHealth::Healthy
        } else if failed * 2 > total {
            PoolHealth::Critical
        } else {
            PoolHealth::Degraded
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PoolHealth::Healthy => "healthy",
            PoolHealth::Degraded => "degraded",
            PoolHealth::Critical => "critical",
        }
    }
}

/// Bounded summary a supervisor sends upward. Counts and a grade only,
/// never raw output or per-worker detail; the size is the same for a pool
/// of one worker and a pool of a thousand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPulse {
    pub supervisor: SupervisorId,
    pub timestamp: DateTime<Utc>,
    pub turn: u64,
    pub workers_total: usize,
    pub workers_pending: usize,
    pub workers_active: usize,
    pub workers_completed: usize,
    pub workers_failed: usize,
    pub workers_respawned: usize,
    pub interventions: u64,
    pub health: PoolHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategicDirective {
    Continue,
    Pause,
    AdvancePhase,
    Abort,
}

impl StrategicDirective {
    pub fn as_str(&self) -> &str {
        match self {
            StrategicDirective::Continue => "CONTINUE",
            StrategicDirective::Pause => "PAUSE",
            StrategicDirective::AdvancePhase => "ADVANCE_PHASE",
            StrategicDirective::Abort => "ABORT",
        }
    }
}

/// Swarm-wide aggregates computed from status pulses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SwarmMetrics {
    pub workers_total: usize,
    pub workers_active: usize,
    pub workers_completed: usize,
    pub workers_failed: usize,
    pub interventions: u64,
    pub completion_ratio: f32,
    pub failure_ratio: f32,
}

impl SwarmMetrics {
    pub fn aggregate(pulses: &[StatusPulse]) -> Self {
        let mut metrics = SwarmMetrics::default();
        for pulse in pulses {
            metrics.workers_total += pulse.workers_total;
            metrics.workers_active += pulse.workers_active;
            metrics.workers_completed += pulse.workers_completed;
            metrics.workers_failed += pulse.workers_failed;
            metrics.interventions += pulse.interventions;
        }
        if metrics.workers_total > 0 {
            let total = metrics.workers_total as f32;
            metrics.completion_ratio = metrics.workers_completed as f32 / total;
            metrics.failure_ratio = metrics.workers_failed as f32 / total;
        }
        metrics
    }
}

/// One entry in the orchestrator's strategic log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub turn: u64,
    pub directive: StrategicDirective,
    pub metrics: SwarmMetrics,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(total: usize, completed: usize, failed: usize) -> StatusPulse {
        StatusPulse {
            supervisor: SupervisorId::new_v4(),
            timestamp: Utc::now(),
            turn: 0,
            workers_total: total,
            workers_pending: 0,
            workers_active: total - completed - failed,
            workers_completed: completed,
            workers_failed: failed,
            workers_respawned: 0,
            interventions: failed as u64,
            health: PoolHealth::grade(failed, total),
        }
    }

    #[test]
    fn test_grade() {
        assert_eq!(PoolHealth::grade(0, 10), PoolHealth::Healthy);
        assert_eq!(PoolHealth::grade(2, 10), PoolHealth::Degraded);
        assert_eq!(PoolHealth::grade(6, 10), PoolHealth::Critical);
        assert_eq!(PoolHealth::grade(0, 0), PoolHealth::Healthy);
    }

    #[test]
    fn test_aggregate_ratios() {
        let pulses = vec![pulse(5, 5, 0), pulse(5, 3, 2)];
        let metrics = SwarmMetrics::aggregate(&pulses);

        assert_eq!(metrics.workers_total, 10);
        assert_eq!(metrics.workers_completed, 8);
        assert_eq!(metrics.workers_failed, 2);
        assert!((metrics.completion_ratio - 0.8).abs() < f32::EPSILON);
        assert!((metrics.failure_ratio - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_aggregate_empty() {
        let metrics = SwarmMetrics::aggregate(&[]);
        assert_eq!(metrics.workers_total, 0);
        assert_eq!(metrics.completion_ratio, 0.0);
        assert_eq!(metrics.failure_ratio, 0.0);
    }

    #[test]
    fn test_pulse_shape_is_constant() {
        let small = serde_json::to_value(pulse(1, 0, 0)).unwrap();
        let large = serde_json::to_value(pulse(1000, 400, 100)).unwrap();
        assert_eq!(
            small.as_object().unwrap().len(),
            large.as_object().unwrap().len()
        );
    }
}
