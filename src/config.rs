use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named health floors and ceilings consumed by the telemetry predicate.
/// Operators retune these without touching scoring code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub min_alignment: f32,
    pub max_stall: f32,
    pub min_certainty: f32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_alignment: 0.2,
            max_stall: 0.8,
            min_certainty: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the supervisor samples its pool.
    pub interval: Duration,
    /// Grace period after task start during which health evaluation is
    /// suppressed entirely. Without it, sparse early buffers read as
    /// failure and nearly every worker gets killed at birth.
    pub warmup: Duration,
    /// Hard per-worker wall-clock ceiling, enforced independently of
    /// telemetry.
    pub global_timeout: Duration,
    /// How many recent output entries each evaluation samples.
    pub sample_window: usize,
    /// Capacity of each worker's output ring.
    pub output_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            warmup: Duration::from_secs(30),
            global_timeout: Duration::from_secs(300),
            sample_window: 5,
            output_buffer: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RespawnPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RespawnPolicy {
    /// Backoff before respawn attempt `attempt` (0-based): base doubled
    /// per prior attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

impl Default for RespawnPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures of a specialty before its breaker opens.
    pub failure_threshold: u32,
    /// How long spawns of that specialty fail fast before one trial is
    /// allowed through.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub max_workers: usize,
    pub monitor: MonitorConfig,
    pub thresholds: HealthThresholds,
    pub respawn: RespawnPolicy,
    pub breaker: BreakerConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            monitor: MonitorConfig::default(),
            thresholds: HealthThresholds::default(),
            respawn: RespawnPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Aggregate ratios the orchestrator decides against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub advance_completion_ratio: f32,
    pub pause_failure_ratio: f32,
    pub abort_failure_ratio: f32,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            advance_completion_ratio: 0.9,
            pause_failure_ratio: 0.3,
            abort_failure_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub supervisor: SupervisorConfig,
    pub decisions: DecisionThresholds,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            decisions: DecisionThresholds::default(),
        }
    }
}

impl SwarmConfig {
    /// Tuned for code generation: faster sampling, stricter alignment.
    pub fn code_generation() -> Self {
        let mut config = Self::default();
        config.supervisor.monitor.interval = Duration::from_millis(1500);
        config.supervisor.thresholds.min_alignment = 0.3;
        config
    }

    /// Tuned for research workloads: exploration is expected, so slower
    /// sampling and looser certainty/stall bounds.
    pub fn research() -> Self {
        let mut config = Self::default();
        config.supervisor.monitor.interval = Duration::from_secs(3);
        config.supervisor.thresholds.max_stall = 0.9;
        config.supervisor.thresholds.min_certainty = 0.25;
        config
    }

    /// Tuned for rapid prototyping: fast feedback, low quality bar.
    pub fn rapid_prototyping() -> Self {
        let mut config = Self::default();
        config.supervisor.monitor.interval = Duration::from_secs(1);
        config.supervisor.thresholds.min_alignment = 0.15;
        config.supervisor.thresholds.max_stall = 0.85;
        config
    }
}
