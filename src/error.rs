use std::time::Duration;
use thiserror::Error;

use crate::types::{Specialty, SupervisorId, WorkerState};

/// Spawn requests fail fast; they are never queued.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("circuit breaker open for specialty '{specialty}', retry in {retry_in:?}")]
    CircuitBreakerOpen {
        specialty: Specialty,
        retry_in: Duration,
    },
    #[error("supervisor {supervisor} at capacity ({max_workers} workers)")]
    PoolAtCapacity {
        supervisor: SupervisorId,
        max_workers: usize,
    },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid state transition from {from:?} on event {event}")]
    InvalidTransition { from: WorkerState, event: String },
}
