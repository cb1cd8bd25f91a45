//! Hierarchical supervision runtime for autonomous agent swarms.
//!
//! An [`Orchestrator`] sits above a set of [`AgentSupervisor`]s, each of
//! which owns a pool of workers. Supervisors sample worker output on a
//! fixed interval, score it into a three-axis telemetry vector, and kill
//! and respawn workers that diverge, stall, or lose certainty. Shared
//! project state lives in a copy-on-write belief registry behind the
//! [`storage::BeliefStore`] seam, with in-memory and Postgres backends.

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod runtime;
pub mod storage;
pub mod telemetry;
pub mod types;

pub use config::{SupervisorConfig, SwarmConfig};
pub use engine::{AgentSupervisor, Orchestrator};
pub use error::{LifecycleError, SpawnError};
pub use registry::{AgentRecord, BeliefRegistry, BeliefSnapshot};
pub use runtime::{OutputSink, ScriptedRuntime, TaskRuntime};
pub use telemetry::{TelemetryAnalyzer, TelemetryVector};
pub use types::{
    FailureKind, Specialty, StatusPulse, StrategicDirective, Task, WorkerId, WorkerState,
};
