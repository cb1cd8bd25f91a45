pub mod breaker;
pub mod orchestrator;
pub mod supervisor;

pub use breaker::{BreakerState, CircuitBreaker};
pub use orchestrator::{Orchestrator, OrchestratorView};
pub use supervisor::{evaluate_worker, AgentSupervisor, MonitorVerdict};
