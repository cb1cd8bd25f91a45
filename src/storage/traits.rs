use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::registry::{AgentRecord, BeliefSnapshot};
use crate::types::{WorkerId, WorkerState};

/// Belief persistence seam. The in-memory registry backs tests and demos;
/// the Postgres store gives durability across process restarts. Supervisors
/// and the orchestrator only ever talk to this trait.
#[async_trait]
pub trait BeliefStore: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<BeliefSnapshot>>;

    /// Atomically increment the shared turn counter and set the phase.
    /// Returns the turn just written.
    async fn advance_turn(&self, new_phase: &str) -> Result<u64>;

    async fn register_agent(&self, record: AgentRecord) -> Result<()>;

    async fn mark_agent(&self, id: WorkerId, state: WorkerState) -> Result<()>;
}
