use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::types::{Specialty, SupervisorId, WorkerId, WorkerState};

/// Registry-side view of a worker: enough for lineage and audit queries
/// without holding any live execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: WorkerId,
    pub supervisor: SupervisorId,
    pub specialty: Specialty,
    pub state: WorkerState,
    pub predecessor: Option<WorkerId>,
    pub registered_turn: u64,
    pub registered_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn new(
        id: WorkerId,
        supervisor: SupervisorId,
        specialty: Specialty,
        predecessor: Option<WorkerId>,
    ) -> Self {
        Self {
            id,
            supervisor,
            specialty,
            state: WorkerState::Pending,
            predecessor,
            // Stamped by the registry at registration time.
            registered_turn: 0,
            registered_at: Utc::now(),
        }
    }
}

/// One immutable view of shared project state. Readers hold an `Arc` to a
/// snapshot and are never blocked by, or exposed to, in-flight mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefSnapshot {
    pub project_id: String,
    pub constraints: HashMap<String, Value>,
    pub phase: String,
    pub turn: u64,
    pub agents: HashMap<WorkerId, AgentRecord>,
}

/// Copy-on-write shared belief state. Mutations clone the current snapshot,
/// modify the clone, and publish it in a single pointer swap; the write gate
/// serializes mutators so every published turn reflects exactly one change.
pub struct BeliefRegistry {
    current: RwLock<Arc<BeliefSnapshot>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl BeliefRegistry {
    pub fn new(project_id: impl Into<String>, constraints: HashMap<String, Value>) -> Self {
        let snapshot = BeliefSnapshot {
            project_id: project_id.into(),
            constraints,
            phase: "initialization".to_string(),
            turn: 0,
            agents: HashMap::new(),
        };
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Cheap: clones the `Arc`, never the snapshot.
    pub fn sync(&self) -> Arc<BeliefSnapshot> {
        self.current.read().unwrap().clone()
    }

    /// Advance the shared turn counter and move to a new phase. Returns the
    /// turn number just published.
    pub async fn advance_turn(&self, new_phase: &str) -> u64 {
        let _gate = self.write_gate.lock().await;
        let mut next = (*self.sync()).clone();
        next.turn += 1;
        next.phase = new_phase.to_string();
        let turn = next.turn;
        self.publish(next);
        turn
    }

    pub async fn register_agent(&self, mut record: AgentRecord) {
        let _gate = self.write_gate.lock().await;
        let mut next = (*self.sync()).clone();
        record.registered_turn = next.turn;
        record.registered_at = Utc::now();
        next.agents.insert(record.id, record);
        self.publish(next);
    }

    pub async fn mark_agent(&self, id: WorkerId, state: WorkerState) {
        let _gate = self.write_gate.lock().await;
        let mut next = (*self.sync()).clone();
        if let Some(record) = next.agents.get_mut(&id) {
            record.state = state;
        }
        self.publish(next);
    }

    fn publish(&self, next: BeliefSnapshot) {
        *self.current.write().unwrap() = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_registry() -> BeliefRegistry {
        BeliefRegistry::new("proj-test", HashMap::new())
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let registry = create_test_registry();
        let snapshot = registry.sync();

        assert_eq!(snapshot.project_id, "proj-test");
        assert_eq!(snapshot.phase, "initialization");
        assert_eq!(snapshot.turn, 0);
        assert!(snapshot.agents.is_empty());
    }

    #[tokio::test]
    async fn test_held_snapshot_is_immutable() {
        let registry = create_test_registry();
        let before = registry.sync();

        registry.advance_turn("implementation").await;

        assert_eq!(before.turn, 0);
        assert_eq!(before.phase, "initialization");
        let after = registry.sync();
        assert_eq!(after.turn, 1);
        assert_eq!(after.phase, "implementation");
    }

    #[tokio::test]
    async fn test_register_stamps_current_turn() {
        let registry = create_test_registry();
        registry.advance_turn("implementation").await;
        registry.advance_turn("review").await;

        let id = WorkerId::new_v4();
        let record = AgentRecord::new(id, SupervisorId::new_v4(), Specialty::from("code"), None);
        registry.register_agent(record).await;

        let snapshot = registry.sync();
        assert_eq!(snapshot.agents[&id].registered_turn, 2);
        assert_eq!(snapshot.agents[&id].state, WorkerState::Pending);
    }

    #[tokio::test]
    async fn test_mark_agent_updates_state() {
        let registry = create_test_registry();
        let id = WorkerId::new_v4();
        let record = AgentRecord::new(id, SupervisorId::new_v4(), Specialty::from("code"), None);
        registry.register_agent(record).await;

        registry.mark_agent(id, WorkerState::Running).await;
        assert_eq!(registry.sync().agents[&id].state, WorkerState::Running);

        // Unknown ids are ignored rather than panicking.
        registry.mark_agent(WorkerId::new_v4(), WorkerState::Killed).await;
        assert_eq!(registry.sync().agents.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_advances_are_linearized() {
        let registry = Arc::new(create_test_registry());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    registry.advance_turn("stress").await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.sync().turn, 200);
    }
}
