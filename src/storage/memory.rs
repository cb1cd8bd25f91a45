use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::traits::BeliefStore;
use crate::registry::{AgentRecord, BeliefRegistry, BeliefSnapshot};
use crate::types::{WorkerId, WorkerState};

#[async_trait]
impl BeliefStore for BeliefRegistry {
    async fn snapshot(&self) -> Result<Arc<BeliefSnapshot>> {
        Ok(self.sync())
    }

    async fn advance_turn(&self, new_phase: &str) -> Result<u64> {
        Ok(BeliefRegistry::advance_turn(self, new_phase).await)
    }

    async fn register_agent(&self, record: AgentRecord) -> Result<()> {
        BeliefRegistry::register_agent(self, record).await;
        Ok(())
    }

    async fn mark_agent(&self, id: WorkerId, state: WorkerState) -> Result<()> {
        BeliefRegistry::mark_agent(self, id, state).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Specialty, SupervisorId};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_registry_behind_trait_object() {
        let store: Arc<dyn BeliefStore> =
            Arc::new(BeliefRegistry::new("proj-trait", HashMap::new()));

        let id = WorkerId::new_v4();
        let record = AgentRecord::new(id, SupervisorId::new_v4(), Specialty::from("code"), None);
        store.register_agent(record).await.unwrap();
        store.mark_agent(id, WorkerState::Running).await.unwrap();

        let turn = store.advance_turn("implementation").await.unwrap();
        assert_eq!(turn, 1);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.agents[&id].state, WorkerState::Running);
        assert_eq!(snapshot.phase, "implementation");
    }
}
