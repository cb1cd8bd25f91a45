use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::types::{WorkerHandle, WorkerState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LifecycleEvent {
    TaskAssigned,
    TaskCompleted,
    Killed,
    Replaced,
    RetiredPermanently,
}

/// Worker state machine. Transitions form a DAG with terminal states
/// `Completed` and `FailedPermanent`; anything else is rejected so a bug
/// cannot resurrect a retired worker.
pub struct WorkerLifecycle;

impl WorkerLifecycle {
    pub fn transition(
        worker: &mut WorkerHandle,
        event: LifecycleEvent,
    ) -> Result<WorkerState, LifecycleError> {
        let new_state = match (worker.state, event) {
            (WorkerState::Pending, LifecycleEvent::TaskAssigned) => WorkerState::Running,
            (WorkerState::Running, LifecycleEvent::TaskCompleted) => WorkerState::Completed,
            (WorkerState::Pending | WorkerState::Running, LifecycleEvent::Killed) => {
                WorkerState::Killed
            }
            (WorkerState::Killed, LifecycleEvent::Replaced) => WorkerState::Respawned,
            (WorkerState::Killed, LifecycleEvent::RetiredPermanently) => {
                WorkerState::FailedPermanent
            }
            _ => {
                return Err(LifecycleError::InvalidTransition {
                    from: worker.state,
                    event: format!("{:?}", event),
                });
            }
        };

        worker.state = new_state;
        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Specialty;

    fn create_test_worker() -> WorkerHandle {
        WorkerHandle::new(Specialty::from("code"), 10)
    }

    #[test]
    fn test_pending_to_running() {
        let mut worker = create_test_worker();

        let result = WorkerLifecycle::transition(&mut worker, LifecycleEvent::TaskAssigned);
        assert!(result.is_ok());
        assert_eq!(worker.state, WorkerState::Running);
    }

    #[test]
    fn test_running_to_completed() {
        let mut worker = create_test_worker();
        worker.state = WorkerState::Running;

        WorkerLifecycle::transition(&mut worker, LifecycleEvent::TaskCompleted).unwrap();
        assert_eq!(worker.state, WorkerState::Completed);
    }

    #[test]
    fn test_running_to_killed() {
        let mut worker = create_test_worker();
        worker.state = WorkerState::Running;

        WorkerLifecycle::transition(&mut worker, LifecycleEvent::Killed).unwrap();
        assert_eq!(worker.state, WorkerState::Killed);
    }

    #[test]
    fn test_killed_to_respawned() {
        let mut worker = create_test_worker();
        worker.state = WorkerState::Killed;

        WorkerLifecycle::transition(&mut worker, LifecycleEvent::Replaced).unwrap();
        assert_eq!(worker.state, WorkerState::Respawned);
    }

    #[test]
    fn test_killed_to_failed_permanent() {
        let mut worker = create_test_worker();
        worker.state = WorkerState::Killed;

        WorkerLifecycle::transition(&mut worker, LifecycleEvent::RetiredPermanently).unwrap();
        assert_eq!(worker.state, WorkerState::FailedPermanent);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for terminal in [WorkerState::Completed, WorkerState::FailedPermanent] {
            let mut worker = create_test_worker();
            worker.state = terminal;

            let result = WorkerLifecycle::transition(&mut worker, LifecycleEvent::Killed);
            assert!(result.is_err());
            assert_eq!(worker.state, terminal);
        }
    }

    #[test]
    fn test_completed_cannot_respawn() {
        let mut worker = create_test_worker();
        worker.state = WorkerState::Completed;

        let result = WorkerLifecycle::transition(&mut worker, LifecycleEvent::Replaced);
        assert!(result.is_err());
    }
}
