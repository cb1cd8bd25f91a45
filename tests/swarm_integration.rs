use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use formicary::registry::BeliefRegistry;
use formicary::runtime::ScriptedRuntime;
use formicary::types::{FailureKind, Specialty, StrategicDirective, Task, WorkerId, WorkerState};
use formicary::{AgentSupervisor, Orchestrator, SwarmConfig};

fn scaled_config() -> SwarmConfig {
    let mut config = SwarmConfig::default();
    config.supervisor.max_workers = 6;
    config.supervisor.monitor.interval = Duration::from_millis(100);
    config.supervisor.monitor.warmup = Duration::from_millis(400);
    config.supervisor.monitor.global_timeout = Duration::from_secs(5);
    config.supervisor.respawn.backoff_base = Duration::from_millis(200);
    config
}

async fn wait_for<F, T>(mut probe: F, timeout: Duration) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = probe() {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_worker_is_killed_and_respawned_with_lineage() {
    let registry = Arc::new(BeliefRegistry::new("proj-integration", HashMap::new()));
    let runtime = Arc::new(ScriptedRuntime::new(Duration::from_millis(50)));
    let config = scaled_config();
    let supervisor = AgentSupervisor::new(config.supervisor, registry.clone(), runtime);
    let monitor = supervisor.start_monitor();

    let mut stalled: Option<WorkerId> = None;
    for i in 0..4 {
        let worker = supervisor.spawn(Specialty::from("code")).await.unwrap();
        let mut task = Task::new("build login api", 50);
        if i == 1 {
            task = task.with_constraint("stall", json!(true));
            stalled = Some(worker);
        }
        supervisor.assign(worker, task).await.unwrap();
    }
    let stalled = stalled.unwrap();

    // Inside the warm-up window nothing is killed, even the stuck worker.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(supervisor.worker_state(stalled), Some(WorkerState::Running));

    let successor = wait_for(
        || supervisor.find_successor(stalled),
        Duration::from_secs(5),
    )
    .await
    .expect("stalled worker was never replaced");

    assert_ne!(successor, stalled);
    assert_eq!(supervisor.worker_failure(stalled), Some(FailureKind::Stalling));

    let respawned = wait_for(
        || {
            let snapshot = registry.sync();
            (snapshot.agents.get(&stalled).map(|r| r.state) == Some(WorkerState::Respawned))
                .then_some(())
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(respawned.is_some(), "killed worker never marked respawned");
    assert_eq!(supervisor.worker_state(stalled), Some(WorkerState::Respawned));

    // Lineage is visible in the shared belief state.
    let snapshot = registry.sync();
    assert_eq!(snapshot.agents[&successor].predecessor, Some(stalled));
    assert_eq!(snapshot.agents[&stalled].state, WorkerState::Respawned);

    monitor.abort();
    supervisor.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn healthy_swarm_completes_and_advances_phase() {
    let registry = Arc::new(BeliefRegistry::new("proj-integration", HashMap::new()));
    let runtime = Arc::new(ScriptedRuntime::new(Duration::from_millis(50)));
    let orchestrator = Orchestrator::new(registry.clone(), runtime, scaled_config());

    let supervisor = orchestrator.create_supervisor();
    let monitor = supervisor.start_monitor();

    for _ in 0..4 {
        let worker = supervisor.spawn(Specialty::from("code")).await.unwrap();
        supervisor
            .assign(worker, Task::new("build login api", 3))
            .await
            .unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let pulse = supervisor.status_pulse().await;
        if pulse.workers_total == 4 && pulse.workers_completed == 4 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "workers never all completed"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let pulses = orchestrator.collect_pulses().await;
    let directive = orchestrator.decide(&pulses).await;
    assert_eq!(directive, StrategicDirective::AdvancePhase);

    let turn = orchestrator.advance_phase("phase_1").await.unwrap();
    assert_eq!(turn, 1);
    assert_eq!(registry.sync().turn, 1);

    monitor.abort();
    supervisor.shutdown();
}
