use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::breaker::CircuitBreaker;
use crate::config::SupervisorConfig;
use crate::error::SpawnError;
use crate::lifecycle::{LifecycleEvent, WorkerLifecycle};
use crate::registry::AgentRecord;
use crate::runtime::{OutputSink, TaskRuntime};
use crate::storage::BeliefStore;
use crate::telemetry::{TelemetryAnalyzer, TelemetryVector};
use crate::types::{
    FailureKind, OutputEntry, Specialty, SupervisorId, Task, WorkerHandle, WorkerId, WorkerState,
};

/// Outcome of one health evaluation of one worker.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorVerdict {
    /// Within warm-up, or no output sampled yet.
    Skip,
    Healthy,
    /// Hard wall-clock ceiling breached; checked before telemetry.
    Timeout,
    Unhealthy {
        kind: FailureKind,
        telemetry: TelemetryVector,
    },
}

/// Pure evaluation of one worker's recent output. Separated from the pool
/// so the monitoring policy is testable without spawning anything.
pub fn evaluate_worker(
    elapsed: Duration,
    sample: &[OutputEntry],
    goal: &str,
    config: &SupervisorConfig,
    analyzer: &TelemetryAnalyzer,
) -> MonitorVerdict {
    if elapsed < config.monitor.warmup {
        return MonitorVerdict::Skip;
    }
    if elapsed > config.monitor.global_timeout {
        return MonitorVerdict::Timeout;
    }
    if sample.is_empty() {
        return MonitorVerdict::Skip;
    }

    let telemetry = analyzer.analyze(sample, goal);
    if telemetry.is_healthy(&config.thresholds) {
        MonitorVerdict::Healthy
    } else {
        MonitorVerdict::Unhealthy {
            kind: telemetry.diagnose(&config.thresholds),
            telemetry,
        }
    }
}

struct PoolState {
    workers: HashMap<WorkerId, WorkerHandle>,
    breakers: HashMap<Specialty, CircuitBreaker>,
    pending_respawns: HashMap<WorkerId, JoinHandle<()>>,
    interventions: u64,
}

/// Owns a pool of workers: spawns them, assigns tasks, samples their output
/// on a fixed interval, kills the unhealthy, and respawns replacements with
/// correction context until the retry budget runs out.
#[derive(Clone)]
pub struct AgentSupervisor {
    id: SupervisorId,
    config: SupervisorConfig,
    beliefs: Arc<dyn BeliefStore>,
    runtime: Arc<dyn TaskRuntime>,
    analyzer: Arc<TelemetryAnalyzer>,
    pool: Arc<Mutex<PoolState>>,
}

impl AgentSupervisor {
    pub fn new(
        config: SupervisorConfig,
        beliefs: Arc<dyn BeliefStore>,
        runtime: Arc<dyn TaskRuntime>,
    ) -> Self {
        Self {
            id: SupervisorId::new_v4(),
            config,
            beliefs,
            runtime,
            analyzer: Arc::new(TelemetryAnalyzer::default()),
            pool: Arc::new(Mutex::new(PoolState {
                workers: HashMap::new(),
                breakers: HashMap::new(),
                pending_respawns: HashMap::new(),
                interventions: 0,
            })),
        }
    }

    pub fn id(&self) -> SupervisorId {
        self.id
    }

    /// Admit a new worker into the pool. Fails fast when the pool is at
    /// capacity or the specialty's circuit breaker is open.
    pub async fn spawn(&self, specialty: Specialty) -> Result<WorkerId, SpawnError> {
        self.spawn_internal(specialty, None, 0).await
    }

    async fn spawn_internal(
        &self,
        specialty: Specialty,
        predecessor: Option<WorkerId>,
        attempts: u32,
    ) -> Result<WorkerId, SpawnError> {
        let worker_id;
        {
            let mut pool = self.pool.lock().unwrap();

            // Only live workers count toward capacity; completed and retired
            // ones stay in the map for lineage queries.
            let live = pool
                .workers
                .values()
                .filter(|w| matches!(w.state, WorkerState::Pending | WorkerState::Running))
                .count();
            if live >= self.config.max_workers {
                return Err(SpawnError::PoolAtCapacity {
                    supervisor: self.id,
                    max_workers: self.config.max_workers,
                });
            }

            let breaker_config = self.config.breaker;
            let breaker = pool
                .breakers
                .entry(specialty.clone())
                .or_insert_with(|| CircuitBreaker::new(breaker_config));
            if let Err(retry_in) = breaker.try_acquire(Instant::now()) {
                return Err(SpawnError::CircuitBreakerOpen {
                    specialty,
                    retry_in,
                });
            }

            let mut handle =
                WorkerHandle::new(specialty.clone(), self.config.monitor.output_buffer);
            handle.predecessor = predecessor;
            handle.respawn_attempts = attempts;
            worker_id = handle.id;
            pool.workers.insert(worker_id, handle);
        }

        let record = AgentRecord::new(worker_id, self.id, specialty, predecessor);
        if let Err(e) = self.beliefs.register_agent(record).await {
            warn!("failed to register worker {} in belief store: {}", worker_id, e);
        }

        Ok(worker_id)
    }

    /// Hand a task to a pending worker and launch its execution.
    pub async fn assign(&self, worker_id: WorkerId, task: Task) -> anyhow::Result<()> {
        let beliefs = self.beliefs.snapshot().await?;

        let (sink, outcome, task_for_runtime) = {
            let mut pool = self.pool.lock().unwrap();
            let worker = pool
                .workers
                .get_mut(&worker_id)
                .ok_or_else(|| anyhow::anyhow!("unknown worker {}", worker_id))?;

            WorkerLifecycle::transition(worker, LifecycleEvent::TaskAssigned)?;
            worker.task = Some(task.clone());
            worker.started_at = Some(Instant::now());

            let sink = OutputSink::new(worker.output.clone(), worker.cancel_flag.clone());
            (sink, worker.outcome.clone(), task)
        };

        let runtime = self.runtime.clone();
        let join = tokio::spawn(async move {
            let result = runtime.execute(task_for_runtime, beliefs, sink).await;
            *outcome.lock().unwrap() = Some(result.map_err(|e| e.to_string()));
        });

        {
            let mut pool = self.pool.lock().unwrap();
            if let Some(worker) = pool.workers.get_mut(&worker_id) {
                worker.join = Some(join);
            }
        }

        if let Err(e) = self.beliefs.mark_agent(worker_id, WorkerState::Running).await {
            warn!("failed to mark worker {} running: {}", worker_id, e);
        }
        Ok(())
    }

    /// Run the monitoring loop until the returned handle is aborted.
    pub fn start_monitor(&self) -> JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(supervisor.config.monitor.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                supervisor.tick().await;
            }
        })
    }

    /// One monitoring pass: settle finished executions, then evaluate every
    /// running worker and intervene on the unhealthy.
    pub async fn tick(&self) {
        self.finalize_finished().await;

        let flagged: Vec<(WorkerId, FailureKind, String)> = {
            let pool = self.pool.lock().unwrap();
            pool.workers
                .values()
                .filter(|w| w.state == WorkerState::Running)
                .filter_map(|worker| {
                    let elapsed = worker.elapsed()?;
                    let goal = worker.task.as_ref().map(|t| t.goal.as_str()).unwrap_or("");
                    let sample = worker.recent_output(self.config.monitor.sample_window);

                    match evaluate_worker(elapsed, &sample, goal, &self.config, &self.analyzer) {
                        MonitorVerdict::Skip | MonitorVerdict::Healthy => None,
                        MonitorVerdict::Timeout => Some((
                            worker.id,
                            FailureKind::Timeout,
                            format!("exceeded global timeout after {:?}", elapsed),
                        )),
                        MonitorVerdict::Unhealthy { kind, telemetry } => Some((
                            worker.id,
                            kind,
                            format!("{} ({})", kind.describe(), telemetry),
                        )),
                    }
                })
                .collect()
        };

        for (worker_id, kind, reason) in flagged {
            self.intervene(worker_id, kind, &reason).await;
            self.schedule_respawn(worker_id, format!("previous attempt failed: {}", reason))
                .await;
        }
    }

    /// Settle workers whose execution task has ended on its own.
    async fn finalize_finished(&self) {
        let finished: Vec<(WorkerId, Result<(), String>)> = {
            let pool = self.pool.lock().unwrap();
            pool.workers
                .values()
                .filter(|w| w.state == WorkerState::Running && w.is_finished())
                .map(|w| {
                    let outcome = w
                        .take_outcome()
                        .unwrap_or_else(|| Err("execution task aborted unexpectedly".to_string()));
                    (w.id, outcome)
                })
                .collect()
        };

        for (worker_id, outcome) in finished {
            match outcome {
                Ok(()) => {
                    {
                        let mut pool = self.pool.lock().unwrap();
                        let Some(worker) = pool.workers.get_mut(&worker_id) else {
                            continue;
                        };
                        if WorkerLifecycle::transition(worker, LifecycleEvent::TaskCompleted)
                            .is_err()
                        {
                            continue;
                        }
                        let specialty = worker.specialty.clone();
                        if let Some(breaker) = pool.breakers.get_mut(&specialty) {
                            breaker.record_success();
                        }
                    }
                    info!("worker {} completed its task", worker_id);
                    if let Err(e) = self
                        .beliefs
                        .mark_agent(worker_id, WorkerState::Completed)
                        .await
                    {
                        warn!("failed to mark worker {} completed: {}", worker_id, e);
                    }
                }
                Err(reason) => {
                    self.intervene(worker_id, FailureKind::ExecutionError, &reason)
                        .await;
                    self.schedule_respawn(
                        worker_id,
                        format!("previous attempt failed: {}", reason),
                    )
                    .await;
                }
            }
        }
    }

    /// Kill a worker: cancel its execution, discard its output, record the
    /// failure against its specialty's breaker.
    pub async fn intervene(&self, worker_id: WorkerId, kind: FailureKind, reason: &str) {
        let specialty = {
            let mut pool = self.pool.lock().unwrap();
            let Some(worker) = pool.workers.get_mut(&worker_id) else {
                return;
            };
            if WorkerLifecycle::transition(worker, LifecycleEvent::Killed).is_err() {
                return;
            }
            worker.signal_cancel();
            worker.output.clear();
            worker.kill_reason = Some(reason.to_string());
            worker.failure = Some(kind);
            let specialty = worker.specialty.clone();

            pool.interventions += 1;
            let breaker_config = self.config.breaker;
            pool.breakers
                .entry(specialty.clone())
                .or_insert_with(|| CircuitBreaker::new(breaker_config))
                .record_failure(Instant::now());
            specialty
        };

        warn!(
            "killed worker {} (specialty {}): {}",
            worker_id, specialty, reason
        );
        if let Err(e) = self.beliefs.mark_agent(worker_id, WorkerState::Killed).await {
            warn!("failed to mark worker {} killed: {}", worker_id, e);
        }
    }

    /// Queue a delayed replacement for a killed worker, or retire it when
    /// the respawn budget is spent. Backoff doubles per prior attempt.
    pub async fn schedule_respawn(&self, failed_id: WorkerId, correction: String) {
        let attempts = {
            let pool = self.pool.lock().unwrap();
            match pool.workers.get(&failed_id) {
                Some(worker) => worker.respawn_attempts,
                None => return,
            }
        };

        if attempts >= self.config.respawn.max_attempts {
            self.retire_permanently(failed_id).await;
            return;
        }

        let delay = self.config.respawn.delay_for(attempts);
        info!(
            "respawning worker {} in {:?} (attempt {} of {})",
            failed_id,
            delay,
            attempts + 1,
            self.config.respawn.max_attempts
        );

        let supervisor = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.complete_respawn(failed_id, &correction).await;
        });
        self.pool
            .lock()
            .unwrap()
            .pending_respawns
            .insert(failed_id, timer);
    }

    async fn complete_respawn(&self, failed_id: WorkerId, correction: &str) {
        let (specialty, task, attempts) = {
            let mut pool = self.pool.lock().unwrap();
            pool.pending_respawns.remove(&failed_id);

            let Some(worker) = pool.workers.get(&failed_id) else {
                return;
            };
            if worker.state != WorkerState::Killed {
                return;
            }
            (
                worker.specialty.clone(),
                worker.task.clone(),
                worker.respawn_attempts,
            )
        };

        match self
            .spawn_internal(specialty, Some(failed_id), attempts + 1)
            .await
        {
            Ok(new_id) => {
                {
                    let mut pool = self.pool.lock().unwrap();
                    if let Some(worker) = pool.workers.get_mut(&failed_id) {
                        let _ = WorkerLifecycle::transition(worker, LifecycleEvent::Replaced);
                    }
                }
                if let Err(e) = self
                    .beliefs
                    .mark_agent(failed_id, WorkerState::Respawned)
                    .await
                {
                    warn!("failed to mark worker {} respawned: {}", failed_id, e);
                }
                info!("worker {} replaced by {}", failed_id, new_id);

                if let Some(task) = task {
                    let corrected = task.corrected(correction, failed_id);
                    if let Err(e) = self.assign(new_id, corrected).await {
                        warn!("failed to assign corrected task to {}: {}", new_id, e);
                    }
                }
            }
            Err(e) => {
                // Replacement was refused (capacity or breaker); the failed
                // worker is not left dangling in Killed.
                warn!("respawn of {} rejected: {}", failed_id, e);
                self.retire_permanently(failed_id).await;
            }
        }
    }

    async fn retire_permanently(&self, worker_id: WorkerId) {
        {
            let mut pool = self.pool.lock().unwrap();
            let Some(worker) = pool.workers.get_mut(&worker_id) else {
                return;
            };
            if WorkerLifecycle::transition(worker, LifecycleEvent::RetiredPermanently).is_err() {
                return;
            }
        }
        warn!("worker {} retired permanently, respawn budget spent", worker_id);
        if let Err(e) = self
            .beliefs
            .mark_agent(worker_id, WorkerState::FailedPermanent)
            .await
        {
            warn!("failed to mark worker {} failed: {}", worker_id, e);
        }
    }

    /// Bounded upward report: counts and a health grade, never raw output.
    pub async fn status_pulse(&self) -> crate::types::StatusPulse {
        let turn = match self.beliefs.snapshot().await {
            Ok(snapshot) => snapshot.turn,
            Err(_) => 0,
        };

        let pool = self.pool.lock().unwrap();
        let mut pending = 0;
        let mut active = 0;
        let mut completed = 0;
        let mut failed = 0;
        let mut respawned = 0;
        for worker in pool.workers.values() {
            match worker.state {
                WorkerState::Pending => pending += 1,
                WorkerState::Running => active += 1,
                WorkerState::Completed => completed += 1,
                WorkerState::Killed | WorkerState::FailedPermanent => failed += 1,
                WorkerState::Respawned => respawned += 1,
            }
        }
        let total = pool.workers.len();

        crate::types::StatusPulse {
            supervisor: self.id,
            timestamp: chrono::Utc::now(),
            turn,
            workers_total: total,
            workers_pending: pending,
            workers_active: active,
            workers_completed: completed,
            workers_failed: failed,
            workers_respawned: respawned,
            interventions: pool.interventions,
            health: crate::types::PoolHealth::grade(failed, total),
        }
    }

    /// Cancel every live worker and drop all queued respawns.
    pub fn shutdown(&self) {
        let mut pool = self.pool.lock().unwrap();
        for worker in pool.workers.values() {
            if matches!(worker.state, WorkerState::Pending | WorkerState::Running) {
                worker.signal_cancel();
            }
        }
        for (_, timer) in pool.pending_respawns.drain() {
            timer.abort();
        }
    }

    pub fn worker_state(&self, worker_id: WorkerId) -> Option<WorkerState> {
        self.pool
            .lock()
            .unwrap()
            .workers
            .get(&worker_id)
            .map(|w| w.state)
    }

    pub fn worker_failure(&self, worker_id: WorkerId) -> Option<FailureKind> {
        self.pool
            .lock()
            .unwrap()
            .workers
            .get(&worker_id)
            .and_then(|w| w.failure)
    }

    /// The replacement spawned for `predecessor`, if one exists.
    pub fn find_successor(&self, predecessor: WorkerId) -> Option<WorkerId> {
        self.pool
            .lock()
            .unwrap()
            .workers
            .values()
            .find(|w| w.predecessor == Some(predecessor))
            .map(|w| w.id)
    }
}
