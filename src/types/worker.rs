use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{FailureKind, Specialty, Task, WorkerId, WorkerState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub step: Option<u32>,
}

impl OutputEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
            step: None,
        }
    }

    pub fn at_step(content: impl Into<String>, step: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
            step: Some(step),
        }
    }
}

/// Rolling window of recent worker output. Oldest entries are evicted, so
/// memory stays proportional to the pool size rather than to total output.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<VecDeque<OutputEntry>>>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: OutputEntry) {
        let mut entries = self.inner.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<OutputEntry> {
        let entries = self.inner.lock().unwrap();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

/// Supervisor-owned record of one worker: identity, lifecycle state,
/// bounded output window, and the handle to its in-flight execution.
#[derive(Debug)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub specialty: Specialty,
    pub state: WorkerState,
    pub spawned_at: DateTime<Utc>,
    pub started_at: Option<Instant>,
    pub task: Option<Task>,
    pub respawn_attempts: u32,
    pub predecessor: Option<WorkerId>,
    pub failure: Option<FailureKind>,
    pub kill_reason: Option<String>,
    pub output: OutputBuffer,
    pub(crate) cancel_flag: Arc<AtomicBool>,
    pub(crate) join: Option<JoinHandle<()>>,
    pub(crate) outcome: Arc<Mutex<Option<Result<(), String>>>>,
}

impl WorkerHandle {
    pub fn new(specialty: Specialty, buffer_capacity: usize) -> Self {
        Self {
            id: WorkerId::new_v4(),
            specialty,
            state: WorkerState::Pending,
            spawned_at: Utc::now(),
            started_at: None,
            task: None,
            respawn_attempts: 0,
            predecessor: None,
            failure: None,
            kill_reason: None,
            output: OutputBuffer::new(buffer_capacity),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            join: None,
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    /// Wall-clock time since the task started, if one has.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    pub fn recent_output(&self, n: usize) -> Vec<OutputEntry> {
        self.output.recent(n)
    }

    pub fn is_finished(&self) -> bool {
        self.join
            .as_ref()
            .map(|join| join.is_finished())
            .unwrap_or(false)
    }

    /// Cooperative cancellation, then forced: flips the flag the runtime is
    /// expected to poll and aborts the execution task to bound termination.
    pub(crate) fn signal_cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    pub(crate) fn take_outcome(&self) -> Option<Result<(), String>> {
        self.outcome.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_buffer_evicts_oldest() {
        let buffer = OutputBuffer::new(3);
        for i in 0..5 {
            buffer.push(OutputEntry::at_step(format!("output {}", i), i));
        }

        assert_eq!(buffer.len(), 3);
        let recent = buffer.recent(10);
        assert_eq!(recent.first().unwrap().step, Some(2));
        assert_eq!(recent.last().unwrap().step, Some(4));
    }

    #[test]
    fn test_output_buffer_recent_window() {
        let buffer = OutputBuffer::new(100);
        for i in 0..15 {
            buffer.push(OutputEntry::at_step(format!("output {}", i), i));
        }

        let recent = buffer.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent.last().unwrap().step, Some(14));
    }

    #[test]
    fn test_new_handle_starts_pending() {
        let handle = WorkerHandle::new(Specialty::from("code"), 10);
        assert_eq!(handle.state, WorkerState::Pending);
        assert_eq!(handle.respawn_attempts, 0);
        assert!(handle.predecessor.is_none());
        assert!(handle.elapsed().is_none());
        assert!(!handle.is_finished());
    }
}
