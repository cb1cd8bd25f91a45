use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::BeliefSnapshot;
use crate::types::{OutputBuffer, OutputEntry, Task};

/// Handle a running task writes its output through. Also carries the
/// cancellation flag so a runtime can stop cooperatively between steps
/// instead of waiting for a hard abort.
#[derive(Clone)]
pub struct OutputSink {
    buffer: OutputBuffer,
    cancelled: Arc<AtomicBool>,
}

impl OutputSink {
    pub(crate) fn new(buffer: OutputBuffer, cancelled: Arc<AtomicBool>) -> Self {
        Self { buffer, cancelled }
    }

    pub fn emit(&self, content: impl Into<String>) {
        self.buffer.push(OutputEntry::new(content));
    }

    pub fn emit_step(&self, content: impl Into<String>, step: u32) {
        self.buffer.push(OutputEntry::at_step(content, step));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Execution backend seam. Implementations run one task to completion,
/// streaming progress through the sink and polling it for cancellation.
#[async_trait]
pub trait TaskRuntime: Send + Sync {
    async fn execute(
        &self,
        task: Task,
        beliefs: Arc<BeliefSnapshot>,
        sink: OutputSink,
    ) -> Result<()>;
}

/// Deterministic runtime for demos and tests. Walks the task's estimated
/// steps emitting plausible progress lines; task constraints select failure
/// modes ("stall" loops on an error line forever, "inject_failure" errors
/// out at step 3).
pub struct ScriptedRuntime {
    step_delay: Duration,
}

impl ScriptedRuntime {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl TaskRuntime for ScriptedRuntime {
    async fn execute(
        &self,
        task: Task,
        _beliefs: Arc<BeliefSnapshot>,
        sink: OutputSink,
    ) -> Result<()> {
        if task.constraints.contains_key("stall") {
            loop {
                if sink.is_cancelled() {
                    return Err(anyhow!("cancelled"));
                }
                sink.emit(format!(
                    "error: unable to progress on {}, trying again",
                    task.goal
                ));
                tokio::time::sleep(self.step_delay).await;
            }
        }

        let inject_failure = task.constraints.contains_key("inject_failure");
        for step in 1..=task.estimated_steps.max(1) {
            if sink.is_cancelled() {
                return Err(anyhow!("cancelled"));
            }
            tokio::time::sleep(self.step_delay).await;

            if inject_failure && step == 3 {
                sink.emit_step(format!("error: step {} failed on {}", step, task.goal), step);
                return Err(anyhow!("injected failure at step {}", step));
            }
            sink.emit_step(
                format!("step {}: processed {}; checks passing, success", step, task.goal),
                step,
            );
        }

        sink.emit(format!("completed {}", task.goal));
        Ok(())
    }
}
