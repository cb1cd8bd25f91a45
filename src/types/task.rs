use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::WorkerId;

/// A unit of work handed to a worker. Immutable once assigned; a respawn
/// derives a fresh task value carrying the correction context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub goal: String,
    pub constraints: HashMap<String, Value>,
    pub estimated_steps: u32,
}

impl Task {
    pub fn new(goal: impl Into<String>, estimated_steps: u32) -> Self {
        Self {
            goal: goal.into(),
            constraints: HashMap::new(),
            estimated_steps,
        }
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    /// Derive the task handed to a respawned worker: same goal, plus the
    /// correction note and a reference to the attempt it replaces.
    pub fn corrected(&self, correction: &str, predecessor: WorkerId) -> Task {
        let mut task = self.clone();
        task.constraints.insert(
            "context_correction".to_string(),
            Value::String(correction.to_string()),
        );
        task.constraints.insert(
            "previous_attempt".to_string(),
            Value::String(predecessor.to_string()),
        );
        task
    }
}
