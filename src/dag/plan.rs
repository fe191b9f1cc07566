// src/dag/plan.rs

use crate::staleness::StaleReason;
use crate::types::{Target, TaskName};

/// One task the plan will run, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: TaskName,
    pub reason: StaleReason,
}

/// The stale part of a target's closure, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub target: Target,
    pub steps: Vec<PlannedTask>,
    /// Enabled tasks of the closure that are already up to date.
    pub fresh: Vec<TaskName>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
