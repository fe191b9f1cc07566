// src/engine/mod.rs

//! Pipeline driver.
//!
//! This module ties together:
//! - the registry and the parameter snapshot
//! - the scheduler (what is stale, in which order)
//! - the executor (running one task through a backend)
//!
//! The driver itself lives in [`pipeline`]; the outcome types shared with the
//! executor are defined here.

use std::fmt;
use std::path::PathBuf;

use crate::types::TaskName;

/// Result of running one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(TaskFailure),
}

/// Why a task did not complete. No sentinel is written for any of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The process exited unsuccessfully (`-1` when killed by a signal).
    NonZeroExit {
        code: i32,
        /// Last lines the process wrote to stderr.
        stderr_tail: Vec<String>,
    },
    /// The process exited zero but some declared outputs are absent.
    IncompleteOutputs { missing: Vec<PathBuf> },
    /// Aborted by the user.
    Cancelled,
    /// The process could not be started.
    SpawnFailed(String),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::NonZeroExit { code, .. } => write!(f, "exited with status {code}"),
            TaskFailure::IncompleteOutputs { missing } => {
                let paths: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
                write!(f, "exited successfully but did not produce {}", paths.join(", "))
            }
            TaskFailure::Cancelled => f.write_str("cancelled"),
            TaskFailure::SpawnFailed(msg) => write!(f, "could not be started: {msg}"),
        }
    }
}

/// Overall result of [`Pipeline::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The plan was empty; nothing ran.
    AllFresh,
    /// Every planned task succeeded.
    Completed { ran: Vec<TaskName> },
    /// The run halted at `task`; `ran` lists the tasks that succeeded before it.
    Failed {
        task: TaskName,
        failure: TaskFailure,
        ran: Vec<TaskName>,
    },
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunReport::Failed { .. })
    }

    /// Tasks that ran successfully during this invocation.
    pub fn ran(&self) -> &[TaskName] {
        match self {
            RunReport::AllFresh => &[],
            RunReport::Completed { ran } | RunReport::Failed { ran, .. } => ran,
        }
    }
}

pub mod pipeline;

pub use pipeline::Pipeline;
