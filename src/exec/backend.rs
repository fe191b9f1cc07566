// src/exec/backend.rs

//! Pluggable task backend abstraction.
//!
//! The executor talks to a `TaskBackend` instead of spawning processes
//! itself. `ProcessBackend` is the production implementation; tests provide
//! backends that, for example, record which tasks ran and create their
//! outputs in an in-memory store.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::dag::Task;
use crate::errors::Result;

use super::CancelSignal;
use super::task_runner::run_process;

/// Where a launched process runs and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    /// Working directory (the artifact root).
    pub workdir: PathBuf,
    /// Resolved task log file; truncated at launch.
    pub log_file: PathBuf,
}

/// How a launched process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    Exited { code: i32, stderr_tail: Vec<String> },
    /// The cancel flag was raised and the process was killed.
    Cancelled,
}

impl ProcessExit {
    pub fn success() -> Self {
        ProcessExit::Exited {
            code: 0,
            stderr_tail: Vec::new(),
        }
    }
}

/// Trait abstracting how a task's invocation is carried out.
///
/// An `Err` means the work could not be started at all; the executor reports
/// it as a spawn failure.
pub trait TaskBackend: Send + Sync {
    fn launch<'a>(
        &'a self,
        task: &'a Task,
        ctx: LaunchContext,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + 'a>>;
}

/// Production backend: real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessBackend;

impl TaskBackend for ProcessBackend {
    fn launch<'a>(
        &'a self,
        task: &'a Task,
        ctx: LaunchContext,
        cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + 'a>> {
        Box::pin(async move { run_process(task, &ctx, cancel).await })
    }
}
