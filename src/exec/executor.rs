// src/exec/executor.rs

//! Runs one task and maintains its sentinel.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Params;
use crate::dag::{Registry, Task};
use crate::engine::{TaskFailure, TaskOutcome};
use crate::errors::Result;
use crate::staleness::Fingerprint;
use crate::store::{ArtifactStore, SentinelRecord, read_sentinel, write_sentinel};

use super::CancelSignal;
use super::backend::{LaunchContext, ProcessExit, TaskBackend};

/// Wraps a [`TaskBackend`] with the sentinel protocol.
///
/// The previous sentinel is removed before the task starts, so a task that
/// fails or is interrupted is always stale afterwards. A new sentinel is
/// written only once every declared output exists.
#[derive(Debug)]
pub struct Executor<'a, S: ArtifactStore + ?Sized, B: TaskBackend + ?Sized> {
    registry: &'a Registry,
    params: &'a Params,
    store: &'a S,
    backend: &'a B,
}

impl<'a, S, B> Executor<'a, S, B>
where
    S: ArtifactStore + ?Sized,
    B: TaskBackend + ?Sized,
{
    pub fn new(registry: &'a Registry, params: &'a Params, store: &'a S, backend: &'a B) -> Self {
        Self {
            registry,
            params,
            store,
            backend,
        }
    }

    /// Run `task`. `Err` is reserved for store failures around the task;
    /// anything that goes wrong with the task itself is a
    /// [`TaskOutcome::Failed`].
    pub async fn run(&self, task: &Task, cancel: CancelSignal) -> Result<TaskOutcome> {
        if *cancel.borrow() {
            return Ok(TaskOutcome::Failed(TaskFailure::Cancelled));
        }

        if self.store.remove(&task.sentinel)? {
            debug!(task = %task.name, sentinel = ?task.sentinel, "removed previous sentinel");
        }
        self.prepare_dirs(task)?;

        if task.is_aggregate() {
            debug!(task = %task.name, "aggregate task; nothing to launch");
        } else {
            let ctx = LaunchContext {
                workdir: self.store.root().to_path_buf(),
                log_file: self.store.resolve(&task.log),
            };

            let exit = match self.backend.launch(task, ctx, cancel).await {
                Ok(exit) => exit,
                Err(err) => {
                    return Ok(TaskOutcome::Failed(TaskFailure::SpawnFailed(format!(
                        "{err:#}"
                    ))));
                }
            };

            match exit {
                ProcessExit::Cancelled => return Ok(TaskOutcome::Failed(TaskFailure::Cancelled)),
                ProcessExit::Exited { code, stderr_tail } if code != 0 => {
                    return Ok(TaskOutcome::Failed(TaskFailure::NonZeroExit {
                        code,
                        stderr_tail,
                    }));
                }
                ProcessExit::Exited { .. } => {}
            }
        }

        let missing: Vec<PathBuf> = task
            .outputs
            .iter()
            .filter(|p| !self.store.exists(p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(task = %task.name, ?missing, "task exited successfully but outputs are missing");
            return Ok(TaskOutcome::Failed(TaskFailure::IncompleteOutputs { missing }));
        }

        let record = self.completion_record(task);
        write_sentinel(self.store, &task.sentinel, &record)?;
        info!(
            task = %task.name,
            fingerprint = %record.fingerprint.short(),
            "task completed; sentinel written"
        );

        Ok(TaskOutcome::Success)
    }

    fn prepare_dirs(&self, task: &Task) -> Result<()> {
        let files = task
            .outputs
            .iter()
            .chain([&task.sentinel, &task.log]);
        for file in files {
            if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
                self.store.create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Sentinel for a successful run: current fingerprint plus the completion
    /// time of every enabled direct dependency.
    fn completion_record(&self, task: &Task) -> SentinelRecord {
        let mut record =
            SentinelRecord::new(task.name.clone(), Fingerprint::compute(self.params, &task.scope));

        for dep in task.deps.iter().filter_map(|d| self.registry.get(d)) {
            if !dep.enabled {
                continue;
            }
            match read_sentinel(self.store, &dep.sentinel) {
                Ok(Some(upstream)) => {
                    record.upstream.insert(dep.name.clone(), upstream.completed_at);
                }
                Ok(None) => {
                    warn!(task = %task.name, upstream = %dep.name, "upstream has no sentinel");
                }
                Err(e) => {
                    warn!(task = %task.name, upstream = %dep.name, error = %e, "cannot read upstream sentinel");
                }
            }
        }

        record
    }
}

