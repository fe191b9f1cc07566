// src/engine/pipeline.rs

use std::fmt;

use tracing::{error, info};

use crate::config::{ConfigFile, Params};
use crate::dag::{ExecutionPlan, Registry, Scheduler};
use crate::errors::Result;
use crate::exec::{CancelSignal, Executor, TaskBackend};
use crate::staleness::Staleness;
use crate::store::{ArtifactStore, FsArtifactStore};
use crate::types::{Target, TaskName};

use super::{RunReport, TaskFailure, TaskOutcome};

/// Top-level driver: one registry, one parameter snapshot, one store and
/// the backend that runs task invocations.
pub struct Pipeline<S: ArtifactStore, B: TaskBackend> {
    registry: Registry,
    params: Params,
    store: S,
    backend: B,
}

impl<S: ArtifactStore, B: TaskBackend> fmt::Debug for Pipeline<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.registry.len())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<B: TaskBackend> Pipeline<FsArtifactStore, B> {
    /// Build the registry described by `cfg`, rooted at its artifact root.
    pub fn from_config(cfg: &ConfigFile, backend: B) -> Result<Self> {
        let registry = Registry::from_config(cfg)?;
        let store = FsArtifactStore::new(cfg.artifact_root());
        Ok(Self::new(registry, cfg.params.clone(), store, backend))
    }
}

impl<S: ArtifactStore, B: TaskBackend> Pipeline<S, B> {
    pub fn new(registry: Registry, params: Params, store: S, backend: B) -> Self {
        Self {
            registry,
            params,
            store,
            backend,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn scheduler(&self) -> Scheduler<'_, S> {
        Scheduler::new(&self.registry, &self.params, &self.store)
    }

    pub fn plan(&self, target: &Target) -> Result<ExecutionPlan> {
        self.scheduler().plan(target)
    }

    pub fn status(&self) -> Result<Vec<(TaskName, Staleness)>> {
        self.scheduler().status()
    }

    /// Remove `task`'s sentinel so it (and everything downstream) reruns.
    /// Returns whether a sentinel existed.
    pub fn invalidate(&self, task: &str) -> Result<bool> {
        let task = self.registry.require(task)?;
        let removed = self.store.remove(&task.sentinel)?;
        info!(task = %task.name, removed, "invalidated task");
        Ok(removed)
    }

    /// Run the stale part of `target`'s closure, in order, stopping at the
    /// first failure.
    pub async fn execute(&self, target: &Target, cancel: CancelSignal) -> Result<RunReport> {
        let plan = self.plan(target)?;
        if plan.is_empty() {
            info!(target = %target, fresh = plan.fresh.len(), "all tasks up to date");
            return Ok(RunReport::AllFresh);
        }

        info!(target = %target, tasks = ?plan.task_names(), "executing plan");

        let executor = Executor::new(&self.registry, &self.params, &self.store, &self.backend);
        let mut ran = Vec::with_capacity(plan.len());

        for step in &plan.steps {
            let task = self.registry.require(&step.name)?;
            info!(task = %task.name, reason = %step.reason, "running task");

            match executor.run(task, cancel.clone()).await? {
                TaskOutcome::Success => ran.push(task.name.clone()),
                TaskOutcome::Failed(failure) => {
                    error!(task = %task.name, %failure, "task failed; halting run");
                    if let TaskFailure::NonZeroExit { stderr_tail, .. } = &failure {
                        for line in stderr_tail {
                            error!(task = %task.name, "stderr: {}", line);
                        }
                    }
                    return Ok(RunReport::Failed {
                        task: task.name.clone(),
                        failure,
                        ran,
                    });
                }
            }
        }

        info!(target = %target, ran = ran.len(), "run completed");
        Ok(RunReport::Completed { ran })
    }
}
