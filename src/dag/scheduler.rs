// src/dag/scheduler.rs

use tracing::debug;

use crate::config::Params;
use crate::dag::plan::{ExecutionPlan, PlannedTask};
use crate::dag::registry::Registry;
use crate::dag::task::Task;
use crate::errors::Result;
use crate::staleness::{Staleness, StalenessEvaluator};
use crate::store::ArtifactStore;
use crate::types::{Target, TaskName};

/// Computes execution plans over an immutable registry.
///
/// The scheduler holds no per-run state: every call builds a fresh
/// [`StalenessEvaluator`] against the current store contents.
#[derive(Debug)]
pub struct Scheduler<'a, S: ArtifactStore + ?Sized> {
    registry: &'a Registry,
    params: &'a Params,
    store: &'a S,
}

impl<'a, S: ArtifactStore + ?Sized> Scheduler<'a, S> {
    pub fn new(registry: &'a Registry, params: &'a Params, store: &'a S) -> Self {
        Self {
            registry,
            params,
            store,
        }
    }

    /// The stale tasks of `target`'s closure, in topological order.
    ///
    /// Fresh tasks are left out of the step list but still take part in the
    /// ordering, so a plan never reorders around them.
    pub fn plan(&self, target: &Target) -> Result<ExecutionPlan> {
        let closure = self.closure(target)?;
        let mut evaluator = StalenessEvaluator::new(self.registry, self.params, self.store);

        let mut steps = Vec::new();
        let mut fresh = Vec::new();

        for task in closure {
            match evaluator.evaluate(&task.name)? {
                Staleness::Stale(reason) => steps.push(PlannedTask {
                    name: task.name.clone(),
                    reason,
                }),
                Staleness::Fresh => fresh.push(task.name.clone()),
                Staleness::Disabled => {}
            }
        }

        debug!(
            target = %target,
            stale = steps.len(),
            fresh = fresh.len(),
            "computed execution plan"
        );

        Ok(ExecutionPlan {
            target: target.clone(),
            steps,
            fresh,
        })
    }

    /// Staleness of every registered task, in topological order.
    pub fn status(&self) -> Result<Vec<(TaskName, Staleness)>> {
        let mut evaluator = StalenessEvaluator::new(self.registry, self.params, self.store);
        self.registry
            .topological_order()
            .into_iter()
            .map(|task| Ok((task.name.clone(), evaluator.evaluate(&task.name)?)))
            .collect()
    }

    fn closure(&self, target: &Target) -> Result<Vec<&'a Task>> {
        match target {
            Target::All => Ok(self.registry.topological_order()),
            Target::Task(name) => self.registry.subgraph_order(name),
        }
    }
}
