// src/dag/registry.rs

//! Task descriptor registry.
//!
//! Tasks are registered through a [`RegistryBuilder`], which renders each
//! invocation against the parameter snapshot as it goes. A task may only
//! depend on tasks registered before it, so the builder's graph is acyclic
//! by construction. [`Registry::from_config`] orders `[task.<name>]` entries
//! so that each follows its dependencies, and that is where a cyclic config
//! is rejected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{ConfigFile, Params, TaskConfig};
use crate::dag::graph::DagGraph;
use crate::dag::task::{Invocation, Task, TaskSpec, default_log_path, default_sentinel_path};
use crate::dag::template::{self, TaskFacts};
use crate::errors::{PipedagError, Result};
use crate::pipelines;
use crate::types::TaskName;

/// Collects task specs; see [`finalize`](Self::finalize).
#[derive(Debug)]
pub struct RegistryBuilder<'p> {
    params: &'p Params,
    state_dir: PathBuf,
    tasks: Vec<Task>,
    by_name: HashMap<TaskName, usize>,
}

impl<'p> RegistryBuilder<'p> {
    pub fn new(params: &'p Params) -> Self {
        Self {
            params,
            state_dir: PathBuf::from(".pipedag"),
            tasks: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Directory for sentinels of tasks that declare no outputs.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn params(&self) -> &Params {
        self.params
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Register one task, rendering its invocation.
    ///
    /// Fails with [`PipedagError::UnknownDependency`] if a dependency is not
    /// registered yet, which includes the task itself.
    pub fn register(&mut self, spec: TaskSpec) -> Result<()> {
        if self.by_name.contains_key(&spec.name) {
            return Err(PipedagError::DuplicateTask(spec.name));
        }
        if let Some(dep) = spec.after.iter().find(|d| !self.by_name.contains_key(*d)) {
            return Err(PipedagError::UnknownDependency {
                dependency: dep.clone(),
                task: spec.name,
            });
        }

        let task = self.resolve(spec)?;
        debug!(task = %task.name, index = task.index, deps = ?task.deps, "registered task");
        self.by_name.insert(task.name.clone(), task.index);
        self.tasks.push(task);
        Ok(())
    }

    fn resolve(&self, spec: TaskSpec) -> Result<Task> {
        let sentinel = spec
            .sentinel
            .clone()
            .unwrap_or_else(|| default_sentinel_path(&spec.name, &spec.outputs, &self.state_dir));
        let log = spec.log.clone().unwrap_or_else(|| default_log_path(&sentinel));
        let outdir = sentinel.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let facts = TaskFacts {
            name: &spec.name,
            log: &log,
            outdir: &outdir,
            outputs: &spec.outputs,
        };

        let templates = spec.invocation.templates();
        let rendered = templates
            .iter()
            .map(|t| {
                template::render(t, self.params, &facts).map_err(|message| PipedagError::Template {
                    task: spec.name.clone(),
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let invocation = match &spec.invocation {
            Invocation::Shell { .. } => Invocation::Shell {
                command: rendered.into_iter().next().unwrap_or_default(),
            },
            Invocation::Program { .. } => {
                let mut parts = rendered.into_iter();
                let program = parts.next().unwrap_or_default();
                if program.trim().is_empty() {
                    return Err(PipedagError::Template {
                        task: spec.name.clone(),
                        message: "program renders to an empty string".to_string(),
                    });
                }
                Invocation::Program {
                    program,
                    args: parts.filter(|a| !a.is_empty()).collect(),
                }
            }
            Invocation::Aggregate => Invocation::Aggregate,
        };

        let mut scope = match spec.scope {
            Some(keys) => keys,
            None => templates
                .iter()
                .flat_map(|t| template::referenced_params(t))
                .collect(),
        };
        scope.sort();
        scope.dedup();

        Ok(Task {
            name: spec.name,
            index: self.tasks.len(),
            deps: spec.after,
            outputs: spec.outputs,
            sentinel,
            log,
            scope,
            invocation,
            enabled: spec.enabled,
        })
    }

    /// Freeze the registry and compute its topological order.
    pub fn finalize(self) -> Result<Registry> {
        let mut graph = DagGraph::with_nodes(self.tasks.len());

        for task in &self.tasks {
            for dep in &task.deps {
                let dep_idx = self.by_name.get(dep).copied().ok_or_else(|| {
                    PipedagError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                graph.add_dependency(task.index, dep_idx);
            }
        }

        let order = graph.stable_topological_order();
        debug!(tasks = self.tasks.len(), "task registry finalized");

        Ok(Registry {
            tasks: self.tasks,
            by_name: self.by_name,
            graph,
            order,
        })
    }
}

/// Order `[task.<name>]` entries so that each comes after its dependencies,
/// keeping document order otherwise.
///
/// Fails with [`PipedagError::UnknownDependency`] for a name that is neither
/// a config task nor already registered, and with [`PipedagError::DagCycle`]
/// if the config tasks depend on each other in a cycle.
fn config_registration_order(
    builder: &RegistryBuilder<'_>,
    tasks: &[(TaskName, TaskConfig)],
) -> Result<Vec<usize>> {
    let positions: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(pos, (name, _))| (name.as_str(), pos))
        .collect();

    let mut graph = DagGraph::with_nodes(tasks.len());
    for (pos, (name, tc)) in tasks.iter().enumerate() {
        for dep in &tc.after {
            match positions.get(dep.as_str()) {
                Some(&dep_pos) => graph.add_dependency(pos, dep_pos),
                None if builder.contains(dep) => {}
                None => {
                    return Err(PipedagError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
    }

    if let Some(members) = graph.find_cycle() {
        let names = members
            .iter()
            .map(|&pos| format!("'{}'", tasks[pos].0))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PipedagError::DagCycle(format!(
            "cycle detected in task DAG involving {names}"
        )));
    }

    Ok(graph.stable_topological_order())
}

/// Immutable, validated task graph.
#[derive(Debug, Clone)]
pub struct Registry {
    tasks: Vec<Task>,
    by_name: HashMap<TaskName, usize>,
    graph: DagGraph,
    /// Stable topological order of all task indices.
    order: Vec<usize>,
}

impl Registry {
    /// Build the registry described by a validated config: the built-in
    /// pipeline's stages first (if any), then `[task.<name>]` entries in
    /// document order, except that a task declared before one of its
    /// dependencies is moved after it.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut builder =
            RegistryBuilder::new(&cfg.params).with_state_dir(cfg.config.state_dir.clone());

        if let Some(name) = cfg.config.pipeline.as_deref() {
            pipelines::register_builtin(name, &mut builder)?;
        }

        for pos in config_registration_order(&builder, &cfg.task)? {
            let (name, tc) = &cfg.task[pos];
            builder.register(TaskSpec::from_config(name, tc))?;
        }

        builder.finalize()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.by_name.get(name).map(|&idx| &self.tasks[idx])
    }

    /// Like [`get`](Self::get) but fails with [`PipedagError::NoSuchTask`].
    pub fn require(&self, name: &str) -> Result<&Task> {
        self.get(name)
            .ok_or_else(|| PipedagError::NoSuchTask(name.to_string()))
    }

    pub(crate) fn by_index(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    /// Task names in registration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Immediate dependencies of a task (its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.get(name).map(|t| t.deps.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task, in registration order.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut dependents = self.graph.dependents_of(idx).to_vec();
        dependents.sort_unstable();
        dependents
            .into_iter()
            .map(|i| self.tasks[i].name.as_str())
            .collect()
    }

    /// Everything `name` transitively depends on (excluding itself), in
    /// topological order.
    pub fn transitive_dependencies(&self, name: &str) -> Result<Vec<&Task>> {
        let idx = self.require(name)?.index;
        let mut closure = self.graph.dependency_closure(idx);
        closure.remove(&idx);
        Ok(self.ordered(|i| closure.contains(&i)))
    }

    /// Everything that transitively depends on `name` (excluding itself), in
    /// topological order.
    pub fn transitive_dependents(&self, name: &str) -> Result<Vec<&Task>> {
        let idx = self.require(name)?.index;
        let mut closure = self.graph.dependent_closure(idx);
        closure.remove(&idx);
        Ok(self.ordered(|i| closure.contains(&i)))
    }

    /// All tasks in stable topological order (registration order breaks ties).
    pub fn topological_order(&self) -> Vec<&Task> {
        self.ordered(|_| true)
    }

    /// `root` and its full dependency closure, in topological order.
    pub fn subgraph_order(&self, root: &str) -> Result<Vec<&Task>> {
        let idx = self.require(root)?.index;
        let closure = self.graph.dependency_closure(idx);
        Ok(self.ordered(|i| closure.contains(&i)))
    }

    fn ordered<F: Fn(usize) -> bool>(&self, keep: F) -> Vec<&Task> {
        self.order
            .iter()
            .copied()
            .filter(|&i| keep(i))
            .map(|i| &self.tasks[i])
            .collect()
    }
}
