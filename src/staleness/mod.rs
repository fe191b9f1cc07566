// src/staleness/mod.rs

//! Staleness evaluation.
//!
//! Decides, per task, whether its recorded completion still reflects the
//! current outputs, parameters and upstream results. Evaluation is a pure
//! query over the registry, the parameter snapshot and the artifact store.

pub mod fingerprint;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{trace, warn};

use crate::config::Params;
use crate::dag::{Registry, Task};
use crate::errors::{PipedagError, Result};
use crate::store::{ArtifactStore, read_sentinel};
use crate::types::TaskName;

pub use fingerprint::Fingerprint;

/// Why a task must (re-)run. Variants are listed in detection priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// A declared output artifact is absent.
    MissingOutput { path: PathBuf },
    /// No usable sentinel is recorded.
    MissingSentinel,
    /// The sentinel was written under different parameters.
    FingerprintMismatch {
        recorded: Fingerprint,
        current: Fingerprint,
    },
    /// A dependency is stale, or has completed again since this task ran.
    UpstreamRerun { upstream: TaskName },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingOutput { path } => write!(f, "missing output {}", path.display()),
            StaleReason::MissingSentinel => f.write_str("no sentinel"),
            StaleReason::FingerprintMismatch { recorded, current } => write!(
                f,
                "parameters changed ({} -> {})",
                recorded.short(),
                current.short()
            ),
            StaleReason::UpstreamRerun { upstream } => write!(f, "upstream '{upstream}' reran"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// The task is switched off; it never runs and never invalidates
    /// dependents.
    Disabled,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }

    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            Staleness::Stale(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Fresh => f.write_str("fresh"),
            Staleness::Disabled => f.write_str("disabled"),
            Staleness::Stale(reason) => write!(f, "stale: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Evaluation {
    staleness: Staleness,
    /// Completion time from the sentinel, for fresh tasks only.
    completed_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    fn stale(reason: StaleReason) -> Self {
        Self {
            staleness: Staleness::Stale(reason),
            completed_at: None,
        }
    }
}

/// Evaluates tasks against one snapshot of the store.
///
/// Results are memoized, so one evaluator should not outlive the store
/// state it observed (build a new one after running tasks).
#[derive(Debug)]
pub struct StalenessEvaluator<'a, S: ArtifactStore + ?Sized> {
    registry: &'a Registry,
    params: &'a Params,
    store: &'a S,
    memo: HashMap<usize, Evaluation>,
}

impl<'a, S: ArtifactStore + ?Sized> StalenessEvaluator<'a, S> {
    pub fn new(registry: &'a Registry, params: &'a Params, store: &'a S) -> Self {
        Self {
            registry,
            params,
            store,
            memo: HashMap::new(),
        }
    }

    /// Evaluate one task (and, as needed, its dependencies).
    pub fn evaluate(&mut self, name: &str) -> Result<Staleness> {
        let idx = self.registry.require(name)?.index;
        Ok(self.evaluate_index(idx)?.staleness)
    }

    fn evaluate_index(&mut self, idx: usize) -> Result<Evaluation> {
        if let Some(found) = self.memo.get(&idx) {
            return Ok(found.clone());
        }

        let registry = self.registry;
        let task = registry.by_index(idx);
        let evaluation = self.evaluate_task(task)?;
        trace!(task = %task.name, staleness = %evaluation.staleness, "evaluated task");

        self.memo.insert(idx, evaluation.clone());
        Ok(evaluation)
    }

    fn evaluate_task(&mut self, task: &Task) -> Result<Evaluation> {
        if !task.enabled {
            return Ok(Evaluation {
                staleness: Staleness::Disabled,
                completed_at: None,
            });
        }

        if let Some(path) = task.outputs.iter().find(|p| !self.store.exists(p)) {
            return Ok(Evaluation::stale(StaleReason::MissingOutput { path: path.clone() }));
        }

        let record = match read_sentinel(self.store, &task.sentinel) {
            Ok(Some(record)) if record.task == task.name => record,
            Ok(Some(record)) => {
                warn!(
                    task = %task.name,
                    recorded_task = %record.task,
                    sentinel = ?task.sentinel,
                    "sentinel belongs to another task; ignoring it"
                );
                return Ok(Evaluation::stale(StaleReason::MissingSentinel));
            }
            Ok(None) => return Ok(Evaluation::stale(StaleReason::MissingSentinel)),
            Err(PipedagError::Sentinel(msg)) => {
                warn!(task = %task.name, error = %msg, "unreadable sentinel; treating as missing");
                return Ok(Evaluation::stale(StaleReason::MissingSentinel));
            }
            Err(e) => return Err(e),
        };

        let current = Fingerprint::compute(self.params, &task.scope);
        if record.fingerprint != current {
            return Ok(Evaluation::stale(StaleReason::FingerprintMismatch {
                recorded: record.fingerprint,
                current,
            }));
        }

        for dep in &task.deps {
            let dep_idx = self.registry.require(dep)?.index;
            let dep_eval = self.evaluate_index(dep_idx)?;
            let upstream_changed = match dep_eval.staleness {
                Staleness::Disabled => false,
                Staleness::Stale(_) => true,
                Staleness::Fresh => record.upstream.get(dep) != dep_eval.completed_at.as_ref(),
            };
            if upstream_changed {
                return Ok(Evaluation::stale(StaleReason::UpstreamRerun {
                    upstream: dep.clone(),
                }));
            }
        }

        Ok(Evaluation {
            staleness: Staleness::Fresh,
            completed_at: Some(record.completed_at),
        })
    }
}
