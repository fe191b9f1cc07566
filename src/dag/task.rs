// src/dag/task.rs

//! Task descriptors: the registration input ([`TaskSpec`]) and the resolved,
//! immutable form held by the registry ([`Task`]).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::model::TaskConfig;
use crate::types::TaskName;

/// How a task's external work is launched.
///
/// In a [`TaskSpec`] the strings are templates; in a registered [`Task`] they
/// have been rendered against the parameter snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A command line run through the platform shell.
    Shell { command: String },
    /// A program executed directly with an argument vector.
    Program { program: String, args: Vec<String> },
    /// No external process; the task only groups its dependencies.
    Aggregate,
}

impl Invocation {
    pub fn shell(command: impl Into<String>) -> Self {
        Invocation::Shell {
            command: command.into(),
        }
    }

    pub fn program<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Invocation::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// All template strings carried by this invocation.
    pub(crate) fn templates(&self) -> Vec<&str> {
        match self {
            Invocation::Shell { command } => vec![command.as_str()],
            Invocation::Program { program, args } => std::iter::once(program.as_str())
                .chain(args.iter().map(String::as_str))
                .collect(),
            Invocation::Aggregate => Vec::new(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Shell { command } => write!(f, "{command}"),
            Invocation::Program { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Invocation::Aggregate => f.write_str("(aggregate)"),
        }
    }
}

/// Registration input for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: TaskName,
    pub after: Vec<TaskName>,
    pub outputs: Vec<PathBuf>,
    pub sentinel: Option<PathBuf>,
    pub log: Option<PathBuf>,
    /// Explicit fingerprint scope; `None` derives it from the invocation.
    pub scope: Option<Vec<String>>,
    pub invocation: Invocation,
    pub enabled: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            outputs: Vec::new(),
            sentinel: None,
            log: None,
            scope: None,
            invocation: Invocation::Aggregate,
            enabled: true,
        }
    }

    pub fn after(mut self, dep: impl Into<TaskName>) -> Self {
        self.after.push(dep.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn sentinel(mut self, path: impl Into<PathBuf>) -> Self {
        self.sentinel = Some(path.into());
        self
    }

    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log = Some(path.into());
        self
    }

    /// Add keys to the fingerprint scope (switches off scope derivation).
    pub fn params<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.scope
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = invocation;
        self
    }

    pub fn shell(self, command: impl Into<String>) -> Self {
        self.invocation(Invocation::shell(command))
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build a spec from a `[task.<name>]` table.
    pub fn from_config(name: &str, cfg: &TaskConfig) -> Self {
        let invocation = match (&cfg.cmd, &cfg.program) {
            (Some(cmd), _) => Invocation::shell(cmd.clone()),
            (None, Some(program)) => Invocation::program(program.clone(), cfg.args.clone()),
            (None, None) => Invocation::Aggregate,
        };

        Self {
            name: name.to_string(),
            after: cfg.after.clone(),
            outputs: cfg.outputs.iter().map(PathBuf::from).collect(),
            sentinel: cfg.sentinel.as_ref().map(PathBuf::from),
            log: cfg.log.as_ref().map(PathBuf::from),
            scope: cfg.params.clone(),
            invocation,
            enabled: cfg.is_enabled(),
        }
    }
}

/// A registered task. Immutable for the lifetime of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: TaskName,
    /// Registration position; the topological tie-break.
    pub index: usize,
    /// Direct dependencies, in declaration order.
    pub deps: Vec<TaskName>,
    /// Declared outputs, relative to the artifact root.
    pub outputs: Vec<PathBuf>,
    pub sentinel: PathBuf,
    pub log: PathBuf,
    /// Sorted, de-duplicated fingerprint scope.
    pub scope: Vec<String>,
    /// Rendered invocation.
    pub invocation: Invocation,
    pub enabled: bool,
}

impl Task {
    /// Directory holding the sentinel; `{task.outdir}` in templates.
    pub fn outdir(&self) -> &Path {
        self.sentinel.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.invocation, Invocation::Aggregate)
    }
}

/// Default sentinel location: next to the first output, or in the state
/// directory for tasks without outputs.
pub(crate) fn default_sentinel_path(name: &str, outputs: &[PathBuf], state_dir: &Path) -> PathBuf {
    let file = format!("{name}.sentinel");
    match outputs.first().and_then(|o| o.parent()) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file),
        Some(_) => PathBuf::from(file),
        None => state_dir.join(file),
    }
}

/// Default log location: the sentinel path with a `.log` extension.
pub(crate) fn default_log_path(sentinel: &Path) -> PathBuf {
    sentinel.with_extension("log")
}
