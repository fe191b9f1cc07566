// src/types.rs

use std::fmt;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// What an invocation asks for: one task (plus its dependency closure) or
/// the whole registered pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    All,
    Task(TaskName),
}

impl Target {
    pub fn task(name: impl Into<TaskName>) -> Self {
        Target::Task(name.into())
    }
}

impl From<Option<String>> for Target {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) => Target::Task(name),
            None => Target::All,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("<all>"),
            Target::Task(name) => f.write_str(name),
        }
    }
}
