// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::params::Params;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// pipeline = "wgcna"          # optional built-in stage registry
/// root = "."                  # artifact root, relative to this file
///
/// [params.clean]
/// min_fraction = 0.5
///
/// [task.clean]
/// program = "Rscript"
/// args = ["{wgcna_dir}/R/wgcna_data_cleaning.R", "--minfraction={clean.min_fraction}"]
/// outputs = ["wgcna.dir/clean.dir/clean.RData"]
/// ```
///
/// `task` is kept as an ordered TOML table so that document order becomes
/// registration order.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Free-form parameter document consulted by templates and fingerprints.
    #[serde(default)]
    pub params: toml::Table,

    /// All tasks from `[task.<name>]`, in document order.
    #[serde(default)]
    pub task: toml::Table,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Name of a built-in pipeline whose stages are registered before any
    /// `[task.<name>]` entries.
    #[serde(default)]
    pub pipeline: Option<String>,

    /// Directory that task outputs, sentinels and logs are relative to.
    ///
    /// Relative values are resolved against the config file's directory.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory (under `root`) for sentinels of tasks without outputs.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".pipedag")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            pipeline: None,
            root: None,
            state_dir: default_state_dir(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command line (run through `sh -c`).
    #[serde(default)]
    pub cmd: Option<String>,

    /// Program to exec directly; mutually exclusive with `cmd`.
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments for `program`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Declared output artifacts, relative to the artifact root.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Explicit sentinel path; defaults next to the first output.
    #[serde(default)]
    pub sentinel: Option<String>,

    /// Explicit log path; defaults to the sentinel path with a `.log` extension.
    #[serde(default)]
    pub log: Option<String>,

    /// Fingerprint scope (dotted `[params]` keys).
    ///
    /// If `None`, the keys referenced by the command templates are used.
    #[serde(default)]
    pub params: Option<Vec<String>>,

    /// Disabled tasks never run and never make dependents stale.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl TaskConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Validated configuration.
///
/// Construct via `ConfigFile::try_from(RawConfigFile)` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub params: Params,
    /// Tasks in document order.
    pub task: Vec<(String, TaskConfig)>,
    base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        params: Params,
        task: Vec<(String, TaskConfig)>,
    ) -> Self {
        Self {
            config,
            params,
            task,
            base_dir: PathBuf::from("."),
        }
    }

    /// Record the directory the config was loaded from; relative `root`
    /// values resolve against it.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Effective artifact root directory.
    pub fn artifact_root(&self) -> PathBuf {
        match &self.config.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => self.base_dir.join(root),
            None => self.base_dir.clone(),
        }
    }

    pub fn task_config(&self, name: &str) -> Option<&TaskConfig> {
        self.task.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}
