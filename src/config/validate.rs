// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::config::params::Params;
use crate::errors::{PipedagError, Result};
use crate::pipelines;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tasks = parse_tasks(&raw)?;
        validate_global_config(&raw, &tasks)?;
        for (name, task) in tasks.iter() {
            validate_task(name, task)?;
        }
        Ok(ConfigFile::new_unchecked(
            raw.config,
            Params::new(raw.params),
            tasks,
        ))
    }
}

/// Deserialize each `[task.<name>]` table, keeping document order.
fn parse_tasks(raw: &RawConfigFile) -> Result<Vec<(String, TaskConfig)>> {
    let mut tasks = Vec::with_capacity(raw.task.len());
    for (name, value) in raw.task.iter() {
        if !value.is_table() {
            return Err(PipedagError::ConfigError(format!(
                "task '{name}' must be a table ([task.{name}])"
            )));
        }
        let task: TaskConfig = value.clone().try_into()?;
        tasks.push((name.clone(), task));
    }
    Ok(tasks)
}

fn validate_global_config(raw: &RawConfigFile, tasks: &[(String, TaskConfig)]) -> Result<()> {
    match raw.config.pipeline.as_deref() {
        Some(name) if !pipelines::is_builtin(name) => {
            return Err(PipedagError::ConfigError(format!(
                "[config].pipeline = \"{name}\" is not a built-in pipeline (known: {})",
                pipelines::BUILTIN_NAMES.join(", ")
            )));
        }
        Some(_) => {}
        None => {
            if tasks.is_empty() {
                return Err(PipedagError::ConfigError(
                    "config must set [config].pipeline or contain at least one [task.<name>] section"
                        .to_string(),
                ));
            }
        }
    }

    if raw.config.state_dir.as_os_str().is_empty() {
        return Err(PipedagError::ConfigError(
            "[config].state_dir must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipedagError::ConfigError(
            "task names must not be empty".to_string(),
        ));
    }

    if task.cmd.is_some() && task.program.is_some() {
        return Err(PipedagError::ConfigError(format!(
            "task '{name}' sets both `cmd` and `program`; choose one"
        )));
    }

    if task.program.is_none() && !task.args.is_empty() {
        return Err(PipedagError::ConfigError(format!(
            "task '{name}' sets `args` without `program`"
        )));
    }

    if task.after.iter().any(|dep| dep == name) {
        return Err(PipedagError::ConfigError(format!(
            "task '{name}' cannot depend on itself in `after`"
        )));
    }

    if task.outputs.iter().any(|o| o.trim().is_empty()) {
        return Err(PipedagError::ConfigError(format!(
            "task '{name}' declares an empty output path"
        )));
    }

    Ok(())
}
