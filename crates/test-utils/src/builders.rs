use std::path::PathBuf;

use toml::{Table, Value};

use pipedag::config::{ConfigFile, RawConfigFile, TaskConfig};
use pipedag::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    raw: RawConfigFile,
    base_dir: PathBuf,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawConfigFile::default(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn pipeline(mut self, name: &str) -> Self {
        self.raw.config.pipeline = Some(name.to_string());
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.raw.config.root = Some(root.into());
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.config.state_dir = dir.into();
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Set a parameter by dotted key, creating intermediate tables.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        set_dotted(&mut self.raw.params, key, value.into());
        self
    }

    /// Merge a TOML snippet into `[params]`.
    pub fn params_toml(mut self, snippet: &str) -> Self {
        let table: Table = toml::from_str(snippet).expect("params snippet must be valid TOML");
        for (key, value) in table {
            self.raw.params.insert(key, value);
        }
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfigBuilder) -> Self {
        self.raw
            .task
            .insert(name.to_string(), Value::Table(task.into_table()));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.raw
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        let base_dir = self.base_dir;
        ConfigFile::try_from(self.raw).map(|cfg| cfg.with_base_dir(base_dir))
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn set_dotted(table: &mut Table, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            if let Value::Table(inner) = entry {
                set_dotted(inner, rest, value);
            }
        }
    }
}

/// Builder for `TaskConfig`.
#[derive(Debug, Clone, Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Task running `cmd` through the shell.
    pub fn shell(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task executing `program` directly.
    pub fn program(program: &str, args: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                program: Some(program.to_string()),
                args: args.iter().map(|a| a.to_string()).collect(),
                ..TaskConfig::default()
            },
        }
    }

    /// Task without an external command.
    pub fn aggregate() -> Self {
        Self::default()
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.outputs.push(path.to_string());
        self
    }

    pub fn sentinel(mut self, path: &str) -> Self {
        self.task.sentinel = Some(path.to_string());
        self
    }

    pub fn log(mut self, path: &str) -> Self {
        self.task.log = Some(path.to_string());
        self
    }

    pub fn params(mut self, keys: &[&str]) -> Self {
        self.task.params = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.task.enabled = Some(enabled);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }

    /// The `[task.<name>]` table this task would be written as.
    pub fn into_table(self) -> Table {
        let t = self.task;
        let strings = |v: Vec<String>| Value::Array(v.into_iter().map(Value::String).collect());

        let mut table = Table::new();
        if let Some(cmd) = t.cmd {
            table.insert("cmd".into(), Value::String(cmd));
        }
        if let Some(program) = t.program {
            table.insert("program".into(), Value::String(program));
        }
        if !t.args.is_empty() {
            table.insert("args".into(), strings(t.args));
        }
        if !t.after.is_empty() {
            table.insert("after".into(), strings(t.after));
        }
        if !t.outputs.is_empty() {
            table.insert("outputs".into(), strings(t.outputs));
        }
        if let Some(sentinel) = t.sentinel {
            table.insert("sentinel".into(), Value::String(sentinel));
        }
        if let Some(log) = t.log {
            table.insert("log".into(), Value::String(log));
        }
        if let Some(params) = t.params {
            table.insert("params".into(), strings(params));
        }
        if let Some(enabled) = t.enabled {
            table.insert("enabled".into(), Value::Boolean(enabled));
        }
        table
    }
}
