// src/dag/template.rs

//! Placeholder rendering for task invocations.
//!
//! - `{a.b}` is replaced by the parameter at dotted path `a.b`; a missing
//!   parameter is an error.
//! - `{a.b?}` is replaced by the parameter, or by nothing when unset.
//! - `{task.name}`, `{task.log}`, `{task.outdir}` and `{task.outputs}` insert
//!   facts about the task being registered. Any other `task.` key is an
//!   error, even when a parameter of that name exists.
//! - `${...}` is shell syntax and is left untouched.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use toml::Value;

use crate::config::Params;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\$?)\{([A-Za-z_][A-Za-z0-9_.\-]*)(\?)?\}").expect("placeholder regex is valid")
    })
}

/// Facts about the task that templates may reference.
#[derive(Debug, Clone, Copy)]
pub struct TaskFacts<'a> {
    pub name: &'a str,
    pub log: &'a Path,
    pub outdir: &'a Path,
    pub outputs: &'a [PathBuf],
}

impl TaskFacts<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "task.name" => Some(self.name.to_string()),
            "task.log" => Some(path_str(self.log)),
            "task.outdir" => Some(path_str(self.outdir)),
            "task.outputs" => Some(
                self.outputs
                    .iter()
                    .map(|p| path_str(p))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        }
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Render every placeholder in `template`.
///
/// The error string names the offending placeholder; callers wrap it with
/// the task name.
pub fn render(template: &str, params: &Params, facts: &TaskFacts<'_>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        if is_shell_expansion(&caps) {
            out.push_str(whole.as_str());
            continue;
        }

        let key = &caps[2];
        let optional = caps.get(3).is_some();

        if key.starts_with("task.") {
            match facts.lookup(key) {
                Some(fact) => out.push_str(&fact),
                None => return Err(format!("unknown task field '{key}' in template {template:?}")),
            }
            continue;
        }

        match params.get(key) {
            Some(value) => out.push_str(
                &render_value(value).map_err(|e| format!("parameter '{key}' {e}"))?,
            ),
            None if optional => {}
            None => return Err(format!("unknown parameter '{key}' in template {template:?}")),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Parameter keys referenced by `template` (task facts and shell expansions
/// excluded), in order of appearance.
pub fn referenced_params(template: &str) -> Vec<String> {
    placeholder_re()
        .captures_iter(template)
        .filter(|caps| !is_shell_expansion(caps))
        .map(|caps| caps[2].to_string())
        .filter(|key| !key.starts_with("task."))
        .collect()
}

fn is_shell_expansion(caps: &Captures<'_>) -> bool {
    caps.get(1).is_some_and(|m| !m.as_str().is_empty())
}

fn render_value(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Table(_) => {
                        Err("is a nested array and cannot be rendered".to_string())
                    }
                    other => render_value(other),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(","))
        }
        Value::Table(_) => Err("is a table and cannot be rendered".to_string()),
    }
}
