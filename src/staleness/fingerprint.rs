// src/staleness/fingerprint.rs

//! Parameter fingerprints.
//!
//! A fingerprint is the blake3 digest of a canonical rendering of the
//! parameters in a task's scope. Scope keys are sorted and de-duplicated and
//! nested tables are rendered with sorted keys, so key order and formatting
//! in the config file never change the digest.

use std::collections::BTreeSet;
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::config::Params;

/// Marker hashed for scope keys absent from the parameter document.
const UNSET: &str = "<unset>";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the given scope of `params`.
    pub fn compute<I, K>(params: &Params, scope: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: BTreeSet<String> = scope
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .collect();

        let mut hasher = Hasher::new();
        for key in &keys {
            let rendered = params
                .get(key)
                .map(canonical_value)
                .unwrap_or_else(|| UNSET.to_string());
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(rendered.as_bytes());
            hasher.update(b"\n");
        }

        Fingerprint(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines and tables.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Fingerprint(value.to_string())
    }
}

/// Canonical, order-independent rendering of a TOML value.
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("s:{s:?}"),
        Value::Integer(i) => format!("i:{i}"),
        Value::Float(x) => format!("f:{x:?}"),
        Value::Boolean(b) => format!("b:{b}"),
        Value::Datetime(d) => format!("d:{d}"),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_value).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Table(table) => {
            let mut entries: Vec<(&String, &Value)> = table.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{k:?}={}", canonical_value(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}
