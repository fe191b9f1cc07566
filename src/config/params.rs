// src/config/params.rs

//! Immutable parameter snapshot (`[params]`).
//!
//! Loaded once per invocation and handed by reference to registry building,
//! staleness evaluation and execution. Keys are addressed with dotted paths:
//! `module.soft_power` is `soft_power` inside `[params.module]`.

use std::str::FromStr;

use toml::{Table, Value};

use crate::errors::{PipedagError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    table: Table,
}

impl Params {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn as_table(&self) -> &Table {
        &self.table
    }

    /// Look up a dotted key. Returns `None` if any segment is missing or a
    /// non-final segment is not a table.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.table.get(first)?;
        for seg in segments {
            current = current.as_table()?.get(seg)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Whether a key is present with a meaningful value.
    ///
    /// Empty strings, `false` and empty arrays count as unset; this mirrors
    /// how optional inputs are left blank in configuration files.
    pub fn is_set(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Boolean(b)) => *b,
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }
}

impl FromStr for Params {
    type Err = PipedagError;

    fn from_str(s: &str) -> Result<Self> {
        let table: Table = toml::from_str(s)?;
        Ok(Self::new(table))
    }
}

impl From<Table> for Params {
    fn from(table: Table) -> Self {
        Self::new(table)
    }
}
