// src/store/sentinel.rs

//! Sentinel records: the persisted proof that a task last succeeded under a
//! given parameter fingerprint.
//!
//! On disk a sentinel is a small TOML document:
//!
//! ```toml
//! task = "modules"
//! fingerprint = "5f0c…"
//! completed_at = "2026-10-18T09:12:44.120391Z"
//!
//! [upstream]
//! tom = "2026-10-18T09:10:02.993410Z"
//! clean = "2026-10-18T08:57:31.004512Z"
//! ```
//!
//! `upstream` holds the completion time of each enabled direct dependency
//! as seen when this task succeeded.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PipedagError, Result};
use crate::staleness::Fingerprint;
use crate::store::ArtifactStore;
use crate::types::TaskName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelRecord {
    pub task: TaskName,
    pub fingerprint: Fingerprint,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub upstream: BTreeMap<TaskName, DateTime<Utc>>,
}

impl SentinelRecord {
    pub fn new(task: impl Into<TaskName>, fingerprint: Fingerprint) -> Self {
        Self {
            task: task.into(),
            fingerprint,
            completed_at: Utc::now(),
            upstream: BTreeMap::new(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| PipedagError::Sentinel(format!("serializing record for '{}': {e}", self.task)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PipedagError::Sentinel(e.to_string()))
    }
}

/// Read the sentinel at `path`.
///
/// `Ok(None)` if no sentinel exists; `Err(Sentinel)` if one exists but
/// is not UTF-8 or cannot be parsed.
pub fn read_sentinel<S>(store: &S, path: &Path) -> Result<Option<SentinelRecord>>
where
    S: ArtifactStore + ?Sized,
{
    let Some(bytes) = store.read(path)? else {
        return Ok(None);
    };
    let contents = String::from_utf8(bytes)
        .map_err(|e| PipedagError::Sentinel(format!("{:?}: {e}", path)))?;
    SentinelRecord::from_toml(&contents)
        .map(Some)
        .map_err(|e| PipedagError::Sentinel(format!("{:?}: {e}", path)))
}

/// Persist a sentinel atomically.
pub fn write_sentinel<S>(store: &S, path: &Path, record: &SentinelRecord) -> Result<()>
where
    S: ArtifactStore + ?Sized,
{
    let contents = record.to_toml()?;
    store.write_atomic(path, contents.as_bytes())
}
