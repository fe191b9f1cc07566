// src/store/mod.rs

//! Artifact store: the filesystem area holding task outputs, sentinels and
//! logs.
//!
//! All task paths are relative to the store root. The store has no logic of
//! its own beyond existence/content queries and writes; sentinel semantics
//! live in [`sentinel`].

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::errors::Result;

pub mod memory;
pub mod sentinel;

pub use memory::MemoryArtifactStore;
pub use sentinel::{SentinelRecord, read_sentinel, write_sentinel};

/// Abstract artifact store interface.
pub trait ArtifactStore: Send + Sync + Debug {
    /// Root directory that relative task paths resolve against.
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> bool;

    /// Read a file's raw bytes; `Ok(None)` if it does not exist.
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Replace `path` so that readers observe either the old or the new
    /// contents, never a partial write.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Remove a file; returns whether it existed.
    fn remove(&self, path: &Path) -> Result<bool>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Absolute (or root-joined) location of a relative task path.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }
}

/// Implementation backed by `std::fs`, rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path);
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("reading {:?}", full))
                .into()),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        let parent = full
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).with_context(|| format!("creating dir {:?}", parent))?;

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

        {
            let mut file =
                fs::File::create(&tmp).with_context(|| format!("creating file {:?}", tmp))?;
            file.write_all(contents)
                .with_context(|| format!("writing to file {:?}", tmp))?;
            file.sync_all()
                .with_context(|| format!("syncing file {:?}", tmp))?;
        }

        fs::rename(&tmp, &full).with_context(|| format!("renaming {:?} to {:?}", tmp, full))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("removing {:?}", full))
                .into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).with_context(|| format!("creating dir {:?}", full))?;
        Ok(())
    }
}
