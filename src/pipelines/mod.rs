// src/pipelines/mod.rs

//! Built-in pipelines, selected with `[config].pipeline`.

pub mod wgcna;

use crate::config::Params;
use crate::dag::RegistryBuilder;
use crate::errors::{PipedagError, Result};
use crate::store::ArtifactStore;

/// Names accepted by `[config].pipeline`.
pub const BUILTIN_NAMES: &[&str] = &[wgcna::NAME];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Register the stages of built-in pipeline `name`.
pub fn register_builtin(name: &str, builder: &mut RegistryBuilder<'_>) -> Result<()> {
    match name {
        wgcna::NAME => wgcna::register(builder),
        other => Err(unknown(other)),
    }
}

/// Check that the input files a built-in pipeline reads are present.
pub fn check_inputs<S>(name: &str, params: &Params, store: &S) -> Result<()>
where
    S: ArtifactStore + ?Sized,
{
    match name {
        wgcna::NAME => wgcna::check_inputs(params, store),
        other => Err(unknown(other)),
    }
}

/// Default configuration document for `pipedag config`.
pub fn default_config(name: &str) -> Result<&'static str> {
    match name {
        wgcna::NAME => Ok(wgcna::DEFAULT_CONFIG),
        other => Err(unknown(other)),
    }
}

fn unknown(name: &str) -> PipedagError {
    PipedagError::ConfigError(format!(
        "unknown built-in pipeline '{name}' (known: {})",
        BUILTIN_NAMES.join(", ")
    ))
}
