// src/config/mod.rs

//! Configuration loading and validation for pipedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Hold the immutable parameter snapshot (`params.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task shapes and global settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod params;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
pub use params::Params;
