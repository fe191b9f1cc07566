// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipedag",
    version,
    about = "Run analysis pipeline stages incrementally, skipping stages whose outputs are current.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value = "Pipedag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every stale task needed for TASK (or the whole pipeline).
    Run {
        /// Target task; omit to run the full pipeline.
        #[arg(value_name = "TASK")]
        task: Option<String>,
    },

    /// Print the execution plan without running anything.
    Plan {
        /// Target task; omit to plan the full pipeline.
        #[arg(value_name = "TASK")]
        task: Option<String>,
    },

    /// Show the staleness of every registered task.
    Status,

    /// Delete a task's sentinel so it (and everything downstream) reruns.
    Invalidate {
        #[arg(value_name = "TASK")]
        task: String,
    },

    /// Write a default configuration for the built-in WGCNA pipeline.
    Config {
        /// Where to write the configuration.
        #[arg(long, value_name = "PATH", default_value = "Pipedag.toml")]
        output: String,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
