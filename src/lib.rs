// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipelines;
pub mod staleness;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::ExecutionPlan;
use crate::engine::{Pipeline, RunReport, TaskFailure};
use crate::exec::{ProcessBackend, cancel_channel};
use crate::staleness::Staleness;
use crate::store::FsArtifactStore;
use crate::types::{Target, TaskName};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and registry building
/// - the requested command (run / plan / status / invalidate / config)
/// - Ctrl-C handling for `run`
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    match args.command {
        Command::Config { output, force } => write_default_config(Path::new(&output), force),
        Command::Plan { task } => {
            let (_, pipeline) = open(&config_path)?;
            let plan = pipeline.plan(&Target::from(task))?;
            print_plan(&plan);
            Ok(())
        }
        Command::Status => {
            let (_, pipeline) = open(&config_path)?;
            print_status(&pipeline.status()?);
            Ok(())
        }
        Command::Invalidate { task } => {
            let (_, pipeline) = open(&config_path)?;
            if pipeline.invalidate(&task)? {
                println!("invalidated '{task}'; it and its dependents will rerun");
            } else {
                println!("'{task}' has no sentinel; nothing to invalidate");
            }
            Ok(())
        }
        Command::Run { task } => {
            let (cfg, pipeline) = open(&config_path)?;
            if let Some(name) = cfg.config.pipeline.as_deref() {
                pipelines::check_inputs(name, pipeline.params(), pipeline.store())?;
            }

            let (cancel_tx, cancel_rx) = cancel_channel();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                info!("interrupt received; cancelling run");
                let _ = cancel_tx.send(true);
            });

            let report = pipeline.execute(&Target::from(task), cancel_rx).await?;
            report_outcome(report)
        }
    }
}

fn open(config_path: &Path) -> Result<(ConfigFile, Pipeline<FsArtifactStore, ProcessBackend>)> {
    let cfg = load_and_validate(config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;
    debug!(root = ?cfg.artifact_root(), "config loaded");
    let pipeline = Pipeline::from_config(&cfg, ProcessBackend)?;
    Ok((cfg, pipeline))
}

fn write_default_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{:?} already exists; pass --force to overwrite it", output);
    }
    let contents = pipelines::default_config(pipelines::wgcna::NAME)?;
    std::fs::write(output, contents).with_context(|| format!("writing {:?}", output))?;
    println!("wrote default configuration to {}", output.display());
    Ok(())
}

fn report_outcome(report: RunReport) -> Result<()> {
    match report {
        RunReport::AllFresh => {
            println!("all tasks up to date; nothing to run");
            Ok(())
        }
        RunReport::Completed { ran } => {
            println!("ran {} task(s): {}", ran.len(), ran.join(", "));
            Ok(())
        }
        RunReport::Failed { task, failure, ran } => {
            if !ran.is_empty() {
                println!("completed before failure: {}", ran.join(", "));
            }
            if let TaskFailure::NonZeroExit { stderr_tail, .. } = &failure {
                for line in stderr_tail {
                    eprintln!("  {task} | {line}");
                }
            }
            Err(anyhow!("task '{task}' failed: {failure}"))
        }
    }
}

fn print_plan(plan: &ExecutionPlan) {
    if plan.is_empty() {
        println!(
            "plan for {}: nothing to do ({} task(s) up to date)",
            plan.target,
            plan.fresh.len()
        );
        return;
    }

    println!("plan for {}: {} task(s) to run", plan.target, plan.len());
    let width = name_width(plan.steps.iter().map(|s| &s.name));
    for (i, step) in plan.steps.iter().enumerate() {
        println!("  {:>2}. {:<width$}  {}", i + 1, step.name, step.reason);
    }
    if !plan.fresh.is_empty() {
        println!("up to date: {}", plan.fresh.join(", "));
    }
}

fn print_status(status: &[(TaskName, Staleness)]) {
    let width = name_width(status.iter().map(|(name, _)| name)).max("TASK".len());
    println!("{:<width$}  STATUS", "TASK");
    for (name, staleness) in status {
        println!("{name:<width$}  {staleness}");
    }
}

fn name_width<'a>(names: impl Iterator<Item = &'a TaskName>) -> usize {
    names.map(|n| n.len()).max().unwrap_or(0)
}
