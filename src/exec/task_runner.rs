// src/exec/task_runner.rs

//! Individual task process runner.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{Invocation, Task};
use crate::errors::Result;
use crate::types::TaskName;

use super::backend::{LaunchContext, ProcessExit};
use super::{CancelSignal, cancelled};

/// Number of trailing stderr lines kept for failure reports.
const STDERR_TAIL_LINES: usize = 20;

/// How long output readers may run on after the process has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

type SharedLog = Arc<Mutex<File>>;
type Pump = JoinHandle<VecDeque<String>>;

/// Run a task's process to completion (or cancellation).
///
/// stdout and stderr are appended line by line to the task log and mirrored
/// at `debug` level. If the cancel flag is raised before the process and its
/// output readers finish, the child is killed and [`ProcessExit::Cancelled`]
/// is returned. Readers still open `OUTPUT_DRAIN_GRACE` after exit are
/// detached and the stderr tail is left empty.
pub async fn run_process(
    task: &Task,
    ctx: &LaunchContext,
    mut cancel: CancelSignal,
) -> Result<ProcessExit> {
    let Some(mut cmd) = build_command(&task.invocation) else {
        return Ok(ProcessExit::success());
    };

    info!(task = %task.name, cmd = %task.invocation, "starting task process");

    let log_file = File::create(&ctx.log_file)
        .await
        .with_context(|| format!("creating log file {:?}", ctx.log_file))?;
    let log: SharedLog = Arc::new(Mutex::new(log_file));

    cmd.current_dir(&ctx.workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.name))?;

    let mut stdout_pump = child.stdout.take().map(|out| {
        tokio::spawn(pump_lines(out, "stdout", task.name.clone(), log.clone(), 0))
    });
    let mut stderr_pump = child.stderr.take().map(|err| {
        tokio::spawn(pump_lines(
            err,
            "stderr",
            task.name.clone(),
            log.clone(),
            STDERR_TAIL_LINES,
        ))
    });

    let status = tokio::select! {
        biased;

        _ = cancelled(&mut cancel) => {
            info!(task = %task.name, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(task = %task.name, error = %e, "failed to kill child process on cancellation");
            }
            abort_pumps([stdout_pump, stderr_pump]);
            return Ok(ProcessExit::Cancelled);
        }

        status_res = child.wait() => status_res
            .with_context(|| format!("waiting for process of task '{}'", task.name))?,
    };

    // A terminal interrupt reaches the child and this process together, so
    // the child may be reaped before the cancel branch is polled.
    if *cancel.borrow() {
        info!(task = %task.name, exit = %status, "process exited after cancellation was requested");
        abort_pumps([stdout_pump, stderr_pump]);
        return Ok(ProcessExit::Cancelled);
    }

    // Background processes started by the task may hold the pipes open
    // after it exits.
    let stderr_tail = tokio::select! {
        biased;

        _ = cancelled(&mut cancel) => {
            info!(task = %task.name, "cancellation requested while draining process output");
            abort_pumps([stdout_pump, stderr_pump]);
            return Ok(ProcessExit::Cancelled);
        }

        drained = tokio::time::timeout(
            OUTPUT_DRAIN_GRACE,
            drain_pumps(&mut stdout_pump, &mut stderr_pump),
        ) => match drained {
            Ok(tail) => tail,
            Err(_) => {
                warn!(
                    task = %task.name,
                    grace = ?OUTPUT_DRAIN_GRACE,
                    "process output still open after exit; detaching readers"
                );
                abort_pumps([stdout_pump, stderr_pump]);
                Vec::new()
            }
        },
    };

    if let Err(e) = log.lock().await.flush().await {
        warn!(task = %task.name, error = %e, "failed to flush task log");
    }

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task.name,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    Ok(ProcessExit::Exited { code, stderr_tail })
}

/// Wait for both readers to reach end of file; returns the stderr tail.
async fn drain_pumps(stdout: &mut Option<Pump>, stderr: &mut Option<Pump>) -> Vec<String> {
    if let Some(pump) = stdout.as_mut() {
        let _ = pump.await;
    }
    match stderr.as_mut() {
        Some(pump) => pump.await.map(Vec::from).unwrap_or_default(),
        None => Vec::new(),
    }
}

fn abort_pumps(pumps: [Option<Pump>; 2]) {
    for pump in pumps.into_iter().flatten() {
        pump.abort();
    }
}

/// Platform command for an invocation; `None` for aggregates.
fn build_command(invocation: &Invocation) -> Option<Command> {
    match invocation {
        Invocation::Shell { command } => {
            let mut c = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C");
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c");
                c
            };
            c.arg(command);
            Some(c)
        }
        Invocation::Program { program, args } => {
            let mut c = Command::new(program);
            c.args(args);
            Some(c)
        }
        Invocation::Aggregate => None,
    }
}

/// Copy lines from a child pipe into the log; keep the last `keep` lines.
async fn pump_lines<R>(
    reader: R,
    stream: &'static str,
    task: TaskName,
    log: SharedLog,
    keep: usize,
) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = VecDeque::with_capacity(keep);
    let mut log_ok = true;

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(task = %task, stream, "{}", line);

        if log_ok {
            let mut file = log.lock().await;
            let written = file.write_all(line.as_bytes()).await;
            let written = match written {
                Ok(()) => file.write_all(b"\n").await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!(task = %task, error = %e, "writing task log failed; further output is not logged");
                log_ok = false;
            }
        }

        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    tail
}
