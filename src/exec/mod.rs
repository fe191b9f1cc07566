// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the [`TaskBackend`] trait and the production
//!   [`ProcessBackend`]; tests swap in a fake implementation.
//! - [`task_runner`] spawns one task's process with `tokio::process::Command`
//!   and streams its output into the task log.
//! - [`executor`] wraps a backend with the sentinel protocol: clear, run,
//!   verify outputs, record.

use tokio::sync::watch;

pub mod backend;
pub mod executor;
pub mod task_runner;

pub use backend::{LaunchContext, ProcessBackend, ProcessExit, TaskBackend};
pub use executor::Executor;

/// Receiving side of the cancellation flag. `true` means abort.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation flag, initially lowered.
pub fn cancel_channel() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Resolves once the flag is raised. Never resolves if every sender is gone
/// without raising it.
pub async fn cancelled(cancel: &mut CancelSignal) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
