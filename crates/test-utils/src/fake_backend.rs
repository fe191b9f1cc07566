use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pipedag::dag::Task;
use pipedag::errors::Result;
use pipedag::exec::{CancelSignal, LaunchContext, ProcessExit, TaskBackend, cancelled};
use pipedag::store::MemoryArtifactStore;

/// A fake backend that:
/// - records which tasks were launched, in order
/// - "produces" each task's declared outputs in a shared in-memory store
/// - can be told to fail a task, skip its outputs, or block until cancelled.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    store: MemoryArtifactStore,
    executed: Arc<Mutex<Vec<String>>>,
    failures: HashMap<String, i32>,
    skip_outputs: HashSet<String>,
    block: HashSet<String>,
}

impl FakeBackend {
    pub fn new(store: MemoryArtifactStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Make `task` exit with `code`.
    pub fn fail(mut self, task: &str, code: i32) -> Self {
        self.failures.insert(task.to_string(), code);
        self
    }

    /// Make `task` exit zero without writing its outputs.
    pub fn skip_outputs(mut self, task: &str) -> Self {
        self.skip_outputs.insert(task.to_string());
        self
    }

    /// Make `task` wait until the cancel flag is raised.
    pub fn block_until_cancelled(mut self, task: &str) -> Self {
        self.block.insert(task.to_string());
        self
    }

    /// Names of launched tasks, in launch order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl TaskBackend for FakeBackend {
    fn launch<'a>(
        &'a self,
        task: &'a Task,
        _ctx: LaunchContext,
        mut cancel: CancelSignal,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessExit>> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(task.name.clone());

            if self.block.contains(&task.name) {
                cancelled(&mut cancel).await;
                return Ok(ProcessExit::Cancelled);
            }

            if let Some(&code) = self.failures.get(&task.name) {
                return Ok(ProcessExit::Exited {
                    code,
                    stderr_tail: vec![format!("{} failed on purpose", task.name)],
                });
            }

            if !self.skip_outputs.contains(&task.name) {
                for output in &task.outputs {
                    self.store.add_file(output, format!("produced by {}", task.name));
                }
            }

            Ok(ProcessExit::success())
        })
    }
}
