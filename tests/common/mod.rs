#![allow(dead_code)]

use pipedag::config::ConfigFile;
use pipedag::dag::Registry;
use pipedag::engine::Pipeline;
use pipedag::exec::{CancelSignal, cancel_channel};
use pipedag::store::MemoryArtifactStore;
use pipedag_test_utils::{ConfigFileBuilder, FakeBackend, TaskConfigBuilder};

pub use pipedag_test_utils::{init_tracing, with_timeout};

pub type TestPipeline = Pipeline<MemoryArtifactStore, FakeBackend>;

/// A (no deps), B (after A), C (after A and B), each with one output.
pub fn abc_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .param("a.level", 1)
        .param("b.level", 2)
        .param("c.level", 3)
        .with_task(
            "A",
            TaskConfigBuilder::shell("make-a --level={a.level}").output("out/a.txt"),
        )
        .with_task(
            "B",
            TaskConfigBuilder::shell("make-b --level={b.level}")
                .after("A")
                .output("out/b.txt"),
        )
        .with_task(
            "C",
            TaskConfigBuilder::shell("make-c --level={c.level}")
                .after("A")
                .after("B")
                .output("out/c.txt"),
        )
        .build()
}

/// Pipeline over `cfg` backed by a fake backend sharing `store`.
pub fn fake_pipeline(cfg: &ConfigFile, store: &MemoryArtifactStore) -> TestPipeline {
    fake_pipeline_with(cfg, store, FakeBackend::new(store.clone()))
}

pub fn fake_pipeline_with(
    cfg: &ConfigFile,
    store: &MemoryArtifactStore,
    backend: FakeBackend,
) -> TestPipeline {
    let registry = Registry::from_config(cfg).expect("registry should build");
    Pipeline::new(registry, cfg.params.clone(), store.clone(), backend)
}

/// A cancel flag that is never raised.
pub fn no_cancel() -> CancelSignal {
    let (_tx, rx) = cancel_channel();
    rx
}
