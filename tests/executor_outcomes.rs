// tests/executor_outcomes.rs

mod common;
use crate::common::{
    abc_config, fake_pipeline, fake_pipeline_with, init_tracing, no_cancel, with_timeout,
};

use std::error::Error;
use std::time::Duration;

use pipedag::engine::{RunReport, TaskFailure};
use pipedag::exec::cancel_channel;
use pipedag::staleness::StaleReason;
use pipedag::store::{ArtifactStore, MemoryArtifactStore, read_sentinel};
use pipedag::types::Target;
use pipedag_test_utils::{ConfigFileBuilder, FakeBackend, TaskConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn zero_exit_without_outputs_is_incomplete_and_writes_no_sentinel() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    let backend = FakeBackend::new(store.clone()).skip_outputs("A");
    let pipeline = fake_pipeline_with(&cfg, &store, backend.clone());

    let report = pipeline.execute(&Target::All, no_cancel()).await?;
    match report {
        RunReport::Failed { task, failure, ran } => {
            assert_eq!(task, "A");
            assert_eq!(
                failure,
                TaskFailure::IncompleteOutputs {
                    missing: vec!["out/a.txt".into()]
                }
            );
            assert!(ran.is_empty());
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let a = pipeline.registry().require("A")?;
    assert!(read_sentinel(&store, &a.sentinel)?.is_none());
    assert_eq!(backend.executed(), vec!["A"], "run halts at the failing task");
    Ok(())
}

#[tokio::test]
async fn failure_halts_the_run_and_keeps_earlier_results() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    let backend = FakeBackend::new(store.clone()).fail("B", 3);
    let pipeline = fake_pipeline_with(&cfg, &store, backend.clone());

    let report = pipeline.execute(&Target::All, no_cancel()).await?;
    assert!(!report.is_success());
    match &report {
        RunReport::Failed { task, failure, ran } => {
            assert_eq!(task, "B");
            assert!(matches!(failure, TaskFailure::NonZeroExit { code: 3, .. }));
            assert_eq!(ran, &vec!["A".to_string()]);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(backend.executed(), vec!["A", "B"]);

    // A keeps its sentinel; B and C are still pending.
    let retry = fake_pipeline(&cfg, &store);
    let plan = retry.plan(&Target::All)?;
    assert_eq!(plan.task_names(), vec!["B", "C"]);

    let report = retry.execute(&Target::All, no_cancel()).await?;
    assert_eq!(report.ran(), ["B".to_string(), "C".to_string()]);
    Ok(())
}

#[tokio::test]
async fn failed_rerun_removes_the_previous_sentinel() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    fake_pipeline(&cfg, &store)
        .execute(&Target::All, no_cancel())
        .await?;

    let pipeline = fake_pipeline_with(&cfg, &store, FakeBackend::new(store.clone()).fail("C", 1));
    assert!(pipeline.invalidate("B")?);
    let report = pipeline.execute(&Target::All, no_cancel()).await?;
    assert!(matches!(report, RunReport::Failed { ref task, .. } if task == "C"));

    let c = pipeline.registry().require("C")?;
    assert!(read_sentinel(&store, &c.sentinel)?.is_none());
    assert_eq!(
        pipeline.plan(&Target::All)?.steps[0].reason,
        StaleReason::MissingSentinel
    );
    Ok(())
}

#[tokio::test]
async fn cancellation_during_a_task_is_reported_and_leaves_it_stale() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    let backend = FakeBackend::new(store.clone()).block_until_cancelled("B");
    let pipeline = fake_pipeline_with(&cfg, &store, backend.clone());

    let (cancel_tx, cancel_rx) = cancel_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(true);
    });

    let report = with_timeout(pipeline.execute(&Target::All, cancel_rx)).await?;
    assert_eq!(
        report,
        RunReport::Failed {
            task: "B".into(),
            failure: TaskFailure::Cancelled,
            ran: vec!["A".into()],
        }
    );

    let b = pipeline.registry().require("B")?;
    assert!(read_sentinel(&store, &b.sentinel)?.is_none());
    assert!(!backend.executed().contains(&"C".to_string()));
    Ok(())
}

#[tokio::test]
async fn raised_flag_stops_before_the_next_task_starts() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let backend = FakeBackend::new(store.clone());
    let pipeline = fake_pipeline_with(&abc_config(), &store, backend.clone());

    let (cancel_tx, cancel_rx) = cancel_channel();
    cancel_tx.send(true)?;

    let report = pipeline.execute(&Target::All, cancel_rx).await?;
    assert!(matches!(
        report,
        RunReport::Failed { ref task, failure: TaskFailure::Cancelled, .. } if task == "A"
    ));
    assert!(backend.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn aggregate_tasks_record_completion_without_launching() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = ConfigFileBuilder::new()
        .with_task("work", TaskConfigBuilder::shell("do-work").output("w/out.txt"))
        .with_task("all", TaskConfigBuilder::aggregate().after("work"))
        .build();
    let backend = FakeBackend::new(store.clone());
    let pipeline = fake_pipeline_with(&cfg, &store, backend.clone());

    let report = pipeline.execute(&Target::task("all"), no_cancel()).await?;
    assert_eq!(report.ran(), ["work".to_string(), "all".to_string()]);
    assert_eq!(backend.executed(), vec!["work"]);

    let all = pipeline.registry().require("all")?;
    assert_eq!(all.sentinel, std::path::Path::new(".pipedag/all.sentinel"));
    let record = read_sentinel(&store, &all.sentinel)?.expect("aggregate sentinel written");
    assert!(record.upstream.contains_key("work"));
    assert!(store.exists(&all.sentinel));
    Ok(())
}

#[tokio::test]
async fn disabled_tasks_never_run_and_never_block_dependents() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = ConfigFileBuilder::new()
        .with_task("base", TaskConfigBuilder::shell("base").output("o/base.txt"))
        .with_task(
            "optional",
            TaskConfigBuilder::shell("optional")
                .after("base")
                .output("o/optional.txt")
                .enabled(false),
        )
        .with_task(
            "report",
            TaskConfigBuilder::shell("report")
                .after("base")
                .after("optional")
                .output("o/report.txt"),
        )
        .build();
    let backend = FakeBackend::new(store.clone());
    let pipeline = fake_pipeline_with(&cfg, &store, backend.clone());

    let report = pipeline.execute(&Target::All, no_cancel()).await?;
    assert_eq!(report.ran(), ["base".to_string(), "report".to_string()]);
    assert_eq!(backend.executed(), vec!["base", "report"]);
    assert!(pipeline.plan(&Target::All)?.is_empty());
    Ok(())
}
