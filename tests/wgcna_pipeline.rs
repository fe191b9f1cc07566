// tests/wgcna_pipeline.rs

mod common;
use crate::common::{fake_pipeline, init_tracing, no_cancel};

use std::error::Error;

use pipedag::config::{ConfigFile, parse_str};
use pipedag::dag::{Invocation, Registry};
use pipedag::errors::PipedagError;
use pipedag::pipelines::{self, wgcna};
use pipedag::staleness::{StaleReason, Staleness};
use pipedag::store::MemoryArtifactStore;
use pipedag::types::Target;

type TestResult = Result<(), Box<dyn Error>>;

const STEPWISE: &[&str] = &[
    "annotation",
    "clean",
    "soft_power",
    "adjacency",
    "tom",
    "modules",
    "membership",
    "eigengenes",
    "genelists",
    "genesets",
    "summarise_genesets",
    "report",
    "full",
];

fn config(edits: &[(&str, &str)]) -> Result<ConfigFile, PipedagError> {
    let mut doc = wgcna::DEFAULT_CONFIG.to_string();
    for (from, to) in edits {
        assert!(doc.contains(from), "default config lacks {from:?}");
        doc = doc.replace(from, to);
    }
    ConfigFile::try_from(parse_str(&doc)?)
}

fn names(registry: &Registry) -> Vec<&str> {
    registry
        .topological_order()
        .into_iter()
        .map(|t| t.name.as_str())
        .collect()
}

#[test]
fn default_config_registers_the_stepwise_pipeline() -> TestResult {
    let cfg = config(&[])?;
    assert_eq!(cfg.config.pipeline.as_deref(), Some(wgcna::NAME));
    assert_eq!(pipelines::default_config("wgcna")?, wgcna::DEFAULT_CONFIG);

    let registry = Registry::from_config(&cfg)?;
    assert_eq!(names(&registry), STEPWISE);
    assert_eq!(registry.task_names().collect::<Vec<_>>(), STEPWISE);

    let clean = registry.require("clean")?;
    match &clean.invocation {
        Invocation::Program { program, args } => {
            assert_eq!(program, "Rscript");
            assert_eq!(args[0], "/path/to/pipeline_wgcna/R/wgcna_data_cleaning.R");
            assert!(args.contains(&"--input=data/expression.tsv".to_string()));
            assert!(args.contains(&"--outdir=wgcna.dir/clean.dir".to_string()));
            assert!(!args.iter().any(|a| a.starts_with("--traitdata")));
        }
        other => panic!("expected a program invocation, got {other:?}"),
    }
    assert_eq!(
        registry.require("soft_power")?.outdir(),
        std::path::Path::new("wgcna.dir/soft.power.dir")
    );
    assert!(registry.require("full")?.is_aggregate());
    Ok(())
}

#[test]
fn blockwise_detection_skips_adjacency_and_tom() -> TestResult {
    let cfg = config(&[("detection = \"stepwise\"", "detection = \"blockwise\"")])?;
    let registry = Registry::from_config(&cfg)?;

    assert!(!registry.contains("adjacency"));
    assert!(!registry.contains("tom"));
    assert_eq!(registry.dependencies_of("modules"), ["clean".to_string()]);
    Ok(())
}

#[test]
fn unknown_detection_mode_is_a_config_error() -> TestResult {
    let cfg = config(&[("detection = \"stepwise\"", "detection = \"fancy\"")])?;
    let err = Registry::from_config(&cfg).unwrap_err();
    assert!(matches!(err, PipedagError::ConfigError(ref m) if m.contains("fancy")));
    Ok(())
}

#[test]
fn optional_stages_are_disabled_until_configured() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();

    let cfg = config(&[])?;
    let pipeline = fake_pipeline(&cfg, &store);
    let status = pipeline.status()?;
    for stage in ["genelists", "genesets", "summarise_genesets"] {
        let (_, staleness) = status
            .iter()
            .find(|(name, _)| name == stage)
            .ok_or("stage missing")?;
        assert_eq!(staleness, &Staleness::Disabled, "{stage}");
    }

    let cfg = config(&[
        ("run_genesets = false", "run_genesets = true"),
        ("genelists = \"\"", "genelists = \"data/genelists.tsv\""),
    ])?;
    let registry = Registry::from_config(&cfg)?;
    for stage in ["genelists", "genesets", "summarise_genesets"] {
        let task = registry.require(stage)?;
        assert!(task.enabled, "{stage}");
        assert!(!task.is_aggregate(), "{stage}");
    }
    let genesets = registry.require("genesets")?;
    assert!(matches!(
        &genesets.invocation,
        Invocation::Shell { command } if command.contains("--gmt_names='none'")
    ));
    Ok(())
}

#[tokio::test]
async fn soft_power_change_reruns_from_adjacency() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();

    let cfg = config(&[])?;
    let report = fake_pipeline(&cfg, &store)
        .execute(&Target::All, no_cancel())
        .await?;
    assert_eq!(
        report.ran(),
        [
            "annotation",
            "clean",
            "soft_power",
            "adjacency",
            "tom",
            "modules",
            "membership",
            "eigengenes",
            "report",
            "full"
        ]
        .map(String::from)
    );

    let cfg = config(&[("soft_power = 12", "soft_power = 14")])?;
    let plan = fake_pipeline(&cfg, &store).plan(&Target::All)?;
    assert_eq!(
        plan.task_names(),
        vec!["adjacency", "tom", "modules", "membership", "eigengenes", "report", "full"]
    );
    assert!(matches!(
        plan.steps[0].reason,
        StaleReason::FingerprintMismatch { .. }
    ));
    assert_eq!(
        plan.steps[1].reason,
        StaleReason::UpstreamRerun {
            upstream: "adjacency".into()
        }
    );
    assert_eq!(plan.fresh, vec!["annotation", "clean", "soft_power"]);
    Ok(())
}

#[test]
fn input_check_requires_expression_data() -> TestResult {
    let store = MemoryArtifactStore::new();
    let cfg = config(&[])?;

    let err = pipelines::check_inputs("wgcna", &cfg.params, &store).unwrap_err();
    assert!(matches!(err, PipedagError::ConfigError(ref m) if m.contains("data/expression.tsv")));

    store.add_file("data/expression.tsv", "gene_id\ts1\n");
    pipelines::check_inputs("wgcna", &cfg.params, &store)?;

    let cfg = config(&[("trait_data = \"\"", "trait_data = \"data/traits.tsv\"")])?;
    let err = wgcna::check_inputs(&cfg.params, &store).unwrap_err();
    assert!(matches!(err, PipedagError::ConfigError(ref m) if m.contains("trait data")));

    let cfg = config(&[("expression_data = \"data/expression.tsv\"", "expression_data = \"\"")])?;
    assert!(wgcna::check_inputs(&cfg.params, &store).is_err());
    Ok(())
}
