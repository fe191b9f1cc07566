// tests/fingerprint_scope.rs

mod common;
use crate::common::{abc_config, fake_pipeline, init_tracing, no_cancel};

use std::error::Error;

use pipedag::config::{ConfigFile, Params};
use pipedag::staleness::{Fingerprint, StaleReason};
use pipedag::store::MemoryArtifactStore;
use pipedag::types::Target;
use pipedag_test_utils::{ConfigFileBuilder, TaskConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn with_param(cfg: &ConfigFile, key: &str, value: i64) -> ConfigFile {
    let mut cfg = cfg.clone();
    let mut table = cfg.params.as_table().clone();
    let (section, field) = key.split_once('.').expect("dotted key");
    table
        .get_mut(section)
        .and_then(|v| v.as_table_mut())
        .expect("section exists")
        .insert(field.to_string(), toml::Value::Integer(value));
    cfg.params = Params::new(table);
    cfg
}

#[tokio::test]
async fn change_outside_scope_never_invalidates() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    fake_pipeline(&cfg, &store)
        .execute(&Target::All, no_cancel())
        .await?;

    // C's scope is `c.level` only; A and B must stay fresh.
    let changed = with_param(&cfg, "c.level", 30);
    let plan = fake_pipeline(&changed, &store).plan(&Target::All)?;
    assert_eq!(plan.task_names(), vec!["C"]);
    assert!(matches!(
        plan.steps[0].reason,
        StaleReason::FingerprintMismatch { .. }
    ));
    assert_eq!(plan.fresh, vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn change_inside_scope_invalidates_task_and_dependents() -> TestResult {
    init_tracing();
    let store = MemoryArtifactStore::new();
    let cfg = abc_config();
    fake_pipeline(&cfg, &store)
        .execute(&Target::All, no_cancel())
        .await?;

    let changed = with_param(&cfg, "b.level", 20);
    let plan = fake_pipeline(&changed, &store).plan(&Target::All)?;
    assert_eq!(plan.task_names(), vec!["B", "C"]);
    assert!(matches!(
        plan.steps[0].reason,
        StaleReason::FingerprintMismatch { .. }
    ));
    assert_eq!(
        plan.steps[1].reason,
        StaleReason::UpstreamRerun {
            upstream: "B".into()
        }
    );

    // Reverting the change makes everything fresh again.
    let plan = fake_pipeline(&cfg, &store).plan(&Target::All)?;
    assert!(plan.is_empty());
    Ok(())
}

#[test]
fn fingerprint_ignores_key_order_and_formatting() -> TestResult {
    let a: Params = r#"
        [module]
        soft_power = 12
        detection = "stepwise"
        [clean]
        min_fraction = 0.5
    "#
    .parse()?;
    let b: Params = r#"
        clean = { min_fraction = 0.50 }

        [module]
        detection   =   "stepwise"
        soft_power = 12
    "#
    .parse()?;

    let scope = ["module", "clean.min_fraction"];
    assert_eq!(Fingerprint::compute(&a, scope), Fingerprint::compute(&b, scope));
    assert_eq!(
        Fingerprint::compute(&a, ["module", "clean.min_fraction", "module"]),
        Fingerprint::compute(&b, ["clean.min_fraction", "module"]),
    );
    Ok(())
}

#[test]
fn fingerprint_distinguishes_values_types_and_unset_keys() -> TestResult {
    let base: Params = "[module]\nsoft_power = 12\n".parse()?;
    let other_value: Params = "[module]\nsoft_power = 14\n".parse()?;
    let other_type: Params = "[module]\nsoft_power = \"12\"\n".parse()?;
    let empty = Params::default();

    let fp = |p: &Params| Fingerprint::compute(p, ["module.soft_power"]);
    assert_ne!(fp(&base), fp(&other_value));
    assert_ne!(fp(&base), fp(&other_type));
    assert_ne!(fp(&base), fp(&empty));
    assert_eq!(fp(&empty), Fingerprint::compute(&empty, ["module.soft_power"]));
    assert_eq!(fp(&base).as_str().len(), 64);
    assert_eq!(fp(&base).short().len(), 12);
    Ok(())
}

#[test]
fn scope_defaults_to_parameters_referenced_by_the_invocation() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .param("wgcna_dir", "/opt/wgcna")
        .param("module.soft_power", 12)
        .param("input.trait_data", "")
        .with_task(
            "derived",
            TaskConfigBuilder::program(
                "Rscript",
                &[
                    "{wgcna_dir}/R/x.R",
                    "--softpower={module.soft_power}",
                    "--traits={input.trait_data?}",
                    "--log={task.log}",
                ],
            ),
        )
        .with_task(
            "explicit",
            TaskConfigBuilder::shell("run {module.soft_power}").params(&["clean", "module"]),
        )
        .build();

    let registry = pipedag::dag::Registry::from_config(&cfg)?;
    assert_eq!(
        registry.require("derived")?.scope,
        vec!["input.trait_data", "module.soft_power", "wgcna_dir"]
    );
    assert_eq!(registry.require("explicit")?.scope, vec!["clean", "module"]);
    Ok(())
}
