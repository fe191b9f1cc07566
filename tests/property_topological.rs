// tests/property_topological.rs

mod common;
use crate::common::fake_pipeline;

use std::collections::HashMap;

use pipedag::dag::Registry;
use pipedag::store::MemoryArtifactStore;
use pipedag::types::Target;
use pipedag_test_utils::{ConfigFileBuilder, TaskConfigBuilder};
use proptest::prelude::*;

/// Random DAG: task `i` may only depend on tasks with a lower index, so the
/// graph is acyclic. Tasks are declared in a shuffled order, so a task often
/// appears in the document before its dependencies.
fn dag_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..12).prop_flat_map(|n| {
        let deps = (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>();
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (deps, order)
    })
}

fn build(deps: &[Vec<usize>], order: &[usize]) -> pipedag::config::ConfigFile {
    let mut builder = ConfigFileBuilder::new();
    for &i in order {
        let mut task = TaskConfigBuilder::shell("true").output(&format!("out/t{i}.txt"));
        let mut seen = Vec::new();
        for &d in &deps[i] {
            if d < i && !seen.contains(&d) {
                seen.push(d);
                task = task.after(&format!("t{d}"));
            }
        }
        builder = builder.with_task(&format!("t{i}"), task);
    }
    builder.build()
}

fn positions<'a>(names: impl IntoIterator<Item = &'a str>) -> HashMap<String, usize> {
    names
        .into_iter()
        .enumerate()
        .map(|(pos, name)| (name.to_string(), pos))
        .collect()
}

proptest! {
    #[test]
    fn topological_order_respects_every_dependency((deps, order) in dag_strategy()) {
        let cfg = build(&deps, &order);
        let registry = Registry::from_config(&cfg).expect("acyclic by construction");

        let registered = positions(registry.task_names());
        for task in registry.topological_order() {
            for dep in &task.deps {
                prop_assert!(registered[dep] < registered[&task.name]);
            }
        }

        let topo = registry.topological_order();
        prop_assert_eq!(topo.len(), deps.len());
        let pos = positions(topo.iter().map(|t| t.name.as_str()));
        for task in &topo {
            for dep in &task.deps {
                prop_assert!(pos[dep] < pos[&task.name], "{} before {}", dep, task.name);
            }
        }
    }

    #[test]
    fn first_plan_contains_every_task_in_a_valid_order((deps, order) in dag_strategy()) {
        let cfg = build(&deps, &order);
        let store = MemoryArtifactStore::new();
        let pipeline = fake_pipeline(&cfg, &store);

        let plan = pipeline.plan(&Target::All).expect("plan");
        prop_assert_eq!(plan.len(), deps.len());
        prop_assert!(plan.fresh.is_empty());

        let pos = positions(plan.task_names());
        for step in &plan.steps {
            for dep in pipeline.registry().dependencies_of(&step.name) {
                prop_assert!(pos[dep] < pos[&step.name]);
            }
        }
    }

    #[test]
    fn subgraph_plan_is_the_dependency_closure((deps, order) in dag_strategy()) {
        let cfg = build(&deps, &order);
        let store = MemoryArtifactStore::new();
        let pipeline = fake_pipeline(&cfg, &store);
        let target = format!("t{}", deps.len() - 1);

        let plan = pipeline.plan(&Target::task(target.clone())).expect("plan");
        let mut expected: Vec<String> = pipeline
            .registry()
            .transitive_dependencies(&target)
            .expect("known task")
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        expected.push(target.clone());

        let mut got: Vec<String> = plan.task_names().into_iter().map(String::from).collect();
        prop_assert_eq!(got.last(), Some(&target));
        got.sort();
        expected.sort();
        prop_assert_eq!(got, expected);
    }
}
