// tests/template_rendering.rs

use std::path::{Path, PathBuf};

use pipedag::config::Params;
use pipedag::dag::template::{TaskFacts, referenced_params, render};

fn params() -> Params {
    r#"
    wgcna_dir = "/opt/wgcna"
    threads = 4
    ratio = 0.25
    strict = true
    empty = ""
    names = ["a", "b", 3]
    nested = [[1, 2]]

    [module]
    soft_power = 12
    detection = "stepwise"
    "#
    .parse()
    .expect("valid params")
}

fn render_with(template: &str, outputs: &[PathBuf]) -> Result<String, String> {
    let facts = TaskFacts {
        name: "modules",
        log: Path::new("wgcna.dir/modules.dir/modules.log"),
        outdir: Path::new("wgcna.dir/modules.dir"),
        outputs,
    };
    render(template, &params(), &facts)
}

#[test]
fn parameters_and_task_facts_are_substituted() {
    let outputs = vec![PathBuf::from("m/a.RData"), PathBuf::from("m/b.RData")];
    let rendered = render_with(
        "{wgcna_dir}/R/x.R --softpower={module.soft_power} --threads={threads} \
         --ratio={ratio} --strict={strict} --outdir={task.outdir} --log={task.log} \
         --name={task.name} {task.outputs}",
        &outputs,
    )
    .expect("renders");

    assert_eq!(
        rendered,
        "/opt/wgcna/R/x.R --softpower=12 --threads=4 --ratio=0.25 --strict=true \
         --outdir=wgcna.dir/modules.dir --log=wgcna.dir/modules.dir/modules.log \
         --name=modules m/a.RData m/b.RData"
    );
}

#[test]
fn optional_placeholders_render_empty_when_unset() {
    assert_eq!(render_with("--traits={input.trait_data?}", &[]).unwrap(), "--traits=");
    assert_eq!(render_with("--empty={empty?}", &[]).unwrap(), "--empty=");
    assert_eq!(
        render_with("--threads={threads?}", &[]).unwrap(),
        "--threads=4"
    );
}

#[test]
fn missing_parameter_is_an_error_naming_the_key() {
    let err = render_with("--x={module.missing}", &[]).unwrap_err();
    assert!(err.contains("unknown parameter 'module.missing'"), "{err}");
}

#[test]
fn shell_expansions_are_left_alone() {
    let rendered = render_with("echo ${HOME} $((1 + 2)) {threads}", &[]).unwrap();
    assert_eq!(rendered, "echo ${HOME} $((1 + 2)) 4");
}

#[test]
fn arrays_join_and_tables_are_rejected() {
    assert_eq!(render_with("{names}", &[]).unwrap(), "a,b,3");

    let err = render_with("{module}", &[]).unwrap_err();
    assert!(err.contains("'module'") && err.contains("table"), "{err}");

    let err = render_with("{nested}", &[]).unwrap_err();
    assert!(err.contains("nested array"), "{err}");
}

#[test]
fn referenced_params_skip_facts_and_shell_syntax() {
    let keys = referenced_params(
        "{wgcna_dir}/R/x.R --p={module.soft_power} --t={input.trait_data?} \
         --log={task.log} ${HOME} {wgcna_dir}",
    );
    assert_eq!(
        keys,
        vec!["wgcna_dir", "module.soft_power", "input.trait_data", "wgcna_dir"]
    );
    assert!(referenced_params("plain text").is_empty());
}

#[test]
fn unknown_task_fields_are_errors_even_when_a_parameter_matches() {
    let params: Params = "[task]\nfoo = 1\n".parse().expect("valid params");
    let facts = TaskFacts {
        name: "modules",
        log: Path::new("m.log"),
        outdir: Path::new("."),
        outputs: &[],
    };

    for template in ["run --x={task.foo}", "run --x={task.foo?}"] {
        let err = render(template, &params, &facts).unwrap_err();
        assert!(err.contains("unknown task field 'task.foo'"), "{err}");
    }
    assert_eq!(render("{task.name}", &params, &facts).as_deref(), Ok("modules"));
}
