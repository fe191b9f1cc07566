// src/pipelines/wgcna.rs

//! The WGCNA co-expression pipeline.
//!
//! Each stage runs one of the pipeline's R scripts (found under
//! `{wgcna_dir}/R`) and writes into `wgcna.dir/<stage>.dir`. Module
//! detection is either stepwise (adjacency, TOM, modules) or blockwise,
//! chosen by `params.module.detection`.
//!
//! Stage graph:
//!
//! ```text
//! annotation   clean ──┬── soft_power ───────────────────────────┐
//!     │          │     └── [adjacency → tom →] modules           │
//!     │          │                               │               │
//!     └──────────┴──────── membership ◄──────────┤               │
//!                              │                 └── genelists ──┤
//!                 eigengenes ◄─┤                                 │
//!                              └── genesets → summarise_genesets ┤
//!                                                                ▼
//!                                                      report → full
//! ```

use std::path::Path;

use tracing::debug;

use crate::config::Params;
use crate::dag::{Invocation, RegistryBuilder, TaskSpec};
use crate::errors::{PipedagError, Result};
use crate::store::ArtifactStore;

pub const NAME: &str = "wgcna";

const CLEAN_DATA: &str = "wgcna.dir/clean.dir/clean.RData";
const SOFT_POWER_SENTINEL: &str = "wgcna.dir/soft.power.dir/soft.power.sentinel";
const ADJACENCY_DATA: &str = "wgcna.dir/modules.dir/adjacency.RData";
const TOM_DATA: &str = "wgcna.dir/modules.dir/TOM.RData";
const MODULE_DATA: &str = "wgcna.dir/modules.dir/modules.RData";
const MEMBERSHIP_TSV: &str = "wgcna.dir/membership.dir/membership.tsv";
const EIGENGENES_TSV: &str = "wgcna.dir/membership.dir/eigengenes.tsv";
const EIGENGENES_SENTINEL: &str = "wgcna.dir/eigengenes.dir/eigengenes.sentinel";
const GENELISTS_SENTINEL: &str = "wgcna.dir/eigengenes.dir/eigengenes.vs.genelists.sentinel";
const GENESETS_SENTINEL: &str = "wgcna.dir/genesets.dir/geneset.analysis.sentinel";
const SUMMARISE_SENTINEL: &str = "wgcna.dir/genesets.dir/summarise.geneset.analysis.sentinel";
const ENTREZ_MAP: &str = "annotation.dir/ensembl.to.entrez.tsv.gz";
const KEGG_PATHWAYS: &str = "annotation.dir/kegg_pathways.rds";
const REPORT_PDF: &str = "report.dir/summary.report.pdf";

/// Prints the distinct values of the `module` column of the membership table.
const LIST_MODULES: &str = r#"awk -F'\t' 'NR == 1 { for (i = 1; i <= NF; i++) if ($i == "module") col = i; next } { print $col }' wgcna.dir/membership.dir/membership.tsv | sort -u"#;

/// Parameter tables holding named GMT files, in the order they are passed on.
const GMT_TABLES: &[&str] = &["gmt.celltype_files", "gmt.pathway_files"];

/// How co-expression modules are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleDetection {
    Stepwise,
    Blockwise,
}

impl ModuleDetection {
    pub fn from_params(params: &Params) -> Result<Self> {
        match params.get_str("module.detection") {
            Some("stepwise") => Ok(ModuleDetection::Stepwise),
            Some("blockwise") => Ok(ModuleDetection::Blockwise),
            other => Err(PipedagError::ConfigError(format!(
                "params.module.detection must be \"stepwise\" or \"blockwise\" (got {})",
                other.map(|s| format!("\"{s}\"")).unwrap_or_else(|| "nothing".to_string())
            ))),
        }
    }
}

/// Register every WGCNA stage, in pipeline order.
pub fn register(builder: &mut RegistryBuilder<'_>) -> Result<()> {
    let detection = ModuleDetection::from_params(builder.params())?;
    let genelists = builder.params().is_set("input.genelists");
    let genesets = builder.params().get_bool("run_genesets").unwrap_or(false);
    debug!(?detection, genelists, genesets, "registering wgcna pipeline");

    let mut stages = vec![annotation(), clean(builder.params()), soft_power()];
    match detection {
        ModuleDetection::Stepwise => stages.extend([adjacency(), tom(), modules_stepwise()]),
        ModuleDetection::Blockwise => stages.push(modules_blockwise()),
    }
    stages.extend([membership(), eigengenes(builder.params())]);
    stages.push(gated(genelists_stage(), genelists));
    stages.push(gated(geneset_analysis(builder.params()), genesets));
    stages.push(gated(summarise_genesets(builder.params()), genesets));
    stages.push(report(genelists, genesets));
    stages.push(TaskSpec::new("full").after("report"));

    for stage in stages {
        builder.register(stage)?;
    }
    Ok(())
}

/// Disabled stages never run, so their invocation is not rendered; this
/// lets their parameter sections be left out of the config entirely.
fn gated(spec: TaskSpec, enabled: bool) -> TaskSpec {
    if enabled {
        spec
    } else {
        spec.invocation(Invocation::Aggregate).enabled(false)
    }
}

fn rscript<I, A>(script: &str, args: I) -> Invocation
where
    I: IntoIterator<Item = A>,
    A: Into<String>,
{
    let script = format!("{{wgcna_dir}}/R/{script}");
    Invocation::program(
        "Rscript",
        std::iter::once(script).chain(args.into_iter().map(Into::into)),
    )
}

/// `--flag={key}` if `key` is set, nothing otherwise.
fn optional_arg(params: &Params, flag: &str, key: &str) -> Option<String> {
    params
        .is_set(key)
        .then(|| format!("--{flag}={{{key}}}"))
}

fn r_bool(params: &Params, key: &str) -> &'static str {
    if params.get_bool(key).unwrap_or(false) {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn annotation() -> TaskSpec {
    TaskSpec::new("annotation")
        .output(ENTREZ_MAP)
        .output(KEGG_PATHWAYS)
        .invocation(rscript(
            "wgcna_fetch_geneset_annotations.R",
            [
                "--ensemblversion={annotation.ensembl_release}",
                "--ensemblhost={annotation.ensembl_host}",
                "--species={annotation.species}",
                "--outdir={task.outdir}",
            ],
        ))
}

fn clean(params: &Params) -> TaskSpec {
    let mut args: Vec<String> = [
        "--input={input.expression_data}",
        "--idcol={annotation.idcol}",
        "--outdir={task.outdir}",
        "--outfilename=clean.RData",
        "--minfraction={clean.min_fraction}",
        "--minnsamples={clean.min_n_samples}",
        "--minngenes={clean.min_n_genes}",
        "--minrelativeweight={clean.min_relative_weight}",
        "--cutheight={clean.cut_height}",
        "--minsize={clean.min_size}",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.extend(optional_arg(params, "traitdata", "input.trait_data"));

    TaskSpec::new("clean")
        .output(CLEAN_DATA)
        .invocation(rscript("wgcna_data_cleaning.R", args))
}

fn soft_power() -> TaskSpec {
    TaskSpec::new("soft_power")
        .after("clean")
        .sentinel(SOFT_POWER_SENTINEL)
        .invocation(rscript(
            "wgcna_soft_power.R",
            [
                format!("--input={CLEAN_DATA}"),
                "--outdir={task.outdir}".to_string(),
                "--networktype={module.network_type}".to_string(),
                "--adjcorfnc={module.adj_cor_fnc}".to_string(),
                "--adjdistfnc={module.adj_dist_fnc}".to_string(),
                "--threads={module.threads}".to_string(),
            ],
        ))
}

fn adjacency() -> TaskSpec {
    TaskSpec::new("adjacency")
        .after("clean")
        .output(ADJACENCY_DATA)
        .invocation(rscript(
            "wgcna_compute_adjacency.R",
            [
                format!("--input={CLEAN_DATA}"),
                "--outdir={task.outdir}".to_string(),
                "--outfilename=adjacency.RData".to_string(),
                "--threads={module.threads}".to_string(),
                "--softpower={module.soft_power}".to_string(),
                "--networktype={module.network_type}".to_string(),
                "--adjcorfnc={module.adj_cor_fnc}".to_string(),
                "--adjdistfnc={module.adj_dist_fnc}".to_string(),
            ],
        ))
}

fn tom() -> TaskSpec {
    TaskSpec::new("tom")
        .after("adjacency")
        .output(TOM_DATA)
        .invocation(rscript(
            "wgcna_compute_TOM.R",
            [
                format!("--input={ADJACENCY_DATA}"),
                "--outdir={task.outdir}".to_string(),
                "--outfilename=TOM.RData".to_string(),
                "--threads={module.threads}".to_string(),
                "--tomtype={module.tom_type}".to_string(),
            ],
        ))
}

fn modules_stepwise() -> TaskSpec {
    TaskSpec::new("modules")
        .after("tom")
        .after("clean")
        .output(MODULE_DATA)
        .invocation(rscript(
            "wgcna_detect_modules.R",
            [
                format!("--cleandata={CLEAN_DATA}"),
                format!("--tomdata={TOM_DATA}"),
                "--outdir={task.outdir}".to_string(),
                "--outfilename=modules.RData".to_string(),
                "--threads={module.threads}".to_string(),
                "--softpower={module.soft_power}".to_string(),
                "--minmodulesize={module.min_size}".to_string(),
                "--medissthreshold={module.diss_threshold}".to_string(),
                "--adjcorfnc={module.adj_cor_fnc}".to_string(),
            ],
        ))
}

fn modules_blockwise() -> TaskSpec {
    TaskSpec::new("modules")
        .after("clean")
        .output(MODULE_DATA)
        .invocation(rscript(
            "wgcna_detect_modules_blockwise.R",
            [
                format!("--input={CLEAN_DATA}"),
                "--outdir={task.outdir}".to_string(),
                "--outfilename=modules.RData".to_string(),
                "--threads={module.threads}".to_string(),
                "--maxblocksize={module.block_size}".to_string(),
                "--softpower={module.soft_power}".to_string(),
                "--networktype={module.network_type}".to_string(),
                "--adjcorfnc={module.adj_cor_fnc}".to_string(),
                "--adjdistfnc={module.adj_dist_fnc}".to_string(),
                "--tomtype={module.tom_type}".to_string(),
                "--minmodulesize={module.min_size}".to_string(),
                "--medissthreshold={module.diss_threshold}".to_string(),
            ],
        ))
}

fn membership() -> TaskSpec {
    TaskSpec::new("membership")
        .after("modules")
        .after("annotation")
        .after("clean")
        .output(MEMBERSHIP_TSV)
        .output(EIGENGENES_TSV)
        .invocation(rscript(
            "wgcna_modules_vs_traits.R",
            [
                format!("--input={CLEAN_DATA}"),
                format!("--modules={MODULE_DATA}"),
                format!("--annotation={ENTREZ_MAP}"),
                "--idcol={annotation.idcol}".to_string(),
                "--namecol={annotation.namecol}".to_string(),
                "--outdir={task.outdir}".to_string(),
                "--outfilename=membership.tsv".to_string(),
                "--threads={module.threads}".to_string(),
            ],
        ))
}

fn eigengenes(params: &Params) -> TaskSpec {
    let mut args = vec![
        format!("--eigengenes={EIGENGENES_TSV}"),
        "--namecol={annotation.namecol}".to_string(),
        format!("--membership={MEMBERSHIP_TSV}"),
    ];
    args.extend(optional_arg(params, "traitdata", "input.trait_data"));
    args.extend(optional_arg(params, "metadata", "input.meta_data"));
    args.extend([
        "--figwidth={plot.eigengene_heatmap_width}".to_string(),
        "--figheight={plot.eigengene_heatmap_height}".to_string(),
        "--outdir={task.outdir}".to_string(),
    ]);

    TaskSpec::new("eigengenes")
        .after("membership")
        .sentinel(EIGENGENES_SENTINEL)
        .invocation(rscript("wgcna_characterise_eigengenes.R", args))
}

fn genelists_stage() -> TaskSpec {
    TaskSpec::new("genelists")
        .after("modules")
        .after("annotation")
        .after("clean")
        .sentinel(GENELISTS_SENTINEL)
        .invocation(rscript(
            "wgcna_eigengenes_vs_genelists.R",
            [
                format!("--input={CLEAN_DATA}"),
                format!("--annotation={ENTREZ_MAP}"),
                format!("--modules={MODULE_DATA}"),
                "--genelists={input.genelists}".to_string(),
                "--idcol={annotation.idcol}".to_string(),
                "--namecol={annotation.namecol}".to_string(),
                "--outdir={task.outdir}".to_string(),
            ],
        ))
}

/// Comma-joined names and files of every configured GMT file, or `none`.
fn gmt_lists(params: &Params) -> (String, String) {
    let mut names = Vec::new();
    let mut files = Vec::new();
    for key in GMT_TABLES {
        let Some(table) = params.get(key).and_then(|v| v.as_table()) else {
            continue;
        };
        for (name, file) in table {
            if let Some(file) = file.as_str() {
                names.push(name.clone());
                files.push(file.to_string());
            }
        }
    }

    if names.is_empty() {
        ("none".to_string(), "none".to_string())
    } else {
        (names.join(","), files.join(","))
    }
}

/// One enrichment run per detected module, each with its own log file.
fn geneset_analysis(params: &Params) -> TaskSpec {
    let (gmt_names, gmt_files) = gmt_lists(params);
    let command = format!(
        "for module in $({LIST_MODULES}); do \
         Rscript {{wgcna_dir}}/R/wgcna_modules_vs_genesets.R \
         --input={MEMBERSHIP_TSV} \
         --module=\"$module\" \
         --species={{annotation.species}} \
         --annotation={ENTREZ_MAP} \
         --idcol={{annotation.idcol}} \
         --kegg_pathways={KEGG_PATHWAYS} \
         --gmt_names='{gmt_names}' \
         --gmt_files='{gmt_files}' \
         --outdir={{task.outdir}} \
         > {{task.outdir}}/geneset.analysis.\"$module\".log 2>&1 || exit 1; \
         done"
    );

    TaskSpec::new("genesets")
        .after("membership")
        .after("annotation")
        .sentinel(GENESETS_SENTINEL)
        .params(["wgcna_dir", "annotation.species", "annotation.idcol", "gmt"])
        .shell(command)
}

fn summarise_genesets(params: &Params) -> TaskSpec {
    let (gmt_names, _) = gmt_lists(params);
    let command = format!(
        "Rscript {{wgcna_dir}}/R/wgcna_summariseGenesets.R \
         --genesetdir={{task.outdir}} \
         --gmt_names='{gmt_names}' \
         --show_detailed={{genesets.show_detailed}} \
         --modulelist=\"$({LIST_MODULES} | paste -sd, -)\" \
         --mingenes={{genesets.min_fg_genes}} \
         --pvaluethreshold={{genesets.pvalue_threshold}} \
         --padjustmethod={{genesets.padjust_method}} \
         --useadjusted={} \
         --minoddsratio={{genesets.min_odds_ratio}} \
         --showcommon={} \
         --outprefix={{task.outdir}}/cluster.genesets \
         --prefix=genesets \
         --plotdirvar=clusterGenesetsDir",
        r_bool(params, "genesets.use_adjusted_pvalues"),
        r_bool(params, "genesets.show_common"),
    );

    TaskSpec::new("summarise_genesets")
        .after("genesets")
        .after("membership")
        .sentinel(SUMMARISE_SENTINEL)
        .params(["wgcna_dir", "genesets", "gmt"])
        .shell(command)
}

/// The summary report embeds the cleaning and module parameters, so any
/// change to them reruns it.
fn report(genelists: bool, genesets: bool) -> TaskSpec {
    let flag = |on: bool| if on { "TRUE" } else { "FALSE" };

    TaskSpec::new("report")
        .after("soft_power")
        .after("membership")
        .after("eigengenes")
        .after("genelists")
        .after("summarise_genesets")
        .output(REPORT_PDF)
        .sentinel("report.dir/report.sentinel")
        .params([
            "wgcna_dir",
            "report",
            "clean",
            "module",
            "input.genelists",
            "run_genesets",
        ])
        .invocation(rscript(
            "wgcna_summary_report.R",
            [
                "--rundir=wgcna.dir".to_string(),
                "--outdir={task.outdir}".to_string(),
                "--title={report.title}".to_string(),
                "--author={report.author}".to_string(),
                format!("--genelists={}", flag(genelists)),
                format!("--genesets={}", flag(genesets)),
            ],
        ))
}

/// Fail early when input files the pipeline reads are absent.
pub fn check_inputs<S>(params: &Params, store: &S) -> Result<()>
where
    S: ArtifactStore + ?Sized,
{
    let expression = params.get_str("input.expression_data").unwrap_or_default();
    if expression.trim().is_empty() {
        return Err(PipedagError::ConfigError(
            "params.input.expression_data must be set".to_string(),
        ));
    }
    require_file(store, "input expression data", expression)?;

    for (what, key) in [
        ("trait data", "input.trait_data"),
        ("meta data", "input.meta_data"),
        ("gene lists", "input.genelists"),
    ] {
        if !params.is_set(key) {
            continue;
        }
        if let Some(path) = params.get_str(key) {
            require_file(store, what, path)?;
        }
    }

    Ok(())
}

fn require_file<S>(store: &S, what: &str, path: &str) -> Result<()>
where
    S: ArtifactStore + ?Sized,
{
    if store.exists(Path::new(path)) {
        Ok(())
    } else {
        Err(PipedagError::ConfigError(format!(
            "{what} file not found: {path}"
        )))
    }
}

/// Configuration written by `pipedag config`.
pub const DEFAULT_CONFIG: &str = r#"# pipedag configuration for the WGCNA pipeline.
#
# Stages and their order are built in; everything under [params] feeds the
# R scripts. Changing a parameter reruns exactly the stages that use it and
# everything downstream of them.

[config]
pipeline = "wgcna"
# Directory task outputs are written to (default: this file's directory).
# root = "."
state_dir = ".pipedag"

[params]
# Checkout of the WGCNA pipeline (contains R/).
wgcna_dir = "/path/to/pipeline_wgcna"
# Run the per-module geneset enrichment stages.
run_genesets = false

[params.input]
# Expression matrix, genes x samples (required).
expression_data = "data/expression.tsv"
# Optional inputs; leave empty to skip.
trait_data = ""
meta_data = ""
genelists = ""

[params.annotation]
ensembl_release = 105
ensembl_host = "https://www.ensembl.org"
species = "hs"
idcol = "gene_id"
namecol = "gene_name"

[params.clean]
min_fraction = 0.5
min_n_samples = 4
min_n_genes = 4
min_relative_weight = 0.1
cut_height = 0
min_size = 10

[params.module]
# "stepwise" (adjacency, TOM, modules) or "blockwise".
detection = "stepwise"
threads = 4
memory = "8G"
soft_power = 12
network_type = "signed"
adj_cor_fnc = "bicor"
adj_dist_fnc = "dist"
tom_type = "signed"
min_size = 30
diss_threshold = 0.25
block_size = 5000

[params.plot]
eigengene_heatmap_width = 8
eigengene_heatmap_height = 6

[params.genesets]
min_fg_genes = 3
pvalue_threshold = 0.05
padjust_method = "BH"
use_adjusted_pvalues = true
min_odds_ratio = 1.5
show_common = true
show_detailed = "none"

# Named GMT files tested in addition to GO and KEGG.
[params.gmt.celltype_files]
[params.gmt.pathway_files]

[params.report]
title = "WGCNA summary report"
author = "pipedag"
"#;
