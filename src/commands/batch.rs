//! # batch 命令实现
//!
//! 对每个 (参考结构, 分析类型) 作业：查找弛豫结构，并行计算距离数组，
//! 按损坏程度统计，写出 `<output>/<structure>/<analysis>/` 下的 CSV。
//!
//! ## 功能
//! - 单参考结构模式（`--reference` + `--relaxed-dir`）
//! - 计划文件模式（`--config plan.toml`）
//! - 单个条目失败只记为缺失；参考结构失败只终止该作业
//!
//! ## 依赖关系
//! - 使用 `cli/batch.rs` 定义的参数
//! - 使用 `config.rs`, `batch/`
//! - 使用 `utils/output.rs`

use super::load_reference;
use super::summarize::print_summary_table;
use crate::batch::collector::{DEFAULT_CELL_TOLERANCE, DEFAULT_KEY_REGEX, DEFAULT_PATTERN};
use crate::batch::export::{write_distances_csv, write_masses_csv, write_summary_csv};
use crate::batch::{
    discover_relaxed, load_relaxed_set, run_batch, summarize, BatchOptions, BatchRunner,
    FileCollector, KeyExtractor, LoadOptions,
};
use crate::cli::batch::BatchArgs;
use crate::cli::common::correspondence;
use crate::config::{BatchPlan, PlanDefaults, PlannedJob};
use crate::error::{Result, WeaverError};
use crate::models::{Dim, Selection};
use crate::transport::DistanceOptions;
use crate::utils::output;
use crate::voronoi::Weighting;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 未指定时的输出根目录
const DEFAULT_OUTPUT: &str = "weaver_results";

/// 合并命令行与计划文件后的设置
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    dim: Dim,
    options: BatchOptions,
    pattern: String,
    key_regex: String,
    recursive: bool,
    cell_tolerance: f64,
    jobs: usize,
    max_missing: Option<usize>,
    show_table: bool,
}

impl Settings {
    /// 命令行 > 计划文件 `[defaults]` > 内置默认值
    fn resolve(args: &BatchArgs, defaults: &PlanDefaults) -> Result<Self> {
        let dim_count = args
            .dim
            .map(usize::from)
            .or(defaults.dim)
            .unwrap_or(2);
        let weighting = args
            .weights
            .map(Weighting::from)
            .or(defaults.weights)
            .unwrap_or_default();
        let distance = DistanceOptions {
            p: args.p.or(defaults.p).unwrap_or(2.0),
            correspondence: correspondence(args.unmatched || defaults.unmatched.unwrap_or(false)),
        };
        distance.validate()?;

        let cell_tolerance = args
            .cell_tolerance
            .or(defaults.cell_tolerance)
            .unwrap_or(DEFAULT_CELL_TOLERANCE);
        if !cell_tolerance.is_finite() || cell_tolerance < 0.0 {
            return Err(WeaverError::InvalidArgument(format!(
                "cell tolerance must be a non-negative number, got {}",
                cell_tolerance
            )));
        }

        Ok(Settings {
            dim: Dim::from_count(dim_count)?,
            options: BatchOptions {
                distance,
                weighting,
            },
            pattern: args
                .pattern
                .clone()
                .or_else(|| defaults.pattern.clone())
                .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            key_regex: args
                .key_regex
                .clone()
                .or_else(|| defaults.key_regex.clone())
                .unwrap_or_else(|| DEFAULT_KEY_REGEX.to_string()),
            recursive: args.recursive || defaults.recursive.unwrap_or(false),
            cell_tolerance,
            jobs: args.jobs.or(defaults.jobs).unwrap_or(0),
            max_missing: args.max_missing.or(defaults.max_missing),
            show_table: !args.no_table,
        })
    }
}

/// 输出目录名：all / type_0 / species_Mo
fn analysis_name(selection: &Selection) -> String {
    selection.to_string().replace(':', "_")
}

/// 由命令行参数或计划文件得到作业列表与输出根目录
fn plan_jobs(args: &BatchArgs) -> Result<(Vec<PlannedJob>, PlanDefaults, PathBuf)> {
    if let Some(config) = &args.config {
        let plan = BatchPlan::from_file(config)?;
        let output = args
            .output
            .clone()
            .or_else(|| plan.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        return Ok((plan.jobs()?, plan.defaults, output));
    }

    let (Some(reference), Some(relaxed_dir)) = (&args.reference, &args.relaxed_dir) else {
        return Err(WeaverError::InvalidArgument(
            "either --config or both --reference and --relaxed-dir are required".to_string(),
        ));
    };

    let structure = match &args.name {
        Some(name) => name.clone(),
        None => reference
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference".to_string()),
    };
    let selection = args.select.clone().unwrap_or_default();
    let job = PlannedJob {
        structure,
        analysis: analysis_name(&selection),
        reference: reference.clone(),
        relaxed_dir: relaxed_dir.clone(),
        pattern: None,
        selection,
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    Ok((vec![job], PlanDefaults::default(), output))
}

/// 执行 batch 命令
pub fn execute(args: BatchArgs) -> Result<()> {
    let (jobs, defaults, output_root) = plan_jobs(&args)?;
    let settings = Settings::resolve(&args, &defaults)?;
    // 正则在开始前校验一次
    let extractor = KeyExtractor::new(&settings.key_regex)?;

    output::print_header("Batch Wasserstein Distances");
    output::print_field("Jobs", &jobs.len().to_string());
    output::print_field("Dimension", &settings.dim.to_string());
    output::print_field("Order p", &settings.options.distance.p.to_string());
    output::print_field(
        "Correspondence",
        &settings.options.distance.correspondence.to_string(),
    );
    output::print_field("Weights", &settings.options.weighting.to_string());
    output::print_field("Output", &output_root.display().to_string());

    let mut failed = 0;
    for job in &jobs {
        output::print_header(&format!("{} / {}", job.structure, job.analysis));
        match run_job(job, &settings, &extractor, &output_root) {
            Ok(missing) if missing > 0 => {
                output::print_warning(&format!("{} entries missing", missing));
            }
            Ok(_) => {}
            Err(e) => {
                error!("{}/{}: {}", job.structure, job.analysis, e);
                output::print_error(&format!("{} / {}: {}", job.structure, job.analysis, e));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(WeaverError::Other(format!(
            "{} of {} batch jobs failed",
            failed,
            jobs.len()
        )));
    }
    output::print_done(&format!("{} batch jobs finished", jobs.len()));
    Ok(())
}

/// 读取阶段用掉一部分缺失上限后，计算阶段剩余的上限
fn remaining_budget(max_missing: Option<usize>, load_failed: usize) -> Option<usize> {
    max_missing.map(|limit| limit.saturating_sub(load_failed))
}

/// 执行单个作业，返回缺失条目数
fn run_job(
    job: &PlannedJob,
    settings: &Settings,
    extractor: &KeyExtractor,
    output_root: &Path,
) -> Result<usize> {
    let reference = load_reference(&job.reference, &job.selection, settings.dim)?;
    output::print_info(&format!(
        "Reference '{}': {} sites ({})",
        job.reference.display(),
        reference.points.len(),
        job.selection
    ));

    let pattern = job.pattern.as_deref().unwrap_or(&settings.pattern);
    let collector = FileCollector::new(&job.relaxed_dir)
        .with_pattern(pattern)?
        .recursive(settings.recursive);
    let files = discover_relaxed(&collector, extractor)?;
    output::print_info(&format!(
        "Found {} relaxed structures in '{}'",
        files.len(),
        job.relaxed_dir.display()
    ));

    // 每个作业、每个阶段使用独立的执行器；读取与计算共用同一个缺失上限
    let load_runner = BatchRunner::new(settings.jobs)
        .with_progress(true)
        .with_max_failures(settings.max_missing);
    info!("Using {} worker threads", load_runner.jobs());

    let load_options = LoadOptions {
        selection: job.selection.clone(),
        dim: settings.dim,
        cell_tolerance: settings.cell_tolerance,
    };
    let relaxed = load_relaxed_set(&files, &reference.lattice, &load_options, &load_runner)?;

    let load_failed = relaxed.values().filter(|r| r.is_err()).count();
    let compute_runner = BatchRunner::new(settings.jobs)
        .with_progress(true)
        .with_max_failures(remaining_budget(settings.max_missing, load_failed));
    if load_runner.is_cancelled() {
        compute_runner.cancel();
    }

    let outcome = run_batch(
        &reference.points,
        &reference.lattice,
        &relaxed,
        &settings.options,
        &compute_runner,
    )?;
    if compute_runner.is_cancelled() {
        warn!(
            "{}/{}: cancelled after too many missing entries",
            job.structure, job.analysis
        );
    }
    if let Some(w) = &outcome.warning {
        output::print_warning(&format!("Degenerate reference geometry, using uniform masses: {}", w));
    }

    let dir = job.output_dir(output_root);
    fs::create_dir_all(&dir).map_err(|e| WeaverError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let summary = summarize(&outcome.array);
    write_distances_csv(&outcome.array, &dir.join("distances.csv"))?;
    write_summary_csv(&summary, &dir.join("summary.csv"))?;
    write_masses_csv(&reference.points, &outcome.mass, &dir.join("masses.csv"))?;
    info!("Results written to {}", dir.display());

    if settings.show_table {
        print_summary_table(&summary);
    }
    output::print_success(&format!(
        "{} computed, {} missing -> '{}'",
        outcome.array.computed_count(),
        outcome.missing,
        dir.display()
    ));

    Ok(outcome.missing)
}
