//! # batch 子命令 CLI 定义
//!
//! 一个参考结构对一个目录中全部弛豫结构的批量距离计算，
//! 或由 TOML 计划文件描述的多结构 × 多分析批处理。
//!
//! 这里的可选参数在提供时覆盖计划文件中的 `[defaults]`。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/batch.rs`

use super::common::WeightsArg;
use crate::models::Selection;
use clap::Args;
use std::path::PathBuf;

/// batch 子命令参数
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// TOML batch plan listing structures and analyses
    #[arg(short, long, conflicts_with_all = ["reference", "relaxed_dir", "name", "select"])]
    pub config: Option<PathBuf>,

    /// Reference (pristine) structure file
    #[arg(short, long, required_unless_present = "config")]
    pub reference: Option<PathBuf>,

    /// Directory containing the relaxed structures
    #[arg(short = 'd', long, required_unless_present = "config")]
    pub relaxed_dir: Option<PathBuf>,

    /// Output root; results go to <output>/<structure>/<analysis>/
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Structure name used in the output path (default: reference file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Atoms to compare: 'all', 'species:<symbol>' or 'type:<int>'
    #[arg(short, long)]
    pub select: Option<Selection>,

    /// Periodic dimensionality (2 or 3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub dim: Option<u8>,

    /// Wasserstein order p
    #[arg(short, long)]
    pub p: Option<f64>,

    /// Solve the full transport problem instead of matching atoms by index
    #[arg(long, default_value_t = false)]
    pub unmatched: bool,

    /// Transport mass weighting
    #[arg(long, value_enum)]
    pub weights: Option<WeightsArg>,

    /// Glob pattern for relaxed structure files (comma-separated)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Regex with named groups 'seed' and 'level' applied to file names
    #[arg(long)]
    pub key_regex: Option<String>,

    /// Search the relaxed directory recursively
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Maximum allowed difference between relaxed and reference cells (Angstrom)
    #[arg(long)]
    pub cell_tolerance: Option<f64>,

    /// Number of parallel jobs (0 = number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Cancel the remaining entries once more than this many are missing
    #[arg(long)]
    pub max_missing: Option<usize>,

    /// Do not print the per-level summary table
    #[arg(long, default_value_t = false)]
    pub no_table: bool,
}
