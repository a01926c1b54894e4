//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `distance`: 两个结构之间的距离
//! - `masses`: 参考结构的 Voronoi 质量
//! - `batch`: 批量距离计算与统计
//! - `summarize`: 由 distances.csv 重新统计
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: common, distance, masses, batch, summarize

pub mod batch;
pub mod common;
pub mod distance;
pub mod masses;
pub mod summarize;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// weaver - 损坏势函数下弛豫结构的周期 Wasserstein 距离
#[derive(Parser)]
#[command(name = "weaver")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "Periodic Voronoi-weighted Wasserstein distances between relaxed structures",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, env = "WEAVER_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Distance between a reference structure and one comparison structure
    Distance(distance::DistanceArgs),

    /// Periodic Voronoi masses of a reference structure
    Masses(masses::MassesArgs),

    /// Distances for every (seed, level) relaxed structure of a reference
    Batch(batch::BatchArgs),

    /// Per-level statistics from an existing distances.csv
    Summarize(summarize::SummarizeArgs),
}
