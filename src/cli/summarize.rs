//! # summarize 子命令 CLI 定义
//!
//! 从已有的 distances.csv 重新计算按损坏程度的统计
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/summarize.rs`

use clap::Args;
use std::path::PathBuf;

/// summarize 子命令参数
#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// distances.csv written by `weaver batch`
    pub distances: PathBuf,

    /// Write the per-level summary to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
