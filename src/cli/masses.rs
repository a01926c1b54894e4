//! # masses 子命令 CLI 定义
//!
//! 输出参考结构的周期 Voronoi 质量
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/masses.rs`

use super::common::SublatticeArgs;
use clap::Args;
use std::path::PathBuf;

/// masses 子命令参数
#[derive(Args, Debug)]
pub struct MassesArgs {
    /// Reference structure file (.xyz/.extxyz or POSCAR)
    pub reference: PathBuf,

    #[command(flatten)]
    pub sublattice: SublatticeArgs,

    /// Write per-site masses to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of sites to print in the terminal table
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,
}
