//! # distance 子命令 CLI 定义
//!
//! 计算单个参考结构与单个比较结构之间的距离
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/distance.rs`

use super::common::{MetricArgs, SublatticeArgs};
use crate::batch::collector::DEFAULT_CELL_TOLERANCE;
use clap::Args;
use std::path::PathBuf;

/// distance 子命令参数
#[derive(Args, Debug)]
pub struct DistanceArgs {
    /// Reference (pristine) structure file (.xyz/.extxyz or POSCAR)
    pub reference: PathBuf,

    /// Structure to compare against the reference
    pub comparison: PathBuf,

    #[command(flatten)]
    pub sublattice: SublatticeArgs,

    #[command(flatten)]
    pub metric: MetricArgs,

    /// Maximum allowed difference between the two cells (Angstrom)
    #[arg(long, default_value_t = DEFAULT_CELL_TOLERANCE)]
    pub cell_tolerance: f64,
}
