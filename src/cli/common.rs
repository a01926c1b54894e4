//! # 共享 CLI 参数
//!
//! 多个子命令共用的子晶格选择与度量参数。
//!
//! ## 依赖关系
//! - 被 `cli/distance.rs`, `cli/masses.rs`, `cli/batch.rs` 使用

use crate::error::Result;
use crate::models::{Dim, Selection};
use crate::transport::{Correspondence, DistanceOptions};
use crate::voronoi::Weighting;

use clap::{Args, ValueEnum};

/// 输运质量权重
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum WeightsArg {
    /// Voronoi cell area (2D) or volume (3D)
    Voronoi,
    /// Equal mass 1/N for every site
    Uniform,
}

impl From<WeightsArg> for Weighting {
    fn from(arg: WeightsArg) -> Self {
        match arg {
            WeightsArg::Voronoi => Weighting::Voronoi,
            WeightsArg::Uniform => Weighting::Uniform,
        }
    }
}

/// 子晶格选择参数
#[derive(Args, Debug, Clone)]
pub struct SublatticeArgs {
    /// Atoms to compare: 'all', 'species:<symbol>' or 'type:<int>'
    #[arg(short, long, default_value = "all")]
    pub select: Selection,

    /// Periodic dimensionality; 2 projects positions onto the xy plane
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub dim: u8,
}

impl SublatticeArgs {
    pub fn dim(&self) -> Result<Dim> {
        Dim::from_count(self.dim as usize)
    }
}

/// 距离度量参数
#[derive(Args, Debug, Clone)]
pub struct MetricArgs {
    /// Wasserstein order p
    #[arg(short, long, default_value_t = 2.0)]
    pub p: f64,

    /// Solve the full transport problem instead of matching atoms by index
    #[arg(long, default_value_t = false)]
    pub unmatched: bool,

    /// Transport mass weighting
    #[arg(long, value_enum, default_value_t = WeightsArg::Voronoi)]
    pub weights: WeightsArg,
}

impl MetricArgs {
    pub fn distance_options(&self) -> DistanceOptions {
        DistanceOptions {
            p: self.p,
            correspondence: correspondence(self.unmatched),
        }
    }

    pub fn weights_label(&self) -> String {
        Weighting::from(self.weights).to_string()
    }
}

pub fn correspondence(unmatched: bool) -> Correspondence {
    if unmatched {
        Correspondence::Unmatched
    } else {
        Correspondence::Tracked
    }
}
