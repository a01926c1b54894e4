//! # 最优输运距离模块
//!
//! 基于 Voronoi 质量的周期 p-Wasserstein 距离。
//!
//! ## 子模块
//! - `distance`: 距离计算入口与选项
//! - `plan`: 最小费用流求解离散输运方案
//!
//! ## 依赖关系
//! - 被 `batch/`, `commands/` 使用
//! - 使用 `geometry/`, `voronoi/`

pub mod distance;
pub mod plan;

pub use distance::{calculate_distance, Correspondence, DistanceOptions};
