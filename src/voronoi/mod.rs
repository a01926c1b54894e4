//! # Voronoi 划分模块
//!
//! 周期边界条件下的 Voronoi 剖分，为每个参考点分配归一化输运质量。
//!
//! ## 子模块
//! - `cell`: 凸多边形 / 凸多面体半空间裁剪
//! - `mass`: 周期剖分与质量归一化
//!
//! ## 依赖关系
//! - 被 `transport/`, `batch/`, `commands/` 使用
//! - 使用 `geometry/`

pub mod cell;
pub mod mass;

pub use mass::{build, build_weighted, DegenerateGeometryWarning, VoronoiMass, Weighting};
