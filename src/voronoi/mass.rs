//! # Voronoi 质量划分
//!
//! 在周期边界条件下对参考点集做 Voronoi 剖分，以每个点所属胞的
//! 面积（2D）或体积（3D）作为输运质量，归一化后总和为 1。
//!
//! ## 算法概述
//! 1. 包裹参考点并复制到 3^d - 1 个相邻镜像
//! 2. 对每个原始点，从包围盒出发，按规范顺序（距离、坐标）用所有
//!    镜像点的中垂半空间裁剪
//! 3. 只保留原始点自身的胞测度，镜像点的胞不计
//! 4. 排序求和后归一化（与点的输入顺序无关）
//!
//! 退化输入（点数不足、晶胞内坐标共线/共面、位置重合、空胞、胞未铺满晶胞）
//! 退回均匀质量 1/N，并返回 `DegenerateGeometryWarning`。
//!
//! ## 依赖关系
//! - 被 `transport/` 和 `batch/aggregate.rs` 使用
//! - 使用 `voronoi/cell.rs` 裁剪凸胞
//! - 使用 `geometry/periodic.rs` 的 wrap / replicate / 最小镜像
//! - 使用 `rayon` 并行计算各胞

use crate::error::{Result, WeaverError};
use crate::geometry::{
    cross, dot, minimum_image_displacement, norm, replicate, scale, sub, wrap, LatticeVectors,
};
use crate::models::{Dim, PointSet};
use crate::voronoi::cell::{ConvexPolygon, ConvexPolyhedron};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, warn};

/// 最小镜像距离小于该值的两个点视为重合
const COINCIDENT_TOLERANCE: f64 = 1e-8;

/// 共线/共面判据的相对容差（相对于晶格尺度）
const FLATNESS_TOLERANCE: f64 = 1e-8;

/// 胞测度之和与晶胞测度的最大相对偏差
const COVERAGE_TOLERANCE: f64 = 1e-6;

/// 镜像复制层数上限
const MAX_IMAGE_RANGE: i64 = 6;

/// 每个参考点的归一化输运质量
#[derive(Debug, Clone, PartialEq)]
pub struct VoronoiMass {
    weights: Vec<f64>,
}

impl VoronoiMass {
    /// 均匀质量 1/N
    pub fn uniform(n: usize) -> Self {
        let w = if n == 0 { 0.0 } else { 1.0 / n as f64 };
        VoronoiMass {
            weights: vec![w; n],
        }
    }

    /// 由胞测度归一化
    fn from_measures(measures: &[f64]) -> Self {
        let total = stable_sum(measures);
        VoronoiMass {
            weights: measures.iter().map(|m| m / total).collect(),
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// 质量总和（应为 1）
    pub fn total(&self) -> f64 {
        stable_sum(&self.weights)
    }
}

/// 退化几何警告（非致命，质量已退回均匀分布）
#[derive(Debug, Clone, PartialEq)]
pub enum DegenerateGeometryWarning {
    /// 点数少于剖分所需的 d + 1
    TooFewPoints { count: usize, required: usize },
    /// 所有点共线
    Collinear,
    /// 所有点共面（三维）
    Coplanar,
    /// 两个点在周期意义下重合
    CoincidentSites { first: usize, second: usize },
    /// 某个胞的测度非正或非有限
    EmptyCell { index: usize },
    /// 各胞测度之和未铺满晶胞
    IncompleteTiling { coverage: f64 },
}

impl fmt::Display for DegenerateGeometryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateGeometryWarning::TooFewPoints { count, required } => write!(
                f,
                "only {} points, at least {} needed for a tessellation",
                count, required
            ),
            DegenerateGeometryWarning::Collinear => write!(f, "reference points are collinear"),
            DegenerateGeometryWarning::Coplanar => write!(f, "reference points are coplanar"),
            DegenerateGeometryWarning::CoincidentSites { first, second } => write!(
                f,
                "points {} and {} coincide under periodic boundary conditions",
                first, second
            ),
            DegenerateGeometryWarning::EmptyCell { index } => {
                write!(f, "Voronoi cell of point {} has no finite positive measure", index)
            }
            DegenerateGeometryWarning::IncompleteTiling { coverage } => write!(
                f,
                "Voronoi cells cover {:.9} of the periodic cell instead of 1",
                coverage
            ),
        }
    }
}

/// 构建周期 Voronoi 质量
///
/// 退化时返回均匀质量和警告，不报错；维度不符或点集为空时报 `ShapeMismatch`。
pub fn build(
    reference: &PointSet,
    lattice: &LatticeVectors,
) -> Result<(VoronoiMass, Option<DegenerateGeometryWarning>)> {
    if reference.dim() != lattice.dim() {
        return Err(WeaverError::shape(format!(
            "Reference points are {} but lattice is {}",
            reference.dim(),
            lattice.dim()
        )));
    }
    if reference.is_empty() {
        return Err(WeaverError::shape("Reference point set is empty"));
    }

    let n = reference.len();

    if let Some(warning) = detect_degeneracy(reference, lattice) {
        warn!("Degenerate reference geometry ({}); using uniform mass", warning);
        return Ok((VoronoiMass::uniform(n), Some(warning)));
    }

    let measures = cell_measures(reference, lattice);

    if let Some(index) = measures.iter().position(|m| !m.is_finite() || *m <= 0.0) {
        let warning = DegenerateGeometryWarning::EmptyCell { index };
        warn!("Degenerate reference geometry ({}); using uniform mass", warning);
        return Ok((VoronoiMass::uniform(n), Some(warning)));
    }

    let coverage = stable_sum(&measures) / lattice.measure();
    debug!(
        "Voronoi tessellation of {} points covers {:.9} of the cell",
        n, coverage
    );
    if let Some(warning) = tiling_warning(coverage) {
        warn!("Degenerate reference geometry ({}); using uniform mass", warning);
        return Ok((VoronoiMass::uniform(n), Some(warning)));
    }

    Ok((VoronoiMass::from_measures(&measures), None))
}

/// 输运质量的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// Voronoi 胞测度
    #[default]
    Voronoi,
    /// 均匀 1/N
    Uniform,
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Voronoi => write!(f, "voronoi"),
            Weighting::Uniform => write!(f, "uniform"),
        }
    }
}

/// 按指定方式构建质量；均匀质量同样校验维度与点数
pub fn build_weighted(
    reference: &PointSet,
    lattice: &LatticeVectors,
    weighting: Weighting,
) -> Result<(VoronoiMass, Option<DegenerateGeometryWarning>)> {
    match weighting {
        Weighting::Voronoi => build(reference, lattice),
        Weighting::Uniform => {
            if reference.dim() != lattice.dim() {
                return Err(WeaverError::shape(format!(
                    "Reference points are {} but lattice is {}",
                    reference.dim(),
                    lattice.dim()
                )));
            }
            if reference.is_empty() {
                return Err(WeaverError::shape("Reference point set is empty"));
            }
            Ok((VoronoiMass::uniform(reference.len()), None))
        }
    }
}

/// 每个原始点的 Voronoi 胞测度（未归一化）
///
/// 先用最近一层镜像剖分；若某个胞半径过大、可能存在未复制的相关镜像，
/// 则扩大复制层数重新剖分。
pub(crate) fn cell_measures(reference: &PointSet, lattice: &LatticeVectors) -> Vec<f64> {
    let wrapped: Vec<[f64; 3]> = reference
        .points()
        .iter()
        .map(|p| wrap(p, lattice))
        .collect();
    let spacing = lattice.min_plane_spacing();

    let mut range = 1;
    loop {
        let cells = clip_cells(&wrapped, lattice, range);
        let max_radius = cells.iter().map(|c| c.1).fold(0.0_f64, f64::max);
        let required = (2.0 * max_radius / spacing).ceil() as i64;

        if required <= range {
            debug!("Voronoi cells resolved with {} image layer(s)", range);
            return cells.into_iter().map(|c| c.0).collect();
        }
        if range >= MAX_IMAGE_RANGE {
            warn!(
                "Voronoi cells need {} image layers but at most {} are replicated; measures may be truncated",
                required, MAX_IMAGE_RANGE
            );
            return cells.into_iter().map(|c| c.0).collect();
        }
        range = required.min(MAX_IMAGE_RANGE);
    }
}

/// 用 range 层镜像裁剪所有胞，返回 (测度, 半径)
fn clip_cells(wrapped: &[[f64; 3]], lattice: &LatticeVectors, range: i64) -> Vec<(f64, f64)> {
    let images = replicate(wrapped, lattice, range);
    let half = lattice.span();

    (0..wrapped.len())
        .into_par_iter()
        .map(|i| {
            let center = wrapped[i];

            let mut sites: Vec<(f64, [f64; 3])> = images
                .iter()
                .filter(|im| !(im.origin == i && im.is_original()))
                .map(|im| {
                    let d = sub(&im.position, &center);
                    (dot(&d, &d), im.position)
                })
                .collect();
            sites.sort_by(canonical_order);

            match lattice.dim() {
                Dim::Two => {
                    let mut cell = ConvexPolygon::square(&center, half);
                    let mut radius = cell.radius(&center);
                    for (dist_sq, site) in &sites {
                        if dist_sq.sqrt() / 2.0 > radius {
                            break;
                        }
                        let (normal, offset) = bisector(&center, site);
                        cell.clip(&normal, offset);
                        radius = cell.radius(&center);
                    }
                    (cell.area(), radius)
                }
                Dim::Three => {
                    let mut cell = ConvexPolyhedron::cube(&center, half);
                    let mut radius = cell.radius(&center);
                    for (dist_sq, site) in &sites {
                        if dist_sq.sqrt() / 2.0 > radius {
                            break;
                        }
                        let (normal, offset) = bisector(&center, site);
                        cell.clip(&normal, offset);
                        radius = cell.radius(&center);
                    }
                    (cell.volume(), radius)
                }
            }
        })
        .collect()
}

/// center 与 site 的中垂半空间: n·x <= offset
fn bisector(center: &[f64; 3], site: &[f64; 3]) -> ([f64; 3], f64) {
    let normal = sub(site, center);
    let midpoint = scale(&[center[0] + site[0], center[1] + site[1], center[2] + site[2]], 0.5);
    let offset = dot(&normal, &midpoint);
    (normal, offset)
}

/// 距离优先，其次按坐标字典序
fn canonical_order(a: &(f64, [f64; 3]), b: &(f64, [f64; 3])) -> Ordering {
    a.0.total_cmp(&b.0)
        .then_with(|| a.1[0].total_cmp(&b.1[0]))
        .then_with(|| a.1[1].total_cmp(&b.1[1]))
        .then_with(|| a.1[2].total_cmp(&b.1[2]))
}

/// 覆盖率偏离 1 时给出警告（镜像层数不足等）
fn tiling_warning(coverage: f64) -> Option<DegenerateGeometryWarning> {
    if coverage.is_finite() && (coverage - 1.0).abs() <= COVERAGE_TOLERANCE {
        None
    } else {
        Some(DegenerateGeometryWarning::IncompleteTiling { coverage })
    }
}

/// 与顺序无关的求和：先升序排序
fn stable_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.iter().sum()
}

/// 检测无法剖分的参考构型
fn detect_degeneracy(
    reference: &PointSet,
    lattice: &LatticeVectors,
) -> Option<DegenerateGeometryWarning> {
    let points = reference.points();
    let n = points.len();
    let required = lattice.dim().count() + 1;

    if n < required {
        return Some(DegenerateGeometryWarning::TooFewPoints { count: n, required });
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let d = minimum_image_displacement(&points[i], &points[j], lattice);
            if norm(&d) < COINCIDENT_TOLERANCE {
                return Some(DegenerateGeometryWarning::CoincidentSites {
                    first: i,
                    second: j,
                });
            }
        }
    }

    // 秩判据使用包裹到晶胞内的坐标；最小镜像位移可能把不共线的点折叠到一条线上
    let wrapped: Vec<[f64; 3]> = points.iter().map(|p| wrap(p, lattice)).collect();
    let rel: Vec<[f64; 3]> = wrapped.iter().map(|p| sub(p, &wrapped[0])).collect();
    let tol = FLATNESS_TOLERANCE * lattice.span().max(1.0);

    // 离原点最远的点确定方向 u
    let u = rel
        .iter()
        .copied()
        .max_by(|a, b| norm(a).total_cmp(&norm(b)))
        .unwrap_or([0.0; 3]);
    let u_len = norm(&u);
    if u_len <= tol {
        return Some(DegenerateGeometryWarning::Collinear);
    }

    // 到直线 (0, u) 的距离
    let off_line = |v: &[f64; 3]| norm(&cross(&u, v)) / u_len;
    let v = rel
        .iter()
        .copied()
        .max_by(|a, b| off_line(a).total_cmp(&off_line(b)))
        .unwrap_or([0.0; 3]);
    if off_line(&v) <= tol {
        return Some(DegenerateGeometryWarning::Collinear);
    }

    if lattice.dim() == Dim::Three {
        let normal = cross(&u, &v);
        let n_len = norm(&normal);
        let off_plane = rel
            .iter()
            .map(|r| dot(&normal, r).abs() / n_len)
            .fold(0.0_f64, f64::max);
        if off_plane <= tol {
            return Some(DegenerateGeometryWarning::Coplanar);
        }
    }

    None
}
