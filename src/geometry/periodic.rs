//! # 周期边界工具
//!
//! ## 功能
//! - `wrap`: 将坐标映射到规范晶胞（分数坐标 [0, 1)）
//! - `minimum_image_displacement`: 最小镜像约定下的位移
//! - `image_shifts` / `replicate`: 周期镜像平移与点集复制
//!
//! 对斜交晶胞，最小镜像不能逐轴独立求取，必须在取整后的镜像周围
//! 检查完整的 3^d 个相邻镜像。
//!
//! ## 依赖关系
//! - 被 `voronoi/` 和 `transport/` 调用
//! - 使用 `geometry/lattice.rs`

use crate::geometry::{add, dot, sub, LatticeVectors};
use crate::models::Dim;

/// 分数坐标距 1 小于该值时折回 0
const WRAP_SNAP: f64 = 1e-12;

/// 周期镜像点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Image {
    /// 原始点索引
    pub origin: usize,
    /// 晶格平移（整数镜像指标）
    pub shift: [i64; 3],
    /// 笛卡尔坐标
    pub position: [f64; 3],
}

impl Image {
    /// 是否为原胞中的原始点
    pub fn is_original(&self) -> bool {
        self.shift == [0, 0, 0]
    }
}

/// 将坐标包裹进规范晶胞
pub fn wrap(point: &[f64; 3], lattice: &LatticeVectors) -> [f64; 3] {
    let mut frac = lattice.to_fractional(point);
    for f in frac.iter_mut().take(lattice.dim().count()) {
        let mut w = *f - f.floor();
        if w >= 1.0 - WRAP_SNAP {
            w = 0.0;
        }
        *f = w;
    }
    lattice.to_cartesian(&frac)
}

/// 最小镜像位移：在 q 的所有周期镜像中取离 p 最近者，返回 q' - p
///
/// 候选镜像为取整镜像周围的 3^d 个镜像加上未平移的 q；
/// 距离相同时按镜像指标的字典序取第一个。
pub fn minimum_image_displacement(
    p: &[f64; 3],
    q: &[f64; 3],
    lattice: &LatticeVectors,
) -> [f64; 3] {
    let naive = sub(q, p);
    let frac = lattice.to_fractional(&naive);
    let n = lattice.dim().count();

    let mut base = [0i64; 3];
    for k in 0..n {
        if frac[k].is_finite() {
            base[k] = -(frac[k].round() as i64);
        }
    }

    let mut candidates: Vec<[i64; 3]> = image_shifts(lattice.dim(), 1)
        .into_iter()
        .map(|s| [base[0] + s[0], base[1] + s[1], base[2] + s[2]])
        .collect();
    candidates.push([0, 0, 0]);
    candidates.sort_unstable();
    candidates.dedup();

    let mut best = naive;
    let mut best_sq = f64::INFINITY;
    for k in candidates {
        let v = if k == [0, 0, 0] {
            naive
        } else {
            add(
                &naive,
                &lattice.to_cartesian(&[k[0] as f64, k[1] as f64, k[2] as f64]),
            )
        };
        let sq = dot(&v, &v);
        if sq < best_sq {
            best = v;
            best_sq = sq;
        }
    }
    best
}

/// 字典序排列的整数平移 [-range, range]^d（含原点）
pub fn image_shifts(dim: Dim, range: i64) -> Vec<[i64; 3]> {
    let mut shifts = Vec::new();
    for a in -range..=range {
        for b in -range..=range {
            match dim {
                Dim::Two => shifts.push([a, b, 0]),
                Dim::Three => {
                    for c in -range..=range {
                        shifts.push([a, b, c]);
                    }
                }
            }
        }
    }
    shifts
}

/// 将点集复制到周围 range 层的周期镜像中
pub fn replicate(points: &[[f64; 3]], lattice: &LatticeVectors, range: i64) -> Vec<Image> {
    let shifts = image_shifts(lattice.dim(), range);
    let mut images = Vec::with_capacity(shifts.len() * points.len());

    for shift in shifts {
        let offset = lattice.to_cartesian(&[shift[0] as f64, shift[1] as f64, shift[2] as f64]);
        for (origin, p) in points.iter().enumerate() {
            images.push(Image {
                origin,
                shift,
                position: add(p, &offset),
            });
        }
    }

    images
}
