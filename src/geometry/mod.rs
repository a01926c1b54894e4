//! # 周期几何模块
//!
//! 提供晶格向量校验、周期性包裹、最小镜像位移与周期复制。
//!
//! ## 子模块
//! - `lattice`: 晶格向量与分数坐标转换
//! - `periodic`: wrap / 最小镜像 / 周期镜像复制
//!
//! ## 依赖关系
//! - 被 `voronoi/`, `transport/`, `models/` 使用
//! - 使用 `models/point_set.rs` 的 Dim

pub mod lattice;
pub mod periodic;

pub use lattice::LatticeVectors;
pub use periodic::{minimum_image_displacement, replicate, wrap};

/// 向量差 a - b
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// 向量和 a + b
pub fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// 数乘
pub fn scale(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// 向量点积
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 向量叉积
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 欧氏范数
pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
