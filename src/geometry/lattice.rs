//! # 晶格向量
//!
//! 经过校验的 2x2 / 3x3 晶格矩阵，缓存逆矩阵用于分数坐标转换。
//!
//! ## 约定
//! - 行向量表示 a, b (, c)
//! - 二维晶格以 3x3 形式存储，第三行固定为 (0, 0, 1)
//!
//! ## 依赖关系
//! - 被 `geometry/periodic.rs`, `voronoi/`, `transport/` 使用
//! - 使用 `models/point_set.rs` 的 Dim

use crate::error::{Result, WeaverError};
use crate::geometry::{cross, norm};
use crate::models::Dim;

/// 行列式绝对值低于该值视为奇异
pub const SINGULAR_TOLERANCE: f64 = 1e-10;

/// 周期性晶胞
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeVectors {
    dim: Dim,
    matrix: [[f64; 3]; 3],
    inverse: [[f64; 3]; 3],
    determinant: f64,
}

impl LatticeVectors {
    /// 二维晶胞
    pub fn new_2d(m: [[f64; 2]; 2]) -> Result<Self> {
        Self::build(
            Dim::Two,
            [[m[0][0], m[0][1], 0.0], [m[1][0], m[1][1], 0.0], [0.0, 0.0, 1.0]],
        )
    }

    /// 三维晶胞
    pub fn new_3d(m: [[f64; 3]; 3]) -> Result<Self> {
        Self::build(Dim::Three, m)
    }

    /// 从结构文件的 3x3 矩阵创建；二维时取左上 2x2 块
    pub fn from_matrix(dim: Dim, m: [[f64; 3]; 3]) -> Result<Self> {
        match dim {
            Dim::Two => Self::new_2d([[m[0][0], m[0][1]], [m[1][0], m[1][1]]]),
            Dim::Three => Self::new_3d(m),
        }
    }

    fn build(dim: Dim, m: [[f64; 3]; 3]) -> Result<Self> {
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);

        if !det.is_finite() || det.abs() < SINGULAR_TOLERANCE {
            return Err(WeaverError::InvalidLattice { determinant: det });
        }

        let inverse = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        Ok(LatticeVectors {
            dim,
            matrix: m,
            inverse,
            determinant: det,
        })
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn matrix(&self) -> &[[f64; 3]; 3] {
        &self.matrix
    }

    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    /// 晶胞面积（2D）或体积（3D）
    pub fn measure(&self) -> f64 {
        self.determinant.abs()
    }

    /// 第 i 个晶格向量
    pub fn vector(&self, i: usize) -> [f64; 3] {
        self.matrix[i]
    }

    /// 各周期方向晶格向量长度之和
    pub fn span(&self) -> f64 {
        (0..self.dim.count()).map(|i| norm(&self.matrix[i])).sum()
    }

    /// 最小晶面间距（沿各周期方向相邻晶格平面的距离取最小）
    pub fn min_plane_spacing(&self) -> f64 {
        let m = &self.matrix;
        match self.dim {
            Dim::Two => [m[1], m[0]]
                .iter()
                .map(|v| self.measure() / norm(v))
                .fold(f64::INFINITY, f64::min),
            Dim::Three => [(1, 2), (2, 0), (0, 1)]
                .iter()
                .map(|&(i, j)| self.measure() / norm(&cross(&m[i], &m[j])))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// 笛卡尔坐标转分数坐标: f = cart · M⁻¹
    pub fn to_fractional(&self, cart: &[f64; 3]) -> [f64; 3] {
        let inv = &self.inverse;
        [
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ]
    }

    /// 分数坐标转笛卡尔坐标: cart = f · M
    pub fn to_cartesian(&self, frac: &[f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 维度相同且各分量差不超过 tolerance
    pub fn is_compatible(&self, other: &LatticeVectors, tolerance: f64) -> bool {
        self.dim == other.dim
            && self
                .matrix
                .iter()
                .flatten()
                .zip(other.matrix.iter().flatten())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagonal() -> LatticeVectors {
        LatticeVectors::new_2d([[3.1841, 0.0], [-1.5920, 2.7575]]).unwrap()
    }

    #[test]
    fn test_singular_lattice_rejected() {
        let err = LatticeVectors::new_2d([[1.0, 2.0], [2.0, 4.0]]).unwrap_err();
        assert!(matches!(err, WeaverError::InvalidLattice { .. }));

        let err = LatticeVectors::new_3d([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, WeaverError::InvalidLattice { .. }));

        let err = LatticeVectors::new_2d([[f64::NAN, 0.0], [0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, WeaverError::InvalidLattice { .. }));
    }

    #[test]
    fn test_fractional_round_trip_skewed() {
        let lattice = hexagonal();
        let cart = [1.3, -0.7, 0.0];
        let frac = lattice.to_fractional(&cart);
        let back = lattice.to_cartesian(&frac);
        for k in 0..3 {
            assert!((back[k] - cart[k]).abs() < 1e-12);
        }
        // b 向量的分数坐标应为 (0, 1)
        let fb = lattice.to_fractional(&lattice.vector(1));
        assert!((fb[0]).abs() < 1e-12);
        assert!((fb[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_measure_two_and_three_dimensional() {
        let lattice = hexagonal();
        assert!((lattice.measure() - 3.1841 * 2.7575).abs() < 1e-9);

        let cubic =
            LatticeVectors::new_3d([[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 4.0]]).unwrap();
        assert!((cubic.measure() - 24.0).abs() < 1e-12);
        assert!((cubic.span() - 9.0).abs() < 1e-12);
        assert!((cubic.min_plane_spacing() - 2.0).abs() < 1e-12);

        // 六角晶胞的晶面间距为 a·sin(60°)
        assert!((lattice.min_plane_spacing() - 2.7575).abs() < 1e-3);
    }

    #[test]
    fn test_from_matrix_takes_planar_block() {
        let m = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 30.0]];
        let planar = LatticeVectors::from_matrix(Dim::Two, m).unwrap();
        assert_eq!(planar.dim(), Dim::Two);
        assert!((planar.measure() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_compatibility() {
        let a = hexagonal();
        let b = LatticeVectors::new_2d([[3.1841 + 1e-8, 0.0], [-1.5920, 2.7575]]).unwrap();
        let c = LatticeVectors::new_2d([[3.3, 0.0], [-1.5920, 2.7575]]).unwrap();
        assert!(a.is_compatible(&b, 1e-6));
        assert!(!a.is_compatible(&c, 1e-6));
    }
}
