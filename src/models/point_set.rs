//! # 点集数据模型
//!
//! 一个子晶格在某一快照下的有序原子坐标。
//!
//! ## 约定
//! - 坐标统一存储为 `[f64; 3]`
//! - 二维点集是 xy 平面上的投影，z 分量恒为 0
//!
//! ## 依赖关系
//! - 被 `geometry/`, `voronoi/`, `transport/`, `batch/` 使用
//! - 无外部模块依赖

use crate::error::{Result, WeaverError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 空间维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Two,
    Three,
}

impl Dim {
    /// 维度数值
    pub fn count(self) -> usize {
        match self {
            Dim::Two => 2,
            Dim::Three => 3,
        }
    }

    /// 从数值构造
    pub fn from_count(n: usize) -> Result<Self> {
        match n {
            2 => Ok(Dim::Two),
            3 => Ok(Dim::Three),
            _ => Err(WeaverError::InvalidArgument(format!(
                "Dimension must be 2 or 3, got {}",
                n
            ))),
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.count())
    }
}

/// 有序点集
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    dim: Dim,
    points: Vec<[f64; 3]>,
}

impl PointSet {
    /// 创建点集；二维时丢弃 z 分量
    pub fn new(dim: Dim, mut points: Vec<[f64; 3]>) -> Self {
        if dim == Dim::Two {
            for p in &mut points {
                p[2] = 0.0;
            }
        }
        PointSet { dim, points }
    }

    /// 从二维坐标创建
    pub fn from_xy(points: &[[f64; 2]]) -> Self {
        PointSet {
            dim: Dim::Two,
            points: points.iter().map(|p| [p[0], p[1], 0.0]).collect(),
        }
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// 按给定顺序重排点（`order[k]` 为新位置 k 的原索引）
    pub fn reordered(&self, order: &[usize]) -> Result<PointSet> {
        if order.len() != self.points.len() {
            return Err(WeaverError::shape(format!(
                "Reordering has {} indices for {} points",
                order.len(),
                self.points.len()
            )));
        }
        let points = order
            .iter()
            .map(|&i| {
                self.points.get(i).copied().ok_or_else(|| {
                    WeaverError::shape(format!("Reordering index {} out of range", i))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PointSet {
            dim: self.dim,
            points,
        })
    }

    /// 检查两个点集能否逐点比较
    pub fn ensure_comparable(&self, other: &PointSet) -> Result<()> {
        if self.dim != other.dim {
            return Err(WeaverError::shape(format!(
                "Dimensionality differs: {} vs {}",
                self.dim, other.dim
            )));
        }
        if self.len() != other.len() {
            return Err(WeaverError::shape(format!(
                "Point counts differ: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_dimensional_drops_z() {
        let set = PointSet::new(Dim::Two, vec![[1.0, 2.0, 3.0]]);
        assert_eq!(set.points()[0], [1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_reordered() {
        let set = PointSet::from_xy(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        let moved = set.reordered(&[2, 0, 1]).unwrap();
        assert_eq!(moved.points()[0], [2.0, 0.0, 0.0]);
        assert_eq!(moved.points()[1], [0.0, 0.0, 0.0]);
        assert!(set.reordered(&[0, 1]).is_err());
        assert!(set.reordered(&[0, 1, 7]).is_err());
    }

    #[test]
    fn test_ensure_comparable() {
        let a = PointSet::from_xy(&[[0.0, 0.0], [1.0, 0.0]]);
        let b = PointSet::from_xy(&[[0.0, 0.0]]);
        let c = PointSet::new(Dim::Three, vec![[0.0; 3], [1.0, 0.0, 0.0]]);

        assert!(a.ensure_comparable(&a).is_ok());
        assert!(matches!(
            a.ensure_comparable(&b),
            Err(WeaverError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            a.ensure_comparable(&c),
            Err(WeaverError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_dim_from_count() {
        assert_eq!(Dim::from_count(2).unwrap(), Dim::Two);
        assert_eq!(Dim::from_count(3).unwrap(), Dim::Three);
        assert!(Dim::from_count(4).is_err());
    }
}
