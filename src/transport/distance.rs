//! # 周期 Wasserstein 距离
//!
//! 以 Voronoi 质量为权重，在最小镜像约定下计算参考点集与比较点集之间的
//! p-Wasserstein 距离。
//!
//! ## 功能
//! - `Tracked`: 原子标签在弛豫前后保持一致，逐点对应
//! - `Unmatched`: 不假设对应关系，求解完整的离散最优输运
//!
//! ## 依赖关系
//! - 被 `batch/aggregate.rs`, `commands/distance.rs` 调用
//! - 使用 `geometry/`, `voronoi/`, `transport/plan.rs`

use crate::error::{Result, WeaverError};
use crate::geometry::{dot, minimum_image_displacement, LatticeVectors};
use crate::models::PointSet;
use crate::transport::plan::{self, CostMatrix, TransportPlan};
use crate::voronoi::VoronoiMass;

use serde::{Deserialize, Serialize};
use std::fmt;

/// 参考点与比较点之间的对应方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Correspondence {
    /// 按索引逐点对应
    #[default]
    Tracked,
    /// 由最优输运决定对应
    Unmatched,
}

impl fmt::Display for Correspondence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correspondence::Tracked => write!(f, "tracked"),
            Correspondence::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// 距离计算选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOptions {
    /// Wasserstein 阶数
    pub p: f64,
    pub correspondence: Correspondence,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        DistanceOptions {
            p: 2.0,
            correspondence: Correspondence::Tracked,
        }
    }
}

impl DistanceOptions {
    /// 检查阶数 p
    pub fn validate(&self) -> Result<()> {
        if !self.p.is_finite() || self.p <= 0.0 {
            return Err(WeaverError::InvalidArgument(format!(
                "Wasserstein order p must be finite and positive, got {}",
                self.p
            )));
        }
        Ok(())
    }
}

/// 计算周期 p-Wasserstein 距离
pub fn calculate_distance(
    reference: &PointSet,
    mass: &VoronoiMass,
    comparison: &PointSet,
    lattice: &LatticeVectors,
    options: &DistanceOptions,
) -> Result<f64> {
    options.validate()?;
    reference.ensure_comparable(comparison)?;

    if mass.len() != reference.len() {
        return Err(WeaverError::shape(format!(
            "Mass has {} entries for {} reference points",
            mass.len(),
            reference.len()
        )));
    }
    if lattice.dim() != reference.dim() {
        return Err(WeaverError::shape(format!(
            "Points are {} but lattice is {}",
            reference.dim(),
            lattice.dim()
        )));
    }
    if reference.is_empty() {
        return Ok(0.0);
    }

    let cost = match options.correspondence {
        Correspondence::Tracked => tracked_cost(reference, mass, comparison, lattice, options.p),
        Correspondence::Unmatched => {
            transport_plan(reference, mass, comparison, lattice, options.p)?.cost
        }
    };

    Ok(cost.max(0.0).powf(1.0 / options.p))
}

/// 逐点对应的输运代价 Σ m_i |d_i|^p
fn tracked_cost(
    reference: &PointSet,
    mass: &VoronoiMass,
    comparison: &PointSet,
    lattice: &LatticeVectors,
    p: f64,
) -> f64 {
    let mut terms: Vec<f64> = reference
        .points()
        .iter()
        .zip(comparison.points())
        .zip(mass.weights())
        .map(|((r, c), w)| w * displacement_cost(r, c, lattice, p))
        .collect();

    // 排序后求和，使结果与标签顺序无关
    terms.sort_by(|a, b| a.total_cmp(b));
    terms.iter().sum()
}

/// 无对应关系时的最优输运方案
fn transport_plan(
    reference: &PointSet,
    mass: &VoronoiMass,
    comparison: &PointSet,
    lattice: &LatticeVectors,
    p: f64,
) -> Result<TransportPlan> {
    let refs = reference.points();
    let cmps = comparison.points();
    let cost = CostMatrix::from_fn(refs.len(), cmps.len(), |i, j| {
        displacement_cost(&refs[i], &cmps[j], lattice, p)
    });

    // 比较点沿用同索引参考点的质量
    plan::solve(mass.weights(), mass.weights(), &cost)
}

fn displacement_cost(a: &[f64; 3], b: &[f64; 3], lattice: &LatticeVectors, p: f64) -> f64 {
    let d = minimum_image_displacement(a, b, lattice);
    let sq = dot(&d, &d);
    if sq == 0.0 {
        0.0
    } else if p == 2.0 {
        sq
    } else {
        sq.sqrt().powf(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dim;
    use crate::voronoi;

    fn unit_square() -> LatticeVectors {
        LatticeVectors::new_2d([[1.0, 0.0], [0.0, 1.0]]).unwrap()
    }

    fn shifted(points: &PointSet, by: [f64; 3]) -> PointSet {
        PointSet::new(
            points.dim(),
            points
                .points()
                .iter()
                .map(|p| [p[0] + by[0], p[1] + by[1], p[2] + by[2]])
                .collect(),
        )
    }

    fn irregular() -> PointSet {
        PointSet::from_xy(&[
            [0.11, 0.07],
            [0.62, 0.18],
            [0.35, 0.55],
            [0.83, 0.71],
            [0.21, 0.88],
        ])
    }

    #[test]
    fn test_identical_sets_have_zero_distance() {
        let lattice = unit_square();
        let reference = irregular();
        let (mass, _) = voronoi::build(&reference, &lattice).unwrap();

        for correspondence in [Correspondence::Tracked, Correspondence::Unmatched] {
            let options = DistanceOptions {
                p: 2.0,
                correspondence,
            };
            let d = calculate_distance(&reference, &mass, &reference, &lattice, &options).unwrap();
            assert_eq!(d, 0.0);
        }
    }

    #[test]
    fn test_unit_square_shift() {
        // 四个角点在周期边界下为同一位置，质量退化为均匀
        let lattice = unit_square();
        let reference = PointSet::from_xy(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let (mass, warning) = voronoi::build(&reference, &lattice).unwrap();
        assert!(warning.is_some());

        let comparison = shifted(&reference, [0.01, 0.0, 0.0]);
        let d = calculate_distance(
            &reference,
            &mass,
            &comparison,
            &lattice,
            &DistanceOptions::default(),
        )
        .unwrap();
        assert!((d - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_shift_across_wrap_boundary() {
        let lattice = unit_square();
        let reference = PointSet::from_xy(&[[0.995, 0.2], [0.3, 0.999], [0.5, 0.5], [0.1, 0.6]]);
        let (mass, _) = voronoi::build(&reference, &lattice).unwrap();

        // 比较点越过边界后已被折回晶胞内
        let comparison = PointSet::from_xy(&[[0.005, 0.2], [0.31, 0.999], [0.51, 0.5], [0.11, 0.6]]);
        let d = calculate_distance(
            &reference,
            &mass,
            &comparison,
            &lattice,
            &DistanceOptions::default(),
        )
        .unwrap();
        assert!((d - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_relabeling_symmetry() {
        let lattice = unit_square();
        let reference = irregular();
        let comparison = shifted(&reference, [0.013, -0.021, 0.0]);
        let (mass, _) = voronoi::build(&reference, &lattice).unwrap();
        let options = DistanceOptions::default();
        let d = calculate_distance(&reference, &mass, &comparison, &lattice, &options).unwrap();

        let order = [3, 0, 4, 2, 1];
        let reference2 = reference.reordered(&order).unwrap();
        let comparison2 = comparison.reordered(&order).unwrap();
        let (mass2, _) = voronoi::build(&reference2, &lattice).unwrap();
        let d2 = calculate_distance(&reference2, &mass2, &comparison2, &lattice, &options).unwrap();

        assert_eq!(d, d2);
    }

    #[test]
    fn test_unmatched_recovers_relabeled_comparison() {
        let lattice = unit_square();
        let reference = irregular();
        let mass = VoronoiMass::uniform(reference.len());

        // 比较点集仅为参考点集的重排
        let comparison = reference.reordered(&[1, 2, 3, 4, 0]).unwrap();
        let unmatched = DistanceOptions {
            p: 2.0,
            correspondence: Correspondence::Unmatched,
        };
        let tracked = DistanceOptions::default();

        let du = calculate_distance(&reference, &mass, &comparison, &lattice, &unmatched).unwrap();
        let dt = calculate_distance(&reference, &mass, &comparison, &lattice, &tracked).unwrap();
        assert!(du < 1e-6);
        assert!(dt > 0.1);
    }

    #[test]
    fn test_unmatched_never_exceeds_tracked() {
        let lattice = unit_square();
        let reference = irregular();
        let comparison = shifted(&reference, [0.04, 0.03, 0.0]);
        let (mass, _) = voronoi::build(&reference, &lattice).unwrap();

        for p in [1.0, 2.0, 3.0] {
            let tracked = DistanceOptions {
                p,
                correspondence: Correspondence::Tracked,
            };
            let unmatched = DistanceOptions {
                p,
                correspondence: Correspondence::Unmatched,
            };
            let dt = calculate_distance(&reference, &mass, &comparison, &lattice, &tracked).unwrap();
            let du =
                calculate_distance(&reference, &mass, &comparison, &lattice, &unmatched).unwrap();
            assert!(du <= dt + 1e-12);
            // 小幅整体平移时恒等对应即最优
            assert!((du - dt).abs() < 1e-9);
        }
    }

    #[test]
    fn test_collinear_reference_still_computes() {
        let lattice = unit_square();
        let reference = PointSet::from_xy(&[[0.1, 0.5], [0.4, 0.5], [0.7, 0.5], [0.9, 0.5]]);
        let (mass, warning) = voronoi::build(&reference, &lattice).unwrap();
        assert!(warning.is_some());
        assert_eq!(mass.weights(), &[0.25; 4]);

        let comparison = shifted(&reference, [0.0, 0.02, 0.0]);
        let d = calculate_distance(
            &reference,
            &mass,
            &comparison,
            &lattice,
            &DistanceOptions::default(),
        )
        .unwrap();
        assert!((d - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_invalid_order() {
        let lattice = unit_square();
        let reference = irregular();
        let mass = VoronoiMass::uniform(reference.len());

        for p in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let options = DistanceOptions {
                p,
                correspondence: Correspondence::Tracked,
            };
            let err = calculate_distance(&reference, &mass, &reference, &lattice, &options)
                .unwrap_err();
            assert!(matches!(err, WeaverError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_shape_errors() {
        let lattice = unit_square();
        let reference = irregular();
        let mass = VoronoiMass::uniform(reference.len());
        let options = DistanceOptions::default();

        let short = PointSet::from_xy(&[[0.1, 0.1], [0.2, 0.2]]);
        assert!(matches!(
            calculate_distance(&reference, &mass, &short, &lattice, &options),
            Err(WeaverError::ShapeMismatch { .. })
        ));

        let solid = PointSet::new(Dim::Three, vec![[0.1, 0.1, 0.1]; 5]);
        assert!(matches!(
            calculate_distance(&reference, &mass, &solid, &lattice, &options),
            Err(WeaverError::ShapeMismatch { .. })
        ));

        let wrong_mass = VoronoiMass::uniform(4);
        assert!(matches!(
            calculate_distance(&reference, &wrong_mass, &reference, &lattice, &options),
            Err(WeaverError::ShapeMismatch { .. })
        ));

        let cubic =
            LatticeVectors::new_3d([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        assert!(matches!(
            calculate_distance(&reference, &mass, &reference, &cubic, &options),
            Err(WeaverError::ShapeMismatch { .. })
        ));
    }
}
