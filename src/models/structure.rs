//! # 原子结构数据模型
//!
//! 定义从结构文件解析得到的统一结构表示，并从中提取子晶格点集。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `commands/` 使用
//! - 使用 `geometry/lattice.rs` 校验晶格

use crate::error::{Result, WeaverError};
use crate::geometry::LatticeVectors;
use crate::models::{Dim, PointSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 晶格参数表示（未经校验的原始矩阵）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }
}

/// 原子信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 笛卡尔坐标 [x, y, z] (Å)
    pub position: [f64; 3],

    /// 可选：整数原子类型（extxyz 的 atom_types / tags 列）
    pub atom_type: Option<i64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            atom_type: None,
        }
    }

    pub fn with_type(mut self, atom_type: i64) -> Self {
        self.atom_type = Some(atom_type);
        self
    }
}

/// 原子结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 能量 (eV)，弛豫器输出附带，距离计算不使用
    pub energy: Option<f64>,

    /// 来源文件格式
    pub source_format: Option<String>,
}

impl Structure {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Structure {
            name: name.into(),
            lattice,
            atoms,
            energy: None,
            source_format: None,
        }
    }

    /// 校验并返回指定维度的晶格向量
    pub fn lattice_vectors(&self, dim: Dim) -> Result<LatticeVectors> {
        LatticeVectors::from_matrix(dim, self.lattice.matrix)
    }

    /// 提取子晶格点集（保持文件中的原子顺序）
    pub fn select(&self, selection: &Selection, dim: Dim) -> PointSet {
        let points = self
            .atoms
            .iter()
            .filter(|atom| selection.matches(atom))
            .map(|atom| atom.position)
            .collect();
        PointSet::new(dim, points)
    }
}

/// 子晶格选择器（分析类型）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// 全部原子
    #[default]
    All,
    /// 按元素符号
    Species(String),
    /// 按整数原子类型
    AtomType(i64),
}

impl Selection {
    pub fn matches(&self, atom: &Atom) -> bool {
        match self {
            Selection::All => true,
            Selection::Species(el) => atom.element.eq_ignore_ascii_case(el),
            Selection::AtomType(t) => atom.atom_type == Some(*t),
        }
    }
}

impl FromStr for Selection {
    type Err = String;

    /// 解析 `all`、`species:Mo`、`type:0`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        match s.split_once(':') {
            Some(("species", el)) if !el.trim().is_empty() => {
                Ok(Selection::Species(el.trim().to_string()))
            }
            Some(("type", t)) => t
                .trim()
                .parse::<i64>()
                .map(Selection::AtomType)
                .map_err(|_| format!("Invalid atom type '{}'", t)),
            _ => Err(format!(
                "Invalid selection '{}'. Use 'all', 'species:<symbol>' or 'type:<int>'",
                s
            )),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "all"),
            Selection::Species(el) => write!(f, "species:{}", el),
            Selection::AtomType(t) => write!(f, "type:{}", t),
        }
    }
}

/// 确保弛豫结构的晶胞与参考晶胞兼容
pub fn ensure_compatible_cells(
    reference: &LatticeVectors,
    other: &LatticeVectors,
    tolerance: f64,
) -> Result<()> {
    if reference.is_compatible(other, tolerance) {
        Ok(())
    } else {
        Err(WeaverError::LatticeMismatch {
            reason: format!(
                "cell differs from reference by more than {:.1e} Å",
                tolerance
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Structure {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 20.0]]);
        let atoms = vec![
            Atom::new("Mo", [0.0, 0.0, 10.0]).with_type(0),
            Atom::new("S", [1.0, 1.0, 11.5]).with_type(1),
            Atom::new("Mo", [2.0, 2.0, 10.0]).with_type(0),
            Atom::new("W", [0.5, 0.5, 16.0]).with_type(3),
        ];
        Structure::new("hetero", lattice, atoms)
    }

    #[test]
    fn test_select_by_type_keeps_order() {
        let s = sample();
        let set = s.select(&Selection::AtomType(0), Dim::Two);
        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0], [0.0, 0.0, 0.0]);
        assert_eq!(set.points()[1], [2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_select_by_species_three_dimensional() {
        let s = sample();
        let set = s.select(&Selection::Species("w".to_string()), Dim::Three);
        assert_eq!(set.len(), 1);
        assert_eq!(set.points()[0], [0.5, 0.5, 16.0]);
        assert_eq!(s.select(&Selection::All, Dim::Three).len(), 4);
    }

    #[test]
    fn test_selection_from_str() {
        assert_eq!("all".parse::<Selection>().unwrap(), Selection::All);
        assert_eq!(
            "species:Mo".parse::<Selection>().unwrap(),
            Selection::Species("Mo".to_string())
        );
        assert_eq!(
            "type:3".parse::<Selection>().unwrap(),
            Selection::AtomType(3)
        );
        assert!("type:x".parse::<Selection>().is_err());
        assert!("mo".parse::<Selection>().is_err());
        assert_eq!(Selection::AtomType(3).to_string(), "type:3");
    }

    #[test]
    fn test_lattice_vectors_two_dimensional() {
        let s = sample();
        let lv = s.lattice_vectors(Dim::Two).unwrap();
        assert!((lv.measure() - 16.0).abs() < 1e-12);
    }
}
