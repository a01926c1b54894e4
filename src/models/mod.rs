//! # 数据模型模块
//!
//! 定义统一的原子结构和子晶格点集数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `commands/` 使用
//! - 子模块: structure, point_set

pub mod point_set;
pub mod structure;

pub use point_set::{Dim, PointSet};
pub use structure::{ensure_compatible_cells, Atom, Lattice, Selection, Structure};
