//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `voronoi/`, `transport/`, `batch/`, `utils/`
//! - 子模块: distance, masses, batch, summarize

pub mod batch;
pub mod distance;
pub mod masses;
pub mod summarize;

use crate::cli::Commands;
use crate::error::{Result, WeaverError};
use crate::geometry::LatticeVectors;
use crate::models::{Dim, PointSet, Selection, Structure};
use crate::parsers;

use std::path::Path;
use tracing::debug;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Distance(args) => distance::execute(args),
        Commands::Masses(args) => masses::execute(args),
        Commands::Batch(args) => batch::execute(args),
        Commands::Summarize(args) => summarize::execute(args),
    }
}

/// 读取的参考结构及其子晶格
pub(crate) struct LoadedReference {
    pub structure: Structure,
    pub lattice: LatticeVectors,
    pub points: PointSet,
}

/// 读取结构文件，校验晶格并提取子晶格；空子晶格视为形状错误
pub(crate) fn load_reference(path: &Path, selection: &Selection, dim: Dim) -> Result<LoadedReference> {
    let structure = parsers::parse_structure_file(path)?;
    let lattice = structure.lattice_vectors(dim)?;
    let points = structure.select(selection, dim);
    if points.is_empty() {
        return Err(WeaverError::shape(format!(
            "'{}' has no atoms matching '{}'",
            path.display(),
            selection
        )));
    }
    debug!(
        "{} ({}): {} of {} atoms selected by '{}', energy {:?}",
        structure.name,
        structure.source_format.as_deref().unwrap_or("unknown"),
        points.len(),
        structure.atoms.len(),
        selection,
        structure.energy
    );
    Ok(LoadedReference {
        structure,
        lattice,
        points,
    })
}
