//! # masses 命令实现
//!
//! 计算参考结构子晶格的周期 Voronoi 质量，打印前若干个位点并可导出 CSV。
//!
//! ## 依赖关系
//! - 使用 `cli/masses.rs` 定义的参数
//! - 使用 `voronoi/`, `batch/export.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use super::load_reference;
use crate::batch::export::write_masses_csv;
use crate::cli::masses::MassesArgs;
use crate::error::Result;
use crate::utils::{output, progress};
use crate::voronoi;

use tabled::{Table, Tabled};
use tracing::warn;

/// 质量表格行
#[derive(Debug, Clone, Tabled)]
struct MassRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Position (Å)")]
    position: String,
    #[tabled(rename = "Mass")]
    mass: String,
}

/// 执行 masses 命令
pub fn execute(args: MassesArgs) -> Result<()> {
    let dim = args.sublattice.dim()?;
    let reference = load_reference(&args.reference, &args.sublattice.select, dim)?;

    let spinner = progress::create_spinner("Tessellating reference cell");
    let built = voronoi::build(&reference.points, &reference.lattice);
    spinner.finish_and_clear();
    let (mass, warning) = built?;

    output::print_header(&format!("Voronoi Masses of {}", reference.structure.name));
    if let Some(w) = &warning {
        warn!("{}", w);
        output::print_warning(&format!("Degenerate geometry, masses are uniform: {}", w));
    }

    let weights = mass.weights();
    let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    output::print_field("Sites", &weights.len().to_string());
    output::print_field("Cell measure", &format!("{:.6}", reference.lattice.measure()));
    output::print_field("Mass total", &format!("{:.12}", mass.total()));
    output::print_field("Mass range", &format!("{:.6} .. {:.6}", min, max));

    if args.top_n > 0 {
        let rows: Vec<MassRow> = reference
            .points
            .points()
            .iter()
            .zip(weights)
            .take(args.top_n)
            .enumerate()
            .map(|(index, (p, w))| MassRow {
                index,
                position: p[..dim.count()]
                    .iter()
                    .map(|x| format!("{:.4}", x))
                    .collect::<Vec<_>>()
                    .join(", "),
                mass: format!("{:.6}", w),
            })
            .collect();
        println!();
        println!("{}", Table::new(&rows));
    }

    if let Some(path) = &args.output {
        write_masses_csv(&reference.points, &mass, path)?;
        output::print_success(&format!("Masses saved to '{}'", path.display()));
    }

    Ok(())
}
