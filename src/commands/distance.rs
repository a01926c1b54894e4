//! # distance 命令实现
//!
//! 计算参考结构与一个比较结构之间的周期 Wasserstein 距离。
//!
//! ## 依赖关系
//! - 使用 `cli/distance.rs` 定义的参数
//! - 使用 `voronoi/`, `transport/`
//! - 使用 `utils/output.rs`

use super::load_reference;
use crate::cli::distance::DistanceArgs;
use crate::error::Result;
use crate::models::ensure_compatible_cells;
use crate::transport::calculate_distance;
use crate::utils::output;
use crate::voronoi;

use tracing::warn;

/// 执行 distance 命令
pub fn execute(args: DistanceArgs) -> Result<()> {
    let dim = args.sublattice.dim()?;
    let selection = &args.sublattice.select;
    let options = args.metric.distance_options();
    options.validate()?;

    let reference = load_reference(&args.reference, selection, dim)?;
    let comparison = load_reference(&args.comparison, selection, dim)?;
    ensure_compatible_cells(&reference.lattice, &comparison.lattice, args.cell_tolerance)?;

    let (mass, warning) =
        voronoi::build_weighted(&reference.points, &reference.lattice, args.metric.weights.into())?;
    if let Some(w) = warning {
        warn!("{}", w);
        output::print_warning(&format!("Degenerate reference geometry, using uniform masses: {}", w));
    }

    let distance = calculate_distance(
        &reference.points,
        &mass,
        &comparison.points,
        &reference.lattice,
        &options,
    )?;

    output::print_header("Periodic Wasserstein Distance");
    output::print_field("Reference", &args.reference.display().to_string());
    output::print_field("Comparison", &args.comparison.display().to_string());
    output::print_field("Selection", &selection.to_string());
    output::print_field("Sites", &reference.points.len().to_string());
    output::print_field("Dimension", &dim.to_string());
    output::print_field("Order p", &options.p.to_string());
    output::print_field("Correspondence", &options.correspondence.to_string());
    output::print_field("Weights", &args.metric.weights_label());
    output::print_separator();
    output::print_field("Distance (Å)", &format!("{:.10}", distance));

    Ok(())
}
