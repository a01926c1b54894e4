//! # summarize 命令实现
//!
//! 读取已有的 distances.csv，按损坏程度重新统计。
//!
//! ## 依赖关系
//! - 使用 `cli/summarize.rs` 定义的参数
//! - 使用 `batch/export.rs`, `batch/stats.rs`
//! - 被 `commands/batch.rs` 复用表格输出

use crate::batch::export::{read_distances_csv, write_summary_csv};
use crate::batch::{summarize, LevelSummary};
use crate::cli::summarize::SummarizeArgs;
use crate::error::Result;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 统计表格行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Level")]
    level: u64,
    #[tabled(rename = "Mean (Å)")]
    mean: String,
    #[tabled(rename = "Std (Å)")]
    std: String,
    #[tabled(rename = "Seeds")]
    count: usize,
    #[tabled(rename = "Missing")]
    missing: usize,
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_else(|| "-".to_string())
}

/// 打印按损坏程度的统计表
pub(crate) fn print_summary_table(summary: &[LevelSummary]) {
    let rows: Vec<SummaryRow> = summary
        .iter()
        .map(|s| SummaryRow {
            level: s.level,
            mean: format_optional(s.mean),
            std: format_optional(s.std),
            count: s.count,
            missing: s.missing,
        })
        .collect();
    println!("{}", Table::new(&rows));
}

/// 执行 summarize 命令
pub fn execute(args: SummarizeArgs) -> Result<()> {
    let array = read_distances_csv(&args.distances)?;
    let summary = summarize(&array);

    output::print_header("Distance Summary by Level");
    output::print_field("Seeds", &array.seeds().len().to_string());
    output::print_field("Levels", &array.levels().len().to_string());
    output::print_field(
        "Entries",
        &format!("{} computed, {} missing", array.computed_count(), array.missing_count()),
    );
    println!();
    print_summary_table(&summary);

    if let Some(path) = &args.output {
        write_summary_csv(&summary, path)?;
        output::print_success(&format!("Summary saved to '{}'", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(0.125)), "0.125000");
        assert_eq!(format_optional(None), "-");
    }
}
