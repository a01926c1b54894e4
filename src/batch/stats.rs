//! # 按损坏程度统计
//!
//! 对距离数组的每一列（同一损坏程度、不同种子）求均值与标准差。
//! 缺失条目不参与统计，只计数。
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs`, `commands/summarize.rs`, `batch/export.rs` 使用
//! - 使用 `batch/aggregate.rs` 的 DistanceArray

use crate::batch::aggregate::DistanceArray;

use serde::{Deserialize, Serialize};

/// 单个损坏程度的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: u64,
    /// 均值（无有效条目时为空）
    pub mean: Option<f64>,
    /// 总体标准差
    pub std: Option<f64>,
    /// 有效条目数
    pub count: usize,
    /// 缺失条目数
    pub missing: usize,
}

/// 逐列统计
pub fn summarize(array: &DistanceArray) -> Vec<LevelSummary> {
    array
        .levels()
        .iter()
        .enumerate()
        .map(|(idx, &level)| {
            let mut values: Vec<f64> = Vec::new();
            let mut missing = 0;
            for entry in array.level_column(idx) {
                match entry.value() {
                    Some(v) => values.push(v),
                    None => missing += 1,
                }
            }
            // 固定求和顺序
            values.sort_by(|a, b| a.total_cmp(b));

            let (mean, std) = mean_std(&values);
            LevelSummary {
                level,
                mean,
                std,
                count: values.len(),
                missing,
            }
        })
        .collect()
}

fn mean_std(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (Some(mean), Some(var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::aggregate::{DistanceEntry, EntryKey, MissingReason};

    #[test]
    fn test_summary_excludes_missing() {
        let array = DistanceArray::from_entries(vec![
            (EntryKey::new(0, 1), DistanceEntry::Computed(1.0)),
            (EntryKey::new(1, 1), DistanceEntry::Computed(3.0)),
            (
                EntryKey::new(2, 1),
                DistanceEntry::Missing(MissingReason::ShapeMismatch),
            ),
            (EntryKey::new(0, 2), DistanceEntry::Computed(2.0)),
        ]);

        let summary = summarize(&array);
        assert_eq!(summary.len(), 2);

        assert_eq!(summary[0].level, 1);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].missing, 1);
        assert_eq!(summary[0].mean, Some(2.0));
        assert_eq!(summary[0].std, Some(1.0));

        // 种子 1、2 在 level 2 上没有文件
        assert_eq!(summary[1].count, 1);
        assert_eq!(summary[1].missing, 2);
        assert_eq!(summary[1].mean, Some(2.0));
        assert_eq!(summary[1].std, Some(0.0));
    }

    #[test]
    fn test_all_missing_level() {
        let array = DistanceArray::from_entries(vec![(
            EntryKey::new(0, 7),
            DistanceEntry::Missing(MissingReason::Cancelled),
        )]);
        let summary = summarize(&array);
        assert_eq!(summary[0].mean, None);
        assert_eq!(summary[0].std, None);
        assert_eq!(summary[0].missing, 1);
    }
}
