//! # 批量距离聚合
//!
//! 对一个参考结构和它的全部弛豫结构（种子 × 损坏程度）计算距离，
//! 结果整理为稠密的 [seed][level] 数组。
//!
//! ## 功能
//! - Voronoi 质量只构建一次，被所有任务只读共享
//! - 单个条目失败记为缺失并附原因，批处理继续
//! - 网格中没有对应文件的位置记为 `not-found`
//! - 取消后未执行的条目记为 `cancelled`，已完成的结果保留
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `transport/`, `voronoi/`, `batch/runner.rs`

use crate::batch::runner::{BatchRunner, ProcessResult};
use crate::error::{Result, WeaverError};
use crate::geometry::LatticeVectors;
use crate::models::PointSet;
use crate::transport::{calculate_distance, DistanceOptions};
use crate::voronoi::{self, DegenerateGeometryWarning, VoronoiMass, Weighting};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// (种子, 损坏程度) 键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub seed: u64,
    pub level: u64,
}

impl EntryKey {
    pub fn new(seed: u64, level: u64) -> Self {
        EntryKey { seed, level }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seed {} / level {}", self.seed, self.level)
    }
}

/// 条目缺失原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingReason {
    ShapeMismatch,
    InvalidLattice,
    LatticeMismatch,
    Unreadable,
    NotFound,
    Cancelled,
}

impl MissingReason {
    /// 写入 CSV 的状态码
    pub fn code(self) -> &'static str {
        match self {
            MissingReason::ShapeMismatch => "shape-mismatch",
            MissingReason::InvalidLattice => "invalid-lattice",
            MissingReason::LatticeMismatch => "lattice-mismatch",
            MissingReason::Unreadable => "unreadable",
            MissingReason::NotFound => "not-found",
            MissingReason::Cancelled => "cancelled",
        }
    }

    /// 由错误类型归类
    pub fn from_error(err: &WeaverError) -> Self {
        match err {
            WeaverError::ShapeMismatch { .. } => MissingReason::ShapeMismatch,
            WeaverError::InvalidLattice { .. } => MissingReason::InvalidLattice,
            WeaverError::LatticeMismatch { .. } => MissingReason::LatticeMismatch,
            WeaverError::FileNotFound { .. } => MissingReason::NotFound,
            _ => MissingReason::Unreadable,
        }
    }
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MissingReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "shape-mismatch" => Ok(MissingReason::ShapeMismatch),
            "invalid-lattice" => Ok(MissingReason::InvalidLattice),
            "lattice-mismatch" => Ok(MissingReason::LatticeMismatch),
            "unreadable" => Ok(MissingReason::Unreadable),
            "not-found" => Ok(MissingReason::NotFound),
            "cancelled" => Ok(MissingReason::Cancelled),
            other => Err(format!("Unknown status '{}'", other)),
        }
    }
}

/// 数组中的单个条目
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceEntry {
    Computed(f64),
    Missing(MissingReason),
}

impl DistanceEntry {
    pub fn value(&self) -> Option<f64> {
        match self {
            DistanceEntry::Computed(d) => Some(*d),
            DistanceEntry::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DistanceEntry::Missing(_))
    }

    /// CSV 状态列
    pub fn status(&self) -> &'static str {
        match self {
            DistanceEntry::Computed(_) => "ok",
            DistanceEntry::Missing(reason) => reason.code(),
        }
    }
}

/// 稠密距离数组 [seed][level]，两个轴均升序
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceArray {
    seeds: Vec<u64>,
    levels: Vec<u64>,
    entries: Vec<DistanceEntry>,
}

impl DistanceArray {
    /// 以 `not-found` 填充的空数组（轴会排序去重）
    pub fn new(mut seeds: Vec<u64>, mut levels: Vec<u64>) -> Self {
        seeds.sort_unstable();
        seeds.dedup();
        levels.sort_unstable();
        levels.dedup();
        let entries =
            vec![DistanceEntry::Missing(MissingReason::NotFound); seeds.len() * levels.len()];
        DistanceArray {
            seeds,
            levels,
            entries,
        }
    }

    /// 由 (键, 条目) 列表构建，轴取所有出现过的种子与程度
    pub fn from_entries(entries: impl IntoIterator<Item = (EntryKey, DistanceEntry)>) -> Self {
        let entries: Vec<(EntryKey, DistanceEntry)> = entries.into_iter().collect();
        let mut array = DistanceArray::new(
            entries.iter().map(|(k, _)| k.seed).collect(),
            entries.iter().map(|(k, _)| k.level).collect(),
        );
        for (key, entry) in entries {
            array.set(key, entry);
        }
        array
    }

    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    pub fn levels(&self) -> &[u64] {
        &self.levels
    }

    fn index(&self, key: EntryKey) -> Option<usize> {
        let s = self.seeds.binary_search(&key.seed).ok()?;
        let l = self.levels.binary_search(&key.level).ok()?;
        Some(s * self.levels.len() + l)
    }

    pub fn get(&self, key: EntryKey) -> Option<&DistanceEntry> {
        self.index(key).map(|i| &self.entries[i])
    }

    /// 设置条目；键不在轴上时返回 false
    pub fn set(&mut self, key: EntryKey, entry: DistanceEntry) -> bool {
        match self.index(key) {
            Some(i) => {
                self.entries[i] = entry;
                true
            }
            None => false,
        }
    }

    /// 按 (seed, level) 字典序遍历
    pub fn iter(&self) -> impl Iterator<Item = (EntryKey, &DistanceEntry)> + '_ {
        let width = self.levels.len();
        self.entries.iter().enumerate().map(move |(i, e)| {
            (
                EntryKey::new(self.seeds[i / width], self.levels[i % width]),
                e,
            )
        })
    }

    /// 某一损坏程度在所有种子上的条目
    pub fn level_column(&self, level_index: usize) -> impl Iterator<Item = &DistanceEntry> + '_ {
        let width = self.levels.len();
        (0..self.seeds.len()).map(move |s| &self.entries[s * width + level_index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_missing()).count()
    }

    pub fn computed_count(&self) -> usize {
        self.len() - self.missing_count()
    }
}

/// 弛豫结构集合：每个键对应读取成功的点集或缺失原因
pub type RelaxedSet = BTreeMap<EntryKey, std::result::Result<PointSet, MissingReason>>;

/// 批处理选项
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchOptions {
    pub distance: DistanceOptions,
    pub weighting: Weighting,
}

/// 批处理结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub array: DistanceArray,
    pub missing: usize,
    pub mass: VoronoiMass,
    pub warning: Option<DegenerateGeometryWarning>,
}

/// 计算整批距离
///
/// 参考结构本身的问题（晶格奇异、维度不符、p 非法）直接报错终止；
/// 单个弛豫结构的问题只记为该条目缺失。
pub fn run_batch(
    reference: &PointSet,
    lattice: &LatticeVectors,
    relaxed: &RelaxedSet,
    options: &BatchOptions,
    runner: &BatchRunner,
) -> Result<BatchOutcome> {
    options.distance.validate()?;

    let (mass, warning) = voronoi::build_weighted(reference, lattice, options.weighting)?;

    let mut array = DistanceArray::new(
        relaxed.keys().map(|k| k.seed).collect(),
        relaxed.keys().map(|k| k.level).collect(),
    );

    // 读取失败的条目直接记录原因，只有成功读取的条目进入执行器
    let mut items: Vec<(EntryKey, &PointSet)> = Vec::with_capacity(relaxed.len());
    for (key, input) in relaxed {
        match input {
            Ok(points) => items.push((*key, points)),
            Err(reason) => {
                array.set(*key, DistanceEntry::Missing(*reason));
            }
        }
    }

    info!(
        "Computing {} distances over {} seeds x {} levels",
        items.len(),
        array.seeds().len(),
        array.levels().len()
    );

    let report = runner.run(&items, "Computing distances", |(key, points)| {
        match calculate_distance(reference, &mass, points, lattice, &options.distance) {
            Ok(d) => ProcessResult::Success(DistanceEntry::Computed(d)),
            Err(e) => {
                debug!("{}: {}", key, e);
                ProcessResult::Failed(DistanceEntry::Missing(MissingReason::from_error(&e)))
            }
        }
    })?;

    for ((key, _), result) in items.iter().zip(report.results) {
        let entry = result
            .map(ProcessResult::into_inner)
            .unwrap_or(DistanceEntry::Missing(MissingReason::Cancelled));
        array.set(*key, entry);
    }

    let missing = array.missing_count();
    info!(
        "Batch finished: {} computed, {} missing",
        array.computed_count(),
        missing
    );

    Ok(BatchOutcome {
        array,
        missing,
        mass,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dim;

    fn lattice() -> LatticeVectors {
        LatticeVectors::new_2d([[1.0, 0.0], [0.0, 1.0]]).unwrap()
    }

    fn reference() -> PointSet {
        PointSet::from_xy(&[[0.1, 0.1], [0.6, 0.2], [0.3, 0.7], [0.8, 0.8]])
    }

    fn shifted(by: f64) -> PointSet {
        PointSet::from_xy(
            &reference()
                .points()
                .iter()
                .map(|p| [p[0] + by, p[1]])
                .collect::<Vec<_>>(),
        )
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(2).with_progress(false)
    }

    fn sample_set() -> RelaxedSet {
        let mut set = RelaxedSet::new();
        for seed in 0..3u64 {
            for level in [5u64, 10, 20] {
                let by = 0.001 * level as f64;
                set.insert(EntryKey::new(seed, level), Ok(shifted(by)));
            }
        }
        set
    }

    #[test]
    fn test_batch_fills_dense_array() {
        let outcome = run_batch(
            &reference(),
            &lattice(),
            &sample_set(),
            &BatchOptions::default(),
            &runner(),
        )
        .unwrap();

        assert_eq!(outcome.array.seeds(), &[0, 1, 2]);
        assert_eq!(outcome.array.levels(), &[5, 10, 20]);
        assert_eq!(outcome.missing, 0);
        assert!(outcome.warning.is_none());

        let d = outcome.array.get(EntryKey::new(1, 10)).unwrap().value().unwrap();
        assert!((d - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_entry_is_recorded_missing() {
        let mut set = sample_set();
        set.insert(
            EntryKey::new(2, 20),
            Ok(PointSet::from_xy(&[[0.1, 0.1], [0.5, 0.5]])),
        );
        set.insert(
            EntryKey::new(0, 5),
            Ok(PointSet::new(Dim::Three, vec![[0.1, 0.1, 0.1]; 4])),
        );
        set.insert(EntryKey::new(1, 5), Err(MissingReason::Unreadable));

        let outcome = run_batch(
            &reference(),
            &lattice(),
            &set,
            &BatchOptions::default(),
            &runner(),
        )
        .unwrap();

        assert_eq!(outcome.missing, 3);
        assert_eq!(
            outcome.array.get(EntryKey::new(2, 20)),
            Some(&DistanceEntry::Missing(MissingReason::ShapeMismatch))
        );
        assert_eq!(
            outcome.array.get(EntryKey::new(0, 5)),
            Some(&DistanceEntry::Missing(MissingReason::ShapeMismatch))
        );
        assert_eq!(
            outcome.array.get(EntryKey::new(1, 5)),
            Some(&DistanceEntry::Missing(MissingReason::Unreadable))
        );
        assert!(outcome.array.get(EntryKey::new(2, 10)).unwrap().value().is_some());
    }

    #[test]
    fn test_grid_holes_are_not_found() {
        let mut set = sample_set();
        set.remove(&EntryKey::new(1, 20));

        let outcome = run_batch(
            &reference(),
            &lattice(),
            &set,
            &BatchOptions::default(),
            &runner(),
        )
        .unwrap();

        assert_eq!(outcome.array.len(), 9);
        assert_eq!(
            outcome.array.get(EntryKey::new(1, 20)),
            Some(&DistanceEntry::Missing(MissingReason::NotFound))
        );
        assert_eq!(outcome.missing, 1);
    }

    #[test]
    fn test_cancelled_batch_keeps_axes() {
        let runner = runner();
        runner.cancel();

        let outcome = run_batch(
            &reference(),
            &lattice(),
            &sample_set(),
            &BatchOptions::default(),
            &runner,
        )
        .unwrap();

        assert_eq!(outcome.missing, 9);
        assert!(outcome
            .array
            .iter()
            .all(|(_, e)| *e == DistanceEntry::Missing(MissingReason::Cancelled)));
    }

    #[test]
    fn test_load_failures_keep_reason_after_cancel() {
        let mut set = sample_set();
        set.insert(EntryKey::new(0, 5), Err(MissingReason::LatticeMismatch));
        set.insert(EntryKey::new(2, 20), Err(MissingReason::Unreadable));
        let runner = runner();
        runner.cancel();

        let outcome = run_batch(
            &reference(),
            &lattice(),
            &set,
            &BatchOptions::default(),
            &runner,
        )
        .unwrap();

        assert_eq!(
            outcome.array.get(EntryKey::new(0, 5)),
            Some(&DistanceEntry::Missing(MissingReason::LatticeMismatch))
        );
        assert_eq!(
            outcome.array.get(EntryKey::new(2, 20)),
            Some(&DistanceEntry::Missing(MissingReason::Unreadable))
        );
        assert_eq!(
            outcome.array.get(EntryKey::new(1, 10)),
            Some(&DistanceEntry::Missing(MissingReason::Cancelled))
        );
        assert_eq!(outcome.missing, 9);
    }

    #[test]
    fn test_load_failures_do_not_count_against_limit() {
        // 两个读取失败，上限 1：只统计计算阶段的失败，不应触发取消
        let mut set = sample_set();
        set.insert(EntryKey::new(0, 5), Err(MissingReason::Unreadable));
        set.insert(EntryKey::new(1, 5), Err(MissingReason::Unreadable));
        let runner = BatchRunner::new(1)
            .with_progress(false)
            .with_max_failures(Some(1));

        let outcome = run_batch(
            &reference(),
            &lattice(),
            &set,
            &BatchOptions::default(),
            &runner,
        )
        .unwrap();

        assert!(!runner.is_cancelled());
        assert_eq!(outcome.missing, 2);
        assert_eq!(outcome.array.computed_count(), 7);
    }

    #[test]
    fn test_batch_is_idempotent() {
        let set = sample_set();
        let options = BatchOptions::default();
        let a = run_batch(&reference(), &lattice(), &set, &options, &runner()).unwrap();
        let b = run_batch(&reference(), &lattice(), &set, &options, &runner()).unwrap();
        assert_eq!(a.array, b.array);
        assert_eq!(a.mass, b.mass);
    }

    #[test]
    fn test_invalid_order_aborts_batch() {
        let options = BatchOptions {
            distance: DistanceOptions {
                p: -2.0,
                ..DistanceOptions::default()
            },
            ..BatchOptions::default()
        };
        let err = run_batch(&reference(), &lattice(), &sample_set(), &options, &runner())
            .unwrap_err();
        assert!(matches!(err, WeaverError::InvalidArgument(_)));
    }

    #[test]
    fn test_array_from_entries() {
        let array = DistanceArray::from_entries(vec![
            (EntryKey::new(3, 1), DistanceEntry::Computed(0.5)),
            (EntryKey::new(1, 2), DistanceEntry::Computed(0.25)),
        ]);
        assert_eq!(array.seeds(), &[1, 3]);
        assert_eq!(array.levels(), &[1, 2]);
        assert_eq!(array.missing_count(), 2);

        let keys: Vec<EntryKey> = array.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                EntryKey::new(1, 1),
                EntryKey::new(1, 2),
                EntryKey::new(3, 1),
                EntryKey::new(3, 2)
            ]
        );
        assert_eq!(
            "lattice-mismatch".parse::<MissingReason>(),
            Ok(MissingReason::LatticeMismatch)
        );
    }
}
