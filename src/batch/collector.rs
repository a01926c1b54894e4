//! # 弛豫结构收集器
//!
//! 在目录中查找弛豫结构文件，从文件名提取 (种子, 损坏程度)，并并行读取为点集。
//!
//! ## 功能
//! - glob 模式匹配文件名，可选递归
//! - 正则命名分组 `seed` / `level` 提取键
//! - 读取失败、晶胞不兼容等问题记为该条目缺失
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配，`regex` 提取键
//! - 使用 `parsers/` 读取结构

use crate::batch::aggregate::{EntryKey, MissingReason, RelaxedSet};
use crate::batch::runner::{BatchRunner, ProcessResult};
use crate::error::{Result, WeaverError};
use crate::geometry::LatticeVectors;
use crate::models::{ensure_compatible_cells, Dim, PointSet, Selection};
use crate::parsers;

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 弛豫器输出文件的默认匹配模式
pub const DEFAULT_PATTERN: &str = "*_lowest_energy.xyz";

/// 从文件名提取键的默认正则
pub const DEFAULT_KEY_REGEX: &str =
    r"(?i)seed_(?P<seed>\d+).*?(?:idx|corruption|level)_(?P<level>\d+)";

/// 弛豫晶胞与参考晶胞允许的最大分量差 (Å)
pub const DEFAULT_CELL_TOLERANCE: f64 = 1e-4;

/// 文件收集器
pub struct FileCollector {
    /// 输入目录
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<glob::Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                glob::Pattern::new(s).map_err(|e| {
                    WeaverError::InvalidArgument(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件（按路径排序）
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.input.is_dir() {
            return Err(WeaverError::DirectoryNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches_patterns(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }

    /// 检查文件是否匹配任一模式（无模式时全部匹配）
    fn matches_patterns(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }
}

/// 从文件名提取 (种子, 损坏程度)
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    regex: Regex,
}

impl KeyExtractor {
    /// 正则必须包含命名分组 `seed` 和 `level`
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            WeaverError::InvalidArgument(format!("Invalid key regex '{}': {}", pattern, e))
        })?;
        for group in ["seed", "level"] {
            if !regex.capture_names().flatten().any(|n| n == group) {
                return Err(WeaverError::InvalidArgument(format!(
                    "Key regex '{}' lacks the named group '{}'",
                    pattern, group
                )));
            }
        }
        Ok(KeyExtractor { regex })
    }

    pub fn extract(&self, path: &Path) -> Option<EntryKey> {
        let name = path.file_name()?.to_str()?;
        let caps = self.regex.captures(name)?;
        let seed = caps.name("seed")?.as_str().parse().ok()?;
        let level = caps.name("level")?.as_str().parse().ok()?;
        Some(EntryKey::new(seed, level))
    }
}

/// 查找弛豫结构文件并按键索引
///
/// 文件名无法提取键的文件被跳过；同一键对应多个文件时保留路径排序最前者。
pub fn discover_relaxed(
    collector: &FileCollector,
    extractor: &KeyExtractor,
) -> Result<BTreeMap<EntryKey, PathBuf>> {
    let files = collector.collect()?;
    let mut found: BTreeMap<EntryKey, PathBuf> = BTreeMap::new();

    for path in files {
        let Some(key) = extractor.extract(&path) else {
            warn!("Skipping {}: no seed/level in file name", path.display());
            continue;
        };
        if let Some(existing) = found.get(&key) {
            warn!(
                "Duplicate {}: keeping {}, ignoring {}",
                key,
                existing.display(),
                path.display()
            );
            continue;
        }
        found.insert(key, path);
    }

    if found.is_empty() {
        let patterns: Vec<&str> = collector.patterns.iter().map(|p| p.as_str()).collect();
        return Err(WeaverError::NoFilesFound {
            pattern: format!("{}/{}", collector.input.display(), patterns.join(",")),
        });
    }

    debug!("Discovered {} relaxed structures", found.len());
    Ok(found)
}

/// 读取弛豫结构的选项
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub selection: Selection,
    pub dim: Dim,
    pub cell_tolerance: f64,
}

/// 并行读取所有弛豫结构并提取子晶格
pub fn load_relaxed_set(
    files: &BTreeMap<EntryKey, PathBuf>,
    reference_lattice: &LatticeVectors,
    options: &LoadOptions,
    runner: &BatchRunner,
) -> Result<RelaxedSet> {
    let items: Vec<(EntryKey, &PathBuf)> = files.iter().map(|(k, p)| (*k, p)).collect();

    let report = runner.run(&items, "Reading structures", |(key, path)| {
        match load_one(path, reference_lattice, options) {
            Ok(points) => ProcessResult::Success(Ok(points)),
            Err(e) => {
                warn!("{} ({}): {}", key, path.display(), e);
                ProcessResult::Failed(Err(MissingReason::from_error(&e)))
            }
        }
    })?;
    info!(
        "Read {} structures: {} ok, {} failed, {} cancelled",
        report.total(),
        report.success,
        report.failed,
        report.cancelled
    );

    Ok(items
        .iter()
        .zip(report.results)
        .map(|((key, _), result)| {
            let value = result
                .map(ProcessResult::into_inner)
                .unwrap_or(Err(MissingReason::Cancelled));
            (*key, value)
        })
        .collect())
}

fn load_one(path: &Path, reference_lattice: &LatticeVectors, options: &LoadOptions) -> Result<PointSet> {
    let structure = parsers::parse_structure_file(path)?;
    let lattice = structure.lattice_vectors(options.dim)?;
    ensure_compatible_cells(reference_lattice, &lattice, options.cell_tolerance)?;
    Ok(structure.select(&options.selection, options.dim))
}
