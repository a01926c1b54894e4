//! # 批处理计划文件
//!
//! TOML 格式的批处理计划：多个参考结构 × 多种分析类型。
//!
//! ## 示例
//! ```toml
//! output = "results"
//!
//! [defaults]
//! dim = 2
//! p = 2.0
//! jobs = 8
//!
//! [[structures]]
//! name = "mos2"
//! reference = "data/mos2_pristine.xyz"
//! relaxed-dir = "relaxed/mos2"
//!
//! [[analyses]]
//! name = "metal"
//! select = "type:0"
//! ```
//!
//! 相对路径以计划文件所在目录为基准。命令行参数优先于计划文件中的 `[defaults]`。
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 使用
//! - 使用 `serde` + `toml`

use crate::error::{Result, WeaverError};
use crate::models::Selection;
use crate::voronoi::Weighting;

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 计划文件中的全局默认设置
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PlanDefaults {
    pub dim: Option<usize>,
    pub p: Option<f64>,
    pub unmatched: Option<bool>,
    pub weights: Option<Weighting>,
    pub pattern: Option<String>,
    pub key_regex: Option<String>,
    pub recursive: Option<bool>,
    pub cell_tolerance: Option<f64>,
    pub jobs: Option<usize>,
    pub max_missing: Option<usize>,
}

/// 一个参考结构及其弛豫结构目录
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct StructureSpec {
    pub name: String,
    pub reference: PathBuf,
    pub relaxed_dir: PathBuf,
    /// 覆盖全局文件匹配模式
    pub pattern: Option<String>,
}

/// 一种分析类型（子晶格选择）
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AnalysisSpec {
    pub name: String,
    #[serde(default = "default_select")]
    pub select: String,
}

fn default_select() -> String {
    "all".to_string()
}

/// 批处理计划
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BatchPlan {
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub defaults: PlanDefaults,
    #[serde(default)]
    pub structures: Vec<StructureSpec>,
    #[serde(default)]
    pub analyses: Vec<AnalysisSpec>,
}

/// 计划展开后的单个作业
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJob {
    pub structure: String,
    pub analysis: String,
    pub reference: PathBuf,
    pub relaxed_dir: PathBuf,
    pub pattern: Option<String>,
    pub selection: Selection,
}

impl PlannedJob {
    /// `<output>/<structure>/<analysis>/`
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.structure).join(&self.analysis)
    }
}

impl BatchPlan {
    /// 读取并校验计划文件，相对路径转换为基于计划文件目录的路径
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| WeaverError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut plan: BatchPlan = toml::from_str(&content).map_err(|e| WeaverError::ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        plan.resolve_paths(base);
        plan.validate().map_err(|reason| WeaverError::ConfigError {
            path: path.display().to_string(),
            reason,
        })?;

        debug!(
            "Loaded plan with {} structures and {} analyses",
            plan.structures.len(),
            plan.analyses.len()
        );
        Ok(plan)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(output) = self.output.as_mut() {
            resolve(output);
        }
        for s in &mut self.structures {
            resolve(&mut s.reference);
            resolve(&mut s.relaxed_dir);
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.structures.is_empty() {
            return Err("at least one [[structures]] entry is required".to_string());
        }

        let mut names = HashSet::new();
        for s in &self.structures {
            check_name(&s.name, "structure")?;
            if !names.insert(s.name.as_str()) {
                return Err(format!("duplicate structure name '{}'", s.name));
            }
        }

        let mut names = HashSet::new();
        for a in &self.analyses {
            check_name(&a.name, "analysis")?;
            if !names.insert(a.name.as_str()) {
                return Err(format!("duplicate analysis name '{}'", a.name));
            }
            a.select
                .parse::<Selection>()
                .map_err(|e| format!("analysis '{}': {}", a.name, e))?;
        }

        if let Some(dim) = self.defaults.dim {
            if dim != 2 && dim != 3 {
                return Err(format!("dim must be 2 or 3, got {}", dim));
            }
        }
        Ok(())
    }

    /// 展开为 structures × analyses 作业列表；未定义分析时使用全部原子
    pub fn jobs(&self) -> Result<Vec<PlannedJob>> {
        let default_analysis = [AnalysisSpec {
            name: "all".to_string(),
            select: default_select(),
        }];
        let analyses: &[AnalysisSpec] = if self.analyses.is_empty() {
            &default_analysis
        } else {
            &self.analyses
        };

        let mut jobs = Vec::with_capacity(self.structures.len() * analyses.len());
        for s in &self.structures {
            for a in analyses {
                let selection = a
                    .select
                    .parse::<Selection>()
                    .map_err(WeaverError::InvalidArgument)?;
                jobs.push(PlannedJob {
                    structure: s.name.clone(),
                    analysis: a.name.clone(),
                    reference: s.reference.clone(),
                    relaxed_dir: s.relaxed_dir.clone(),
                    pattern: s.pattern.clone(),
                    selection,
                });
            }
        }
        Ok(jobs)
    }
}

/// 名称会成为输出目录名
fn check_name(name: &str, what: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} name must not be empty", what));
    }
    if name.contains(|c: char| c == '/' || c == '\\') || name == "." || name == ".." {
        return Err(format!("{} name '{}' is not a valid directory name", what, name));
    }
    Ok(())
}
