//! # 批量处理模块
//!
//! 一个参考结构对全部 (种子, 损坏程度) 弛豫结构的距离批量计算。
//!
//! ## 功能
//! - 查找并读取弛豫结构文件
//! - 并行计算距离，失败条目记为缺失
//! - 按损坏程度统计
//! - CSV 导出与重新读取
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod aggregate;
pub mod collector;
pub mod export;
pub mod runner;
pub mod stats;

pub use aggregate::{run_batch, BatchOptions};
pub use collector::{discover_relaxed, load_relaxed_set, FileCollector, KeyExtractor, LoadOptions};
pub use runner::BatchRunner;
pub use stats::{summarize, LevelSummary};
