//! # 工具函数模块
//!
//! 提供日志初始化、美化输出与进度条等工具。
//!
//! ## 依赖关系
//! - 被 `main.rs`, `commands/`, `batch/` 模块使用
//! - 子模块: logging, output, progress

pub mod logging;
pub mod output;
pub mod progress;
