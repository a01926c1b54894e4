//! # 统一错误处理模块
//!
//! 定义 weaver 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// weaver 统一错误类型
#[derive(Error, Debug)]
pub enum WeaverError {
    // ─────────────────────────────────────────────────────────────
    // 几何错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid lattice: determinant {determinant:.3e} is singular or non-finite")]
    InvalidLattice { determinant: f64 },

    #[error("Shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    #[error("Lattice mismatch: {reason}")]
    LatticeMismatch { reason: String },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigError { path: String, reason: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl WeaverError {
    /// 构造形状不匹配错误
    pub fn shape(reason: impl Into<String>) -> Self {
        WeaverError::ShapeMismatch {
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, WeaverError>;
