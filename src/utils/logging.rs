//! # 日志初始化
//!
//! 基于 `tracing-subscriber` 的全局日志：stderr 紧凑输出，可选纯文本日志文件。
//!
//! ## 级别
//! - 默认 WARN，`-v` INFO，`-vv` DEBUG，`-vvv` TRACE
//! - `-q` 关闭日志
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `tracing-subscriber`

use crate::error::{Result, WeaverError};

use std::fs::File;
use std::path::Path;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// 由命令行参数得到日志级别
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// 安装全局日志订阅者
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| WeaverError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            })?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_target(true);
            subscriber.with(file_layer).try_init()
        }
        None => subscriber.try_init(),
    };

    installed.map_err(|e| WeaverError::Other(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    fn test_file_layer_writes_plain_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weaver.log");

        let file = File::create(&path).unwrap();
        let layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("tessellation coverage 1.000000000");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("tessellation coverage"));
        assert!(content.contains("DEBUG"));
    }

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempdir().unwrap();
        // 目录不能作为日志文件打开
        let err = setup_logging(0, true, Some(dir.path())).unwrap_err();
        assert!(matches!(err, WeaverError::FileWriteError { .. }));
    }
}
