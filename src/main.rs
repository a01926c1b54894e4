//! # weaver - 损坏势函数下弛豫结构的周期 Wasserstein 距离
//!
//! 以参考结构子晶格的周期 Voronoi 胞测度作为输运质量，计算弛豫结构与参考结构
//! 之间的 p 阶 Wasserstein 距离，并按 (种子, 损坏程度) 批量汇总。
//!
//! ## 子命令
//! - `distance`  - 两个结构之间的距离
//! - `masses`    - 参考结构的 Voronoi 质量
//! - `batch`     - 批量距离数组与按损坏程度统计
//! - `summarize` - 由 distances.csv 重新统计
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── config.rs   (批处理计划文件)
//!   │     ├── batch/      (查找、并行计算、统计、导出)
//!   │     ├── transport/  (输运求解与距离)
//!   │     ├── voronoi/    (周期 Voronoi 质量)
//!   │     ├── geometry/   (晶格与最小镜像)
//!   │     ├── parsers/    (XYZ / POSCAR 解析器)
//!   │     └── models/     (数据模型)
//!   ├── utils/      (日志、输出、进度条)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod geometry;
mod models;
mod parsers;
mod transport;
mod utils;
mod voronoi;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = utils::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
