//! # 批量执行器
//!
//! 并行执行批量处理任务。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，结果保持输入顺序
//! - 进度条显示
//! - 共享取消标志：被取消后尚未开始的任务不再执行
//! - 失败数超过上限时自动取消
//!
//! ## 依赖关系
//! - 被 `batch/aggregate.rs`, `batch/collector.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{Result, WeaverError};
use crate::utils::progress;

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单个任务处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult<T> {
    /// 处理成功
    Success(T),
    /// 处理失败（携带失败时的记录值）
    Failed(T),
}

impl<T> ProcessResult<T> {
    pub fn into_inner(self) -> T {
        match self {
            ProcessResult::Success(v) | ProcessResult::Failed(v) => v,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessResult::Failed(_))
    }
}

/// 批量处理结果
#[derive(Debug)]
pub struct BatchResult<T> {
    /// 按输入顺序排列；`None` 表示因取消而未执行
    pub results: Vec<Option<ProcessResult<T>>>,
    /// 成功数量
    pub success: usize,
    /// 失败数量
    pub failed: usize,
    /// 取消数量
    pub cancelled: usize,
}

impl<T> BatchResult<T> {
    /// 总任务数量
    pub fn total(&self) -> usize {
        self.success + self.failed + self.cancelled
    }
}

/// 批量执行器
#[derive(Debug, Clone)]
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
    /// 是否显示进度条
    show_progress: bool,
    /// 允许的最大失败数
    max_failures: Option<usize>,
    /// 共享取消标志
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    /// 创建新的批量执行器（jobs = 0 时使用全部 CPU）
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            show_progress: true,
            max_failures: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 设置是否显示进度条
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 失败数超过 limit 时取消剩余任务
    pub fn with_max_failures(mut self, limit: Option<usize>) -> Self {
        self.max_failures = limit;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 请求取消
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// 并行处理任务列表
    pub fn run<I, T, F>(&self, items: &[I], message: &str, processor: F) -> Result<BatchResult<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> ProcessResult<T> + Sync + Send,
    {
        let total = items.len();
        let pb = if self.show_progress {
            progress::create_progress_bar(total as u64, message)
        } else {
            indicatif::ProgressBar::hidden()
        };

        let success_count = AtomicUsize::new(0);
        let failed_count = AtomicUsize::new(0);
        let cancelled_count = AtomicUsize::new(0);

        // 配置 rayon 线程池
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| WeaverError::Other(format!("Failed to build thread pool: {}", e)))?;

        debug!("Running {} tasks on {} threads", total, self.jobs);

        let results: Vec<Option<ProcessResult<T>>> = pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    if self.is_cancelled() {
                        cancelled_count.fetch_add(1, Ordering::Relaxed);
                        pb.inc(1);
                        return None;
                    }

                    let result = processor(item);

                    if result.is_failed() {
                        let failed = failed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(limit) = self.max_failures {
                            if failed > limit && !self.cancel.swap(true, Ordering::SeqCst) {
                                warn!(
                                    "{} failures exceed the limit of {}; cancelling remaining tasks",
                                    failed, limit
                                );
                            }
                        }
                    } else {
                        success_count.fetch_add(1, Ordering::Relaxed);
                    }

                    pb.inc(1);
                    Some(result)
                })
                .collect()
        });

        pb.finish_and_clear();

        Ok(BatchResult {
            results,
            success: success_count.into_inner(),
            failed: failed_count.into_inner(),
            cancelled: cancelled_count.into_inner(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(x: &i32) -> ProcessResult<i32> {
        if *x % 3 == 0 {
            ProcessResult::Failed(-x)
        } else {
            ProcessResult::Success(x * 10)
        }
    }

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<i32> = (1..=20).collect();
        let runner = BatchRunner::new(4).with_progress(false);
        let report = runner.run(&items, "test", classify).unwrap();

        assert_eq!(report.total(), 20);
        assert_eq!(report.failed, 6);
        assert_eq!(report.success, 14);
        assert_eq!(report.cancelled, 0);
        for (x, r) in items.iter().zip(&report.results) {
            let v = r.clone().map(ProcessResult::into_inner);
            assert_eq!(v, Some(if x % 3 == 0 { -x } else { x * 10 }));
        }
    }

    #[test]
    fn test_pre_cancelled_runner_skips_everything() {
        let items: Vec<i32> = (1..=5).collect();
        let runner = BatchRunner::new(2).with_progress(false);
        runner.cancel();

        let report = runner.run(&items, "test", classify).unwrap();
        assert_eq!(report.cancelled, 5);
        assert!(report.results.iter().all(Option::is_none));
    }

    #[test]
    fn test_failure_limit_cancels() {
        // 单线程保证执行顺序
        let items: Vec<i32> = (1..=30).collect();
        let runner = BatchRunner::new(1)
            .with_progress(false)
            .with_max_failures(Some(1));
        let report = runner.run(&items, "test", classify).unwrap();

        assert!(runner.is_cancelled());
        assert_eq!(report.failed, 2);
        assert!(report.cancelled > 0);
        assert_eq!(report.total(), 30);
    }
}
