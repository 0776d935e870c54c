//! 进度报告模块
//!
//! 以多态能力的形式向外暴露运行进度，执行器与聚合器只管调用，
//! 不需要在每次上报前判断是否有人关心进度。

use crate::types::{ChunkState, RunMetrics};

/// 进度报告能力
///
/// 两个内置实现：[`LogReporter`] 把状态变化写入结构化日志，
/// [`SilentReporter`] 什么都不做，作为默认值使用。
pub trait ProgressReporter: Send + Sync {
    /// 运行开始，告知总块数
    fn run_started(&self, total_chunks: usize);

    /// 某个块发生状态转移
    ///
    /// # 参数
    ///
    /// * `index` - 块序号（从0开始）
    /// * `total` - 总块数
    /// * `state` - 转移后的状态
    /// * `attempt` - 当前尝试次数（含首次调用）
    fn chunk_transition(&self, index: usize, total: usize, state: ChunkState, attempt: usize);

    /// 运行结束，附带最终指标
    fn run_completed(&self, metrics: &RunMetrics);
}

/// 基于结构化日志的进度报告器
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn run_started(&self, total_chunks: usize) {
        tracing::info!("共 {} 个翻译块待处理", total_chunks);
    }

    fn chunk_transition(&self, index: usize, total: usize, state: ChunkState, attempt: usize) {
        match state {
            ChunkState::Running if attempt <= 1 => {
                tracing::info!("翻译块 {}/{} 开始处理", index + 1, total);
            }
            ChunkState::Running => {
                tracing::info!("翻译块 {}/{} 第 {} 次尝试", index + 1, total, attempt);
            }
            ChunkState::Retrying => {
                tracing::warn!("翻译块 {}/{} 等待重试（已尝试 {} 次）", index + 1, total, attempt);
            }
            ChunkState::Success => {
                tracing::info!("翻译块 {}/{} 完成", index + 1, total);
            }
            ChunkState::Failed => {
                tracing::error!("翻译块 {}/{} 失败（共尝试 {} 次）", index + 1, total, attempt);
            }
            ChunkState::Pending => {}
        }
    }

    fn run_completed(&self, metrics: &RunMetrics) {
        tracing::info!(
            "翻译运行结束: 成功 {} 块，失败 {} 块，耗时 {:.2} 秒",
            metrics.successes,
            metrics.failures,
            metrics.duration_seconds
        );
    }
}

/// 静默进度报告器，所有上报均为空操作
#[derive(Debug, Clone, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn run_started(&self, _total_chunks: usize) {}

    fn chunk_transition(&self, _index: usize, _total: usize, _state: ChunkState, _attempt: usize) {}

    fn run_completed(&self, _metrics: &RunMetrics) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 记录转移次数的测试报告器
    #[derive(Default)]
    struct CountingReporter {
        transitions: AtomicUsize,
    }

    impl ProgressReporter for CountingReporter {
        fn run_started(&self, _total_chunks: usize) {}

        fn chunk_transition(
            &self,
            _index: usize,
            _total: usize,
            _state: ChunkState,
            _attempt: usize,
        ) {
            self.transitions.fetch_add(1, Ordering::Relaxed);
        }

        fn run_completed(&self, _metrics: &RunMetrics) {}
    }

    #[test]
    fn test_reporter_is_object_safe() {
        let reporters: Vec<Arc<dyn ProgressReporter>> = vec![
            Arc::new(LogReporter),
            Arc::new(SilentReporter),
            Arc::new(CountingReporter::default()),
        ];
        for reporter in &reporters {
            reporter.run_started(2);
            reporter.chunk_transition(0, 2, ChunkState::Running, 1);
            reporter.chunk_transition(0, 2, ChunkState::Success, 1);
            reporter.run_completed(&RunMetrics::default());
        }
    }
}
