//! 并发执行模块
//!
//! 把有序的块序列驱动到终态：以受限的工作槽并发调用翻译能力，
//! 按错误分类执行重试退避，单块失败不会中断整个运行。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

use crate::aggregator::ResultAggregator;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::translator::TranslationBackend;
use crate::types::{Chunk, ChunkOutcome, ChunkState, ConcurrencyConfig};

/// 并发翻译执行器
///
/// 持有翻译能力、并发配置和进度报告器，对一批块执行一次完整的
/// 翻译运行。并发度收紧到 [1, 10]；配置为1时严格按块序号逐个
/// 处理，与纯串行执行的行为完全一致。配置大于1时，最多有该数量
/// 的块同时在途，任何一个工作槽空出来就立即领取下一个待处理块，
/// 不做分批屏障。
///
/// 每个块的重试循环、退避计时和能力调用都只属于该块的处理过程；
/// 跨工作槽共享的只有序号到结果的映射（互斥锁保护）和成功/失败
/// 计数（原子变量）。
///
/// # 示例
///
/// ```no_run
/// use std::sync::Arc;
/// use paper_translator::{
///     Chunk, ConcurrencyConfig, MockBackend, MockBehavior, TranslationExecutor,
/// };
///
/// # #[tokio::main]
/// # async fn main() {
/// let backend = Arc::new(MockBackend::new(MockBehavior::Echo));
/// let executor = TranslationExecutor::new(backend, ConcurrencyConfig::default());
///
/// let chunks = vec![Chunk::new(0, "hello", 5)];
/// let aggregator = executor.run(chunks).await;
/// let metrics = aggregator.metrics();
/// assert_eq!(metrics.successes, 1);
/// # }
/// ```
pub struct TranslationExecutor {
    backend: Arc<dyn TranslationBackend>,
    config: ConcurrencyConfig,
    progress: Arc<dyn ProgressReporter>,
}

impl TranslationExecutor {
    /// 创建新的执行器，进度上报默认静默
    pub fn new(backend: Arc<dyn TranslationBackend>, config: ConcurrencyConfig) -> Self {
        Self::with_progress(backend, config, Arc::new(SilentReporter))
    }

    /// 创建带进度报告器的执行器
    pub fn with_progress(
        backend: Arc<dyn TranslationBackend>,
        config: ConcurrencyConfig,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            backend,
            config,
            progress,
        }
    }

    /// 驱动所有块到终态并返回聚合器
    ///
    /// 返回的聚合器已包含每个块的终态结果，可直接用于拼装输出和
    /// 生成指标。块的完成顺序不做任何保证，最终输出顺序由聚合器
    /// 按序号还原。
    pub async fn run(&self, chunks: Vec<Chunk>) -> ResultAggregator {
        let total = chunks.len();
        let aggregator = Arc::new(Mutex::new(ResultAggregator::new(total)));

        if total == 0 {
            tracing::info!("没有待翻译的块，跳过执行");
            return unwrap_aggregator(aggregator).await;
        }

        self.progress.run_started(total);
        for chunk in &chunks {
            self.progress
                .chunk_transition(chunk.index, total, ChunkState::Pending, 0);
        }

        let success_count = Arc::new(AtomicUsize::new(0));
        let failure_count = Arc::new(AtomicUsize::new(0));

        let workers = self.config.effective_workers();
        if workers == 1 {
            self.run_sequential(chunks, &aggregator, &success_count, &failure_count)
                .await;
        } else {
            self.run_concurrent(chunks, workers, &aggregator, &success_count, &failure_count)
                .await;
        }

        let aggregator = unwrap_aggregator(aggregator).await;
        tracing::info!(
            "块执行完成: 成功 {} 块，失败 {} 块",
            success_count.load(Ordering::Relaxed),
            failure_count.load(Ordering::Relaxed)
        );
        self.progress.run_completed(&aggregator.metrics());
        aggregator
    }

    /// 串行路径：严格按块序号逐个处理
    async fn run_sequential(
        &self,
        chunks: Vec<Chunk>,
        aggregator: &Arc<Mutex<ResultAggregator>>,
        success_count: &Arc<AtomicUsize>,
        failure_count: &Arc<AtomicUsize>,
    ) {
        let total = chunks.len();
        tracing::debug!("以串行模式处理 {} 个块", total);

        for chunk in chunks {
            let outcome = process_chunk(
                Arc::clone(&self.backend),
                Arc::clone(&self.progress),
                self.config.clone(),
                chunk,
                total,
            )
            .await;
            tally(&outcome, success_count, failure_count);
            aggregator.lock().await.record(outcome);
        }
    }

    /// 并发路径：信号量限制在途块数，工作槽空出即领取下一个块
    async fn run_concurrent(
        &self,
        chunks: Vec<Chunk>,
        workers: usize,
        aggregator: &Arc<Mutex<ResultAggregator>>,
        success_count: &Arc<AtomicUsize>,
        failure_count: &Arc<AtomicUsize>,
    ) {
        let total = chunks.len();
        tracing::debug!("以 {} 个并发工作槽处理 {} 个块", workers, total);

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut indices = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);

        for chunk in chunks {
            indices.push(chunk.index);

            let semaphore = Arc::clone(&semaphore);
            let backend = Arc::clone(&self.backend);
            let progress = Arc::clone(&self.progress);
            let config = self.config.clone();
            let aggregator = Arc::clone(aggregator);
            let success_count = Arc::clone(success_count);
            let failure_count = Arc::clone(failure_count);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        tracing::error!("块 {} 获取并发许可失败: {}", chunk.index + 1, err);
                        let outcome = ChunkOutcome::Failed {
                            index: chunk.index,
                            attempts: 0,
                        };
                        tally(&outcome, &success_count, &failure_count);
                        aggregator.lock().await.record(outcome);
                        return;
                    }
                };

                let outcome = process_chunk(backend, progress, config, chunk, total).await;
                tally(&outcome, &success_count, &failure_count);
                aggregator.lock().await.record(outcome);
            }));
        }

        for (position, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(err) = joined {
                let index = indices[position];
                tracing::error!("块 {} 的工作任务异常中止: {}", index + 1, err);
                let outcome = ChunkOutcome::Failed { index, attempts: 0 };
                tally(&outcome, success_count, failure_count);
                aggregator.lock().await.record(outcome);
            }
        }
    }
}

/// 单个块的完整处理过程：调用、分类、重试、退避
///
/// 暂时性失败按配置重试，两次尝试之间等待固定的退避时间；
/// 永久性失败立即落定为失败，不消耗重试次数。
async fn process_chunk(
    backend: Arc<dyn TranslationBackend>,
    progress: Arc<dyn ProgressReporter>,
    config: ConcurrencyConfig,
    chunk: Chunk,
    total: usize,
) -> ChunkOutcome {
    let index = chunk.index;
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        progress.chunk_transition(index, total, ChunkState::Running, attempts);

        match backend.translate_chunk(&chunk.text).await {
            Ok(text) => {
                progress.chunk_transition(index, total, ChunkState::Success, attempts);
                return ChunkOutcome::Success {
                    index,
                    attempts,
                    text,
                };
            }
            Err(err) if err.is_retryable() && attempts <= config.max_retries => {
                tracing::warn!(
                    "块 {} 第 {} 次尝试失败: {}，{:.1} 秒后重试",
                    index + 1,
                    attempts,
                    err,
                    config.retry_backoff_seconds
                );
                progress.chunk_transition(index, total, ChunkState::Retrying, attempts);
                if config.retry_backoff_seconds > 0.0 {
                    sleep(Duration::from_secs_f64(config.retry_backoff_seconds)).await;
                }
            }
            Err(err) => {
                tracing::error!("块 {} 翻译失败（共尝试 {} 次）: {}", index + 1, attempts, err);
                progress.chunk_transition(index, total, ChunkState::Failed, attempts);
                return ChunkOutcome::Failed { index, attempts };
            }
        }
    }
}

fn tally(outcome: &ChunkOutcome, success_count: &AtomicUsize, failure_count: &AtomicUsize) {
    if outcome.is_success() {
        success_count.fetch_add(1, Ordering::Relaxed);
    } else {
        failure_count.fetch_add(1, Ordering::Relaxed);
    }
}

async fn unwrap_aggregator(aggregator: Arc<Mutex<ResultAggregator>>) -> ResultAggregator {
    match Arc::try_unwrap(aggregator) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => shared.lock().await.clone(),
    }
}
