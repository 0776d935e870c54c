//! 结果聚合模块
//!
//! 收集以任意完成顺序到达的块结果，待全部块落定后按原始块序号
//! 拼装最终译文，并生成一次运行的汇总指标。

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use crate::types::{ChunkOutcome, RunMetrics};

/// 译文输出目标
///
/// 聚合器通过追加语义写出译文，不关心落点是文件还是内存缓冲。
pub trait OutputSink: Send {
    /// 追加一段文本
    fn append(&mut self, text: &str) -> io::Result<()>;
}

/// 文件输出目标
///
/// 创建（或清空）目标文件，之后逐块追加写入。
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// 创建新的文件输出目标，已存在的文件会被清空
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl OutputSink for FileSink {
    fn append(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())
    }
}

/// 内存输出目标，测试和库内组装时使用
#[derive(Debug, Default)]
pub struct StringSink {
    buffer: String,
}

impl StringSink {
    /// 创建空的内存输出目标
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出累积的全部文本
    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl OutputSink for StringSink {
    fn append(&mut self, text: &str) -> io::Result<()> {
        self.buffer.push_str(text);
        Ok(())
    }
}

/// 结果聚合器
///
/// 维护块序号到结果的映射。结果可以以任意顺序记录（并发执行时
/// 完成顺序不可预期），但拼装输出时总是按序号从小到大遍历，
/// 失败的块静默跳过，不在输出中留占位符，也不影响其余块的相对
/// 顺序。
///
/// 计时从聚合器创建（即执行器启动）开始，到最后一个块结果落定
/// 为止，体现的是并发后的墙钟耗时而非各块耗时之和。
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    outcomes: HashMap<usize, ChunkOutcome>,
    total_chunks: usize,
    started_at: Instant,
    completed_at: Option<Instant>,
}

impl ResultAggregator {
    /// 创建新的聚合器并开始计时
    ///
    /// # 参数
    ///
    /// * `total_chunks` - 本次运行的总块数
    pub fn new(total_chunks: usize) -> Self {
        Self {
            outcomes: HashMap::with_capacity(total_chunks),
            total_chunks,
            started_at: Instant::now(),
            completed_at: None,
        }
    }

    /// 记录一个块的终态结果
    ///
    /// 每个块只应记录一次；记录最后一个块时冻结运行耗时。
    pub fn record(&mut self, outcome: ChunkOutcome) {
        let index = outcome.index();
        if self.outcomes.insert(index, outcome).is_some() {
            tracing::warn!("块 {} 的结果被重复记录，保留最新一次", index);
        }
        if self.is_complete() && self.completed_at.is_none() {
            self.completed_at = Some(Instant::now());
        }
    }

    /// 是否所有块都已落定
    pub fn is_complete(&self) -> bool {
        self.outcomes.len() >= self.total_chunks
    }

    /// 按块序号拼装最终译文
    ///
    /// 每个成功块的译文后跟一个空行分隔；失败的块静默省略。
    pub fn assemble(&self) -> String {
        let mut assembled = String::new();
        for index in 0..self.total_chunks {
            if let Some(text) = self.outcomes.get(&index).and_then(|o| o.text()) {
                assembled.push_str(text);
                assembled.push_str("\n\n");
            }
        }
        assembled
    }

    /// 把拼装结果写入输出目标
    ///
    /// 写出内容与 [`assemble`](Self::assemble) 完全一致。
    pub fn write_to(&self, sink: &mut dyn OutputSink) -> io::Result<()> {
        for index in 0..self.total_chunks {
            if let Some(text) = self.outcomes.get(&index).and_then(|o| o.text()) {
                sink.append(text)?;
                sink.append("\n\n")?;
            }
        }
        Ok(())
    }

    /// 生成本次运行的指标快照
    pub fn metrics(&self) -> RunMetrics {
        let successes = self.outcomes.values().filter(|o| o.is_success()).count();
        let failures = self.outcomes.len() - successes;
        let end = self.completed_at.unwrap_or_else(Instant::now);
        RunMetrics {
            successes,
            failures,
            duration_seconds: end.duration_since(self.started_at).as_secs_f64(),
        }
    }
}
