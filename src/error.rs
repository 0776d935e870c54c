//! 错误处理模块
//!
//! 定义翻译库中使用的错误类型和错误处理机制。
//!
//! 错误分为两层：[`TranslationError`] 表示在任何块开始处理之前发生的
//! 准备阶段错误，会直接穿过库边界返回给调用方；[`ChunkError`] 表示
//! 单个块翻译过程中的失败，由执行器在内部消化，永远不会向调用方
//! 抛出，只体现在运行指标的失败计数里。

use thiserror::Error;

/// 准备阶段错误
///
/// 这一类错误发生在分块与翻译开始之前（或输出写入时），属于致命
/// 错误：直接中止本次运行，不会产生部分指标。
#[derive(Error, Debug)]
pub enum TranslationError {
    /// 输入或输出文件读写错误
    #[error("文件读写失败: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件解析或序列化错误
    #[error("配置处理失败: {0}")]
    Config(String),

    /// 术语表加载错误
    #[error("术语表加载失败: {0}")]
    Glossary(String),
}

/// 翻译结果类型别名
///
/// 简化返回类型，使用 `TranslationError` 作为错误类型。
pub type Result<T> = std::result::Result<T, TranslationError>;

/// 单个块的翻译错误
///
/// 用带标签的变体区分可重试与不可重试的失败，重试循环只依据
/// [`ChunkError::is_retryable`] 分支，不关心具体来源。
///
/// # 变体说明
///
/// * `Transient` - 暂时性失败（限流、超时、服务端可恢复错误），按退避策略重试
/// * `Permanent` - 永久性失败（空响应、响应格式错误、客户端错误），立即判定失败
#[derive(Error, Debug, Clone)]
pub enum ChunkError {
    /// 暂时性失败，可重试
    #[error("暂时性翻译错误: {0}")]
    Transient(String),

    /// 永久性失败，不重试
    #[error("永久性翻译错误: {0}")]
    Permanent(String),
}

impl ChunkError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChunkError::Transient(_))
    }
}
