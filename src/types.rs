//! 类型定义模块
//!
//! 定义翻译库中使用的核心数据结构：行、块、块结果、运行指标，
//! 以及各配置分节和聊天接口的请求/响应类型。

use serde::{Deserialize, Serialize};

/// 源文本行
///
/// 分块的最小单位。每一行在读入时计算一次token数，之后不再变化，
/// 分块过程中永远不会从行内部切开。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 行文本（不含行尾换行符）
    pub text: String,
    /// 该行的token数
    pub tokens: usize,
}

impl Line {
    /// 创建新的源文本行
    pub fn new(text: impl Into<String>, tokens: usize) -> Self {
        Self {
            text: text.into(),
            tokens,
        }
    }
}

/// 翻译块
///
/// 由连续若干整行组成的翻译单位，带稳定的从零开始的序号。
/// 所有块按序号拼接即还原完整输入，token数为成员行token数之和。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 块序号，从0开始且连续
    pub index: usize,
    /// 块文本，成员行按原顺序以换行符连接
    pub text: String,
    /// 块的token总数
    pub tokens: usize,
}

impl Chunk {
    /// 创建新的翻译块
    pub fn new(index: usize, text: impl Into<String>, tokens: usize) -> Self {
        Self {
            index,
            text: text.into(),
            tokens,
        }
    }
}

/// 单个块的处理状态
///
/// 状态机：`Pending → Running → Success`，或
/// `Running → Retrying → Running → … → Failed`。
/// `Success` 与 `Failed` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// 等待执行
    Pending,
    /// 正在调用翻译能力
    Running,
    /// 暂时性失败后等待重试
    Retrying,
    /// 翻译成功（终态）
    Success,
    /// 重试耗尽或永久失败（终态）
    Failed,
}

impl ChunkState {
    /// 状态的中文描述，用于日志输出
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkState::Pending => "等待中",
            ChunkState::Running => "处理中",
            ChunkState::Retrying => "重试中",
            ChunkState::Success => "成功",
            ChunkState::Failed => "失败",
        }
    }
}

/// 单个块的终态结果
///
/// 每个块恰好产生一个结果：翻译成功携带译文，失败则只记录序号与
/// 尝试次数。失败的块不会中断整个运行，只体现在最终指标里。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// 翻译成功
    Success {
        /// 块序号
        index: usize,
        /// 实际尝试次数（含首次调用）
        attempts: usize,
        /// 译文文本
        text: String,
    },
    /// 翻译失败
    Failed {
        /// 块序号
        index: usize,
        /// 实际尝试次数（含首次调用）
        attempts: usize,
    },
}

impl ChunkOutcome {
    /// 结果对应的块序号
    pub fn index(&self) -> usize {
        match self {
            ChunkOutcome::Success { index, .. } | ChunkOutcome::Failed { index, .. } => *index,
        }
    }

    /// 实际尝试次数
    pub fn attempts(&self) -> usize {
        match self {
            ChunkOutcome::Success { attempts, .. } | ChunkOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    /// 是否为成功结果
    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Success { .. })
    }

    /// 成功时返回译文，失败时返回 `None`
    pub fn text(&self) -> Option<&str> {
        match self {
            ChunkOutcome::Success { text, .. } => Some(text.as_str()),
            ChunkOutcome::Failed { .. } => None,
        }
    }
}

/// 一次翻译运行的汇总指标
///
/// 每次运行结束时生成一份快照交给调用方。`duration_seconds` 为
/// 执行器启动到最后一个块落定的墙钟时间，而非各块耗时之和。
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// 成功的块数
    pub successes: usize,
    /// 失败的块数
    pub failures: usize,
    /// 运行总耗时（秒）
    pub duration_seconds: f64,
}

/// 翻译配置
///
/// 包含翻译服务的所有配置选项，如API地址、模型、术语表路径等。
///
/// # 字段说明
///
/// * `enabled` - 是否启用翻译功能
/// * `target_lang` - 目标语言代码
/// * `api_url` - 聊天补全API地址
/// * `api_key` - API密钥，留空时回退到 `OPENAI_API_KEY` 环境变量
/// * `model` - 模型名称
/// * `temperature` - 生成温度
/// * `glossary_file` - 术语表JSON文件路径，留空表示不使用术语表
/// * `max_requests_per_second` - 每秒最大请求数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// 是否启用翻译功能
    pub enabled: bool,
    /// 目标语言代码
    pub target_lang: String,
    /// 聊天补全API地址
    pub api_url: String,
    /// API密钥，留空时回退到环境变量
    pub api_key: String,
    /// 模型名称
    pub model: String,
    /// 生成温度
    pub temperature: f64,
    /// 术语表JSON文件路径
    pub glossary_file: String,
    /// 每秒最大请求数
    pub max_requests_per_second: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_lang: "ko".to_string(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-5-mini".to_string(),
            temperature: 1.0,
            glossary_file: String::new(),
            max_requests_per_second: 1.0,
        }
    }
}

/// 分块配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// 单个块的最大token数
    pub max_token_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_token_length: 8000,
        }
    }
}

/// 并发与重试配置
///
/// # 字段说明
///
/// * `max_workers` - 并发工作槽数量，使用时收紧到 [1, 10]
/// * `max_retries` - 暂时性失败后的额外重试次数
/// * `retry_backoff_seconds` - 两次尝试之间的固定等待时间（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// 并发工作槽数量
    pub max_workers: usize,
    /// 暂时性失败后的额外重试次数
    pub max_retries: usize,
    /// 重试间的固定退避时间（秒）
    pub retry_backoff_seconds: f64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_retries: 2,
            retry_backoff_seconds: 0.0,
        }
    }
}

impl ConcurrencyConfig {
    /// 收紧后的实际并发数
    ///
    /// 配置值小于1按1处理，大于10按10处理。`1` 表示严格按块序号
    /// 顺序串行处理。
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(1, 10)
    }
}

/// 聊天补全请求体
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

/// 聊天消息
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// 构造一条用户消息
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 聊天补全响应体
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

/// 响应中的单个候选
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}
