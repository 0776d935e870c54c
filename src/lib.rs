//! # Paper Translator
//!
//! 一个面向大体量文档的Rust并发翻译库，把长文本按token均衡地切成
//! 有界大小的块，用受限的工作槽并发调用翻译能力，最后按原始顺序
//! 还原译文。
//!
//! ## 主要特性
//!
//! - **均衡分块**: 按总量计算目标块大小再分配，避免贪心装填产生的碎尾块
//! - **并发执行**: 最多10个工作槽并发翻译，槽位空出即领取下一块
//! - **失败分类重试**: 暂时性失败按固定退避重试，永久性失败立即落定
//! - **顺序还原**: 完成顺序任意，输出总是按原始块序号拼装
//! - **运行指标**: 每次运行产出成功/失败计数与墙钟耗时
//! - **配置灵活**: 支持TOML配置文件和程序化配置
//!
//! ## 快速开始
//!
//! ```no_run
//! use paper_translator::{PaperTranslatorConfig, TranslationService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = PaperTranslatorConfig::load_from_default_locations();
//!     config.translation.enabled = true;
//!     config.translation.target_lang = "ko".to_string();
//!
//!     let service = TranslationService::new(config)?;
//!     let metrics = service.translate_file("paper.txt", "paper_ko.txt").await?;
//!
//!     println!("成功 {} 块，失败 {} 块", metrics.successes, metrics.failures);
//!     Ok(())
//! }
//! ```
//!
//! ## 配置文件支持
//!
//! ```toml
//! [translation]
//! enabled = true
//! target_lang = "ko"
//! api_url = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-5-mini"
//! temperature = 1.0
//! glossary_file = "glossary.json"
//! max_requests_per_second = 1.0
//!
//! [chunking]
//! max_token_length = 8000
//!
//! [concurrency]
//! max_workers = 3
//! max_retries = 2
//! retry_backoff_seconds = 0.0
//! ```

pub mod aggregator;
pub mod chunker;
pub mod config;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod mock;
pub mod progress;
pub mod token_counter;
pub mod translator;
pub mod types;

pub use aggregator::{FileSink, OutputSink, ResultAggregator, StringSink};
pub use chunker::ChunkPlanner;
pub use config::{render_prompt, Glossary, GlossaryEntry, PaperTranslatorConfig};
pub use error::{ChunkError, Result, TranslationError};
pub use executor::TranslationExecutor;
pub use formatter::OutputFormatter;
pub use mock::{MockBackend, MockBehavior};
pub use progress::{LogReporter, ProgressReporter, SilentReporter};
pub use token_counter::TokenCounter;
pub use translator::{ChatApiBackend, RateLimiter, TranslationBackend, TranslationService};
pub use types::{
    Chunk, ChunkOutcome, ChunkState, ChunkingConfig, ConcurrencyConfig, Line, RunMetrics,
    TranslationConfig,
};
