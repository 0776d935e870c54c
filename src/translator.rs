//! 翻译服务核心模块
//!
//! 提供翻译能力抽象、基于聊天补全接口的后端实现、速率限制，
//! 以及文件级编排入口：读入 → 计token → 分块 → 并发执行 → 聚合写出。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::aggregator::{FileSink, ResultAggregator};
use crate::chunker::ChunkPlanner;
use crate::config::{render_prompt, Glossary, PaperTranslatorConfig};
use crate::error::{ChunkError, Result, TranslationError};
use crate::executor::TranslationExecutor;
use crate::progress::{ProgressReporter, SilentReporter};
use crate::token_counter::TokenCounter;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, RunMetrics, TranslationConfig};

/// 速率限制器
///
/// 用于控制API请求频率，防止超出服务提供商的速率限制。
/// 信号量限制同时进入的请求数，固定间隔控制平均请求速率。
#[derive(Clone)]
pub struct RateLimiter {
    /// 信号量，用于控制并发请求数量
    semaphore: Arc<Semaphore>,
    /// 请求间隔延迟
    delay: Duration,
}

impl RateLimiter {
    /// 创建新的速率限制器
    ///
    /// # 参数
    ///
    /// * `requests_per_second` - 每秒允许的最大请求数
    pub fn new(requests_per_second: f64) -> Self {
        let permits = requests_per_second.ceil().max(1.0) as usize;
        let delay = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            delay,
        }
    }

    /// 获取请求许可
    ///
    /// 在发起API请求前调用此方法，确保不超过配置的速率限制。
    pub async fn acquire(&self) -> std::result::Result<(), ChunkError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ChunkError::Transient(format!("速率限制器异常: {}", e)))?;
        if self.delay > Duration::ZERO {
            sleep(self.delay).await;
        }
        Ok(())
    }
}

/// 翻译能力抽象
///
/// 执行器只依赖这个接口：输入块文本，返回译文或分类后的失败。
/// 生产实现为 [`ChatApiBackend`]，测试实现见 [`crate::mock::MockBackend`]。
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 翻译一个块的文本
    ///
    /// # 返回
    ///
    /// * `Ok(String)` - 译文
    /// * `Err(ChunkError)` - 分类后的失败，执行器据此决定是否重试
    async fn translate_chunk(&self, text: &str) -> std::result::Result<String, ChunkError>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &str;
}

/// 基于聊天补全接口的翻译后端
///
/// 把渲染好的提示词作为单条用户消息发送，携带模型与温度参数。
/// 失败按可重试性分类：限流、超时、服务端错误为暂时性失败；
/// 空响应、格式错误、其余客户端错误为永久性失败。
pub struct ChatApiBackend {
    /// HTTP客户端，用于API调用
    client: Client,
    /// 速率限制器
    rate_limiter: RateLimiter,
    /// 翻译配置
    config: TranslationConfig,
    /// 实际使用的API密钥
    api_key: String,
    /// 预格式化的术语表文本
    glossary_text: String,
}

impl ChatApiBackend {
    /// 创建新的聊天接口后端
    ///
    /// 配置中 `api_key` 为空时回退到 `OPENAI_API_KEY` 环境变量。
    pub fn new(config: TranslationConfig, glossary: &Glossary) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("构建定制HTTP客户端失败: {}，回退到默认客户端", e);
                Client::new()
            });

        let api_key = if config.api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            config.api_key.clone()
        };

        Self {
            client,
            rate_limiter: RateLimiter::new(config.max_requests_per_second),
            api_key,
            glossary_text: glossary.format_for_prompt(),
            config,
        }
    }
}

#[async_trait]
impl TranslationBackend for ChatApiBackend {
    async fn translate_chunk(&self, text: &str) -> std::result::Result<String, ChunkError> {
        self.rate_limiter.acquire().await?;

        let prompt = render_prompt(&self.config.target_lang, &self.glossary_text, text);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.temperature,
        };

        tracing::debug!(
            "发送翻译请求到 {}，文本 {} 字符",
            self.config.api_url,
            text.len()
        );

        let mut builder = self.client.post(&self.config.api_url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ChunkError::Transient(format!("请求超时: {}", e))
            } else {
                ChunkError::Transient(format!("网络请求失败: {}", e))
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ChunkError::Transient(format!(
                "服务端暂时不可用: {}",
                status
            )));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            return Err(ChunkError::Permanent(format!(
                "API请求被拒绝: {} - {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChunkError::Transient(format!("读取响应失败: {}", e)))?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ChunkError::Permanent(format!("响应格式错误: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ChunkError::Permanent("API返回了空的翻译结果".to_string()));
        }

        Ok(content)
    }

    fn backend_name(&self) -> &str {
        "chat-api"
    }
}

/// 翻译服务主类
///
/// 把token计数、分块规划、并发执行和结果聚合串成完整的翻译流程，
/// 支持整段文本和文件两种入口。
///
/// # 示例
///
/// ```no_run
/// use paper_translator::{PaperTranslatorConfig, TranslationService};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut config = PaperTranslatorConfig::load_from_default_locations();
///     config.translation.enabled = true;
///
///     let service = TranslationService::new(config)?;
///     let metrics = service.translate_file("paper.txt", "paper_ko.txt").await?;
///
///     println!(
///         "成功 {} 块，失败 {} 块，耗时 {:.2} 秒",
///         metrics.successes, metrics.failures, metrics.duration_seconds
///     );
///     Ok(())
/// }
/// ```
pub struct TranslationService {
    /// 完整配置
    config: PaperTranslatorConfig,
    /// 翻译能力
    backend: Arc<dyn TranslationBackend>,
    /// 共享token计数器
    token_counter: TokenCounter,
    /// 进度报告器
    progress: Arc<dyn ProgressReporter>,
}

impl TranslationService {
    /// 创建使用聊天接口后端的翻译服务
    ///
    /// 加载配置指定的术语表；术语表路径非空但文件缺失或损坏时
    /// 返回准备阶段错误。
    pub fn new(config: PaperTranslatorConfig) -> Result<Self> {
        let glossary = config.load_glossary()?;
        if !glossary.is_empty() {
            tracing::info!("术语表加载完成，共 {} 条", glossary.len());
        }
        let backend = Arc::new(ChatApiBackend::new(config.translation.clone(), &glossary));
        Ok(Self::with_backend(config, backend))
    }

    /// 创建使用自定义后端的翻译服务
    pub fn with_backend(
        config: PaperTranslatorConfig,
        backend: Arc<dyn TranslationBackend>,
    ) -> Self {
        Self {
            config,
            backend,
            token_counter: TokenCounter::new(),
            progress: Arc::new(SilentReporter),
        }
    }

    /// 替换进度报告器
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// 翻译整段文本
    ///
    /// # 返回
    ///
    /// 译文与本次运行的指标。翻译功能未启用时原样返回输入和
    /// 全零指标。单块失败不会让整个调用失败，只体现在指标里。
    pub async fn translate_text(&self, text: &str) -> Result<(String, RunMetrics)> {
        if !self.config.translation.enabled {
            tracing::debug!("翻译功能未启用，原样返回输入");
            return Ok((text.to_string(), RunMetrics::default()));
        }

        let aggregator = self.run_chunks(text).await;
        let metrics = aggregator.metrics();
        Ok((aggregator.assemble(), metrics))
    }

    /// 翻译输入文件并把结果写入输出文件
    ///
    /// # 参数
    ///
    /// * `input` - 输入文本文件路径
    /// * `output` - 输出译文文件路径，已存在的文件会被覆盖
    ///
    /// # 返回
    ///
    /// 本次运行的指标。输入文件不可读属于准备阶段错误，立即返回，
    /// 不会产生部分指标。
    pub async fn translate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<RunMetrics> {
        let input = input.as_ref();
        let output = output.as_ref();

        let content = std::fs::read_to_string(input).map_err(|e| {
            tracing::error!("无法读取输入文件 {}: {}", input.display(), e);
            TranslationError::Io(e)
        })?;

        if !self.config.translation.enabled {
            tracing::debug!("翻译功能未启用，原样写出输入");
            std::fs::write(output, &content)?;
            return Ok(RunMetrics::default());
        }

        let aggregator = self.run_chunks(&content).await;
        let mut sink = FileSink::create(output)?;
        aggregator.write_to(&mut sink)?;

        let metrics = aggregator.metrics();
        tracing::info!(
            "翻译完成: 成功 {} 块，失败 {} 块，耗时 {:.2} 秒，结果已写入 {}",
            metrics.successes,
            metrics.failures,
            metrics.duration_seconds,
            output.display()
        );
        Ok(metrics)
    }

    /// 完整的块级流程：计token → 规划 → 并发执行
    async fn run_chunks(&self, content: &str) -> ResultAggregator {
        let lines = self.token_counter.measure_lines(content);
        let planner = ChunkPlanner::new(self.config.chunking.max_token_length);
        let chunks = planner.plan(&lines);

        tracing::info!(
            "输入 {} 行，共 {} 个翻译块待处理（后端: {}）",
            lines.len(),
            chunks.len(),
            self.backend.backend_name()
        );

        let executor = TranslationExecutor::with_progress(
            Arc::clone(&self.backend),
            self.config.concurrency.clone(),
            Arc::clone(&self.progress),
        );
        executor.run(chunks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockBehavior};

    fn enabled_config() -> PaperTranslatorConfig {
        let mut config = PaperTranslatorConfig::default();
        config.translation.enabled = true;
        config.chunking.max_token_length = 50;
        config.concurrency.max_workers = 3;
        config
    }

    #[tokio::test]
    async fn test_translate_text_disabled_returns_input() {
        let config = PaperTranslatorConfig::default();
        let backend = Arc::new(MockBackend::new(MockBehavior::Echo));
        let service = TranslationService::with_backend(config, backend);

        let (output, metrics) = service
            .translate_text("untouched input")
            .await
            .expect("disabled run cannot fail");
        assert_eq!(output, "untouched input");
        assert_eq!(metrics.successes, 0);
        assert_eq!(metrics.failures, 0);
    }

    #[tokio::test]
    async fn test_translate_text_with_mock_backend() {
        let backend = Arc::new(MockBackend::new(MockBehavior::Echo));
        let service = TranslationService::with_backend(enabled_config(), backend.clone());

        let source = "first paragraph of the paper\nsecond paragraph of the paper";
        let (output, metrics) = service.translate_text(source).await.expect("run");

        assert!(output.contains("[译]"));
        assert!(metrics.successes >= 1);
        assert_eq!(metrics.failures, 0);
        assert!(backend.calls() >= 1);
    }

    #[tokio::test]
    async fn test_translate_file_missing_input_is_setup_error() {
        let backend = Arc::new(MockBackend::new(MockBehavior::Echo));
        let service = TranslationService::with_backend(enabled_config(), backend);

        let result = service
            .translate_file("/nonexistent/input.txt", "/tmp/unused-output.txt")
            .await;
        assert!(matches!(result, Err(TranslationError::Io(_))));
    }

    #[tokio::test]
    async fn test_translate_file_writes_output() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        std::fs::write(&input, "a line to translate\nanother line\n").expect("write input");

        let backend = Arc::new(MockBackend::new(MockBehavior::Echo));
        let service = TranslationService::with_backend(enabled_config(), backend);

        let metrics = service
            .translate_file(&input, &output)
            .await
            .expect("file run");
        assert!(metrics.successes >= 1);
        assert_eq!(metrics.failures, 0);

        let written = std::fs::read_to_string(&output).expect("read output");
        assert!(written.contains("[译]"));
        assert!(written.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_rate_limiter_acquire_succeeds() {
        let limiter = RateLimiter::new(100.0);
        limiter.acquire().await.expect("acquire permit");
    }
}
