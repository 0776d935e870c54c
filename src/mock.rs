//! 模拟翻译后端模块
//!
//! 提供确定性的、不依赖网络和API密钥的翻译后端，用于在测试中
//! 驱动执行器走完各种成功与失败路径。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::ChunkError;
use crate::translator::TranslationBackend;

/// 模拟后端的行为模式
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 回显：返回带标记前缀的原文
    Echo,
    /// 文本包含指定片段的块永久失败，其余回显
    FailWhenContains(String),
    /// 文本包含指定片段的块先暂时性失败若干次，之后回显
    TransientWhenContains {
        /// 触发失败的文本片段
        needle: String,
        /// 成功前的失败次数
        failures: usize,
    },
    /// 所有调用都返回暂时性失败
    AlwaysTransient(String),
}

/// 模拟翻译后端
///
/// 行为完全由 [`MockBehavior`] 决定，可叠加固定延迟和针对特定
/// 文本的额外延迟，用来模拟慢请求和乱序完成。
///
/// # 示例
///
/// ```rust
/// use paper_translator::{MockBackend, MockBehavior, TranslationBackend};
///
/// let mock = MockBackend::new(MockBehavior::Echo);
/// let result = tokio_test::block_on(mock.translate_chunk("hello"));
/// assert_eq!(result.unwrap(), "[译] hello");
/// ```
#[derive(Debug)]
pub struct MockBackend {
    behavior: MockBehavior,
    delay: Duration,
    slow_marker: Option<(String, Duration)>,
    calls: AtomicUsize,
    matched_failures: AtomicUsize,
}

impl MockBackend {
    /// 创建指定行为的模拟后端
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            slow_marker: None,
            calls: AtomicUsize::new(0),
            matched_failures: AtomicUsize::new(0),
        }
    }

    /// 为每次调用叠加固定延迟
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// 为包含指定片段的块叠加额外延迟
    pub fn with_slow_marker(mut self, needle: &str, extra_delay_ms: u64) -> Self {
        self.slow_marker = Some((needle.to_string(), Duration::from_millis(extra_delay_ms)));
        self
    }

    /// 累计调用次数，用于断言重试行为
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn echo(text: &str) -> String {
        format!("[译] {}", text)
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate_chunk(&self, text: &str) -> std::result::Result<String, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.delay > Duration::ZERO {
            sleep(self.delay).await;
        }
        if let Some((needle, extra)) = &self.slow_marker {
            if text.contains(needle.as_str()) {
                sleep(*extra).await;
            }
        }

        match &self.behavior {
            MockBehavior::Echo => Ok(Self::echo(text)),
            MockBehavior::FailWhenContains(needle) => {
                if text.contains(needle.as_str()) {
                    Err(ChunkError::Permanent(format!(
                        "模拟永久失败: 文本包含 {:?}",
                        needle
                    )))
                } else {
                    Ok(Self::echo(text))
                }
            }
            MockBehavior::TransientWhenContains { needle, failures } => {
                if text.contains(needle.as_str()) {
                    let seen = self.matched_failures.fetch_add(1, Ordering::SeqCst);
                    if seen < *failures {
                        return Err(ChunkError::Transient(format!(
                            "模拟暂时性失败（第 {} 次）",
                            seen + 1
                        )));
                    }
                }
                Ok(Self::echo(text))
            }
            MockBehavior::AlwaysTransient(message) => {
                Err(ChunkError::Transient(message.clone()))
            }
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}
