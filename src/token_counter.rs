//! token计数模块
//!
//! 提供显式构造、线程安全的token计数服务，供分块规划器和其他
//! 需要估算token数的调用方共享同一个实例。

use crate::types::Line;

/// token计数器
///
/// 无内部可变状态，`&self` 接口天然支持并发读取，可以安全地在
/// 规划器与多个工作任务之间以引用传递。
///
/// 计数采用近似估算：拉丁字母文本平均约4个字符对应1个token，
/// CJK等宽字符近似每字符1个token。估算值只用于控制块大小，
/// 不要求与具体模型的分词结果一致。
///
/// # 示例
///
/// ```rust
/// use paper_translator::TokenCounter;
///
/// let counter = TokenCounter::new();
/// let tokens = counter.count_tokens("Hello, world!");
/// assert!(tokens >= 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// 创建新的token计数器
    pub fn new() -> Self {
        Self
    }

    /// 估算文本的token数
    ///
    /// # 参数
    ///
    /// * `text` - 待估算的文本
    ///
    /// # 返回
    ///
    /// 估算的token数，最小为1，避免空行产生零token计数
    pub fn count_tokens(&self, text: &str) -> usize {
        let mut narrow = 0usize;
        let mut wide = 0usize;

        for ch in text.chars() {
            // U+2E80 起为CJK部首补充区，以此粗分全角与半角字符
            if (ch as u32) < 0x2E80 {
                narrow += 1;
            } else {
                wide += 1;
            }
        }

        (narrow / 4 + wide).max(1)
    }

    /// 将整段文本拆成带token计数的行序列
    ///
    /// 每行去掉行尾换行符后计数一次，顺序与输入保持一致。
    pub fn measure_lines(&self, content: &str) -> Vec<Line> {
        content
            .lines()
            .map(|line| Line::new(line, self.count_tokens(line)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_ascii() {
        let counter = TokenCounter::new();
        // 40个半角字符约10个token
        let text = "a".repeat(40);
        assert_eq!(counter.count_tokens(&text), 10);
    }

    #[test]
    fn test_count_tokens_cjk() {
        let counter = TokenCounter::new();
        // 全角字符按每字符1个token估算
        assert_eq!(counter.count_tokens("번역테스트"), 5);
    }

    #[test]
    fn test_count_tokens_never_zero() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_tokens(""), 1);
        assert_eq!(counter.count_tokens("ab"), 1);
    }

    #[test]
    fn test_measure_lines_preserves_order() {
        let counter = TokenCounter::new();
        let lines = counter.measure_lines("first line\nsecond line\n\nlast");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "first line");
        assert_eq!(lines[2].text, "");
        assert_eq!(lines[3].text, "last");
        for line in &lines {
            assert!(line.tokens >= 1);
        }
    }

    #[test]
    fn test_shared_across_threads() {
        let counter = std::sync::Arc::new(TokenCounter::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counter = std::sync::Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                counter.count_tokens("concurrent read access")
            }));
        }
        for handle in handles {
            assert!(handle.join().expect("worker thread panicked") >= 1);
        }
    }
}
