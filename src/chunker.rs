//! 分块规划模块
//!
//! 把带token计数的行序列规划成大小均衡、不超过token上限的翻译块。
//! 与贪心装填不同，规划器先根据总量计算目标块大小，再按行累积，
//! 使各块大小彼此接近，避免出现一个很小的尾块。

use crate::types::{Chunk, Line};

/// 最后一个块小于目标大小的这一比例时，尝试并入前一个块
const MERGE_THRESHOLD: f64 = 0.7;

/// 分块规划器
///
/// 消费有序的行序列，产出有序且有限的块序列。对同一输入和配置，
/// 块边界完全确定。
///
/// # 算法
///
/// 1. 预扫描：累加所有行的token数得到总量；
/// 2. 目标定大小：总量不超过上限时整个输入作为单块返回，否则
///    按 `ceil(总量 / 上限)` 得到块数，总量除以块数得到实数目标块大小；
/// 3. 分配：按行顺序累积，累积量达到目标时在下一个行边界收块，
///    永远不从行内部切开。
///
/// 单行token数超过上限的行总是独立成块，这是唯一允许超过上限的
/// 情况。分配完成后，若最后一个块不足目标的70%，且并入前块后不
/// 超过上限，则并入前块。
///
/// # 示例
///
/// ```rust
/// use paper_translator::{ChunkPlanner, Line};
///
/// let lines = vec![
///     Line::new("first", 6000),
///     Line::new("second", 6000),
/// ];
/// let planner = ChunkPlanner::new(20000);
/// let chunks = planner.plan(&lines);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].tokens, 12000);
/// ```
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    max_token_length: usize,
}

impl ChunkPlanner {
    /// 创建新的分块规划器
    ///
    /// # 参数
    ///
    /// * `max_token_length` - 单个块的最大token数，必须为正整数
    pub fn new(max_token_length: usize) -> Self {
        Self { max_token_length }
    }

    /// 将行序列规划为块序列
    ///
    /// # 参数
    ///
    /// * `lines` - 带token计数的有序行序列
    ///
    /// # 返回
    ///
    /// 有序块序列，序号从0开始连续编号。空输入返回空序列。
    pub fn plan(&self, lines: &[Line]) -> Vec<Chunk> {
        if lines.is_empty() {
            return Vec::new();
        }

        let total_tokens: usize = lines.iter().map(|line| line.tokens).sum();

        if total_tokens <= self.max_token_length {
            tracing::debug!("输入共 {} tokens，单块即可容纳", total_tokens);
            return vec![build_chunk(0, lines)];
        }

        let num_chunks = total_tokens.div_ceil(self.max_token_length);
        let target_size = total_tokens as f64 / num_chunks as f64;

        tracing::debug!(
            "分块规划: 总量 {} tokens，目标 {} 块，目标块大小 {:.1} tokens",
            total_tokens,
            num_chunks,
            target_size
        );

        let mut chunks: Vec<Chunk> = Vec::with_capacity(num_chunks + 1);
        let mut current: Vec<&Line> = Vec::new();
        let mut current_tokens = 0usize;

        for line in lines {
            // 超限单行独立成块，不与任何相邻行合并
            if line.tokens > self.max_token_length {
                if !current.is_empty() {
                    chunks.push(build_chunk_from_refs(chunks.len(), &current, current_tokens));
                    current.clear();
                    current_tokens = 0;
                }
                tracing::warn!(
                    "第 {} 块为超限单行（{} tokens > 上限 {}），独立处理",
                    chunks.len() + 1,
                    line.tokens,
                    self.max_token_length
                );
                chunks.push(Chunk::new(chunks.len(), line.text.clone(), line.tokens));
                continue;
            }

            // 并入当前行会突破硬上限时，先在行边界收块
            if !current.is_empty() && current_tokens + line.tokens > self.max_token_length {
                chunks.push(build_chunk_from_refs(chunks.len(), &current, current_tokens));
                current.clear();
                current_tokens = 0;
            }

            current.push(line);
            current_tokens += line.tokens;

            if current_tokens as f64 >= target_size {
                chunks.push(build_chunk_from_refs(chunks.len(), &current, current_tokens));
                current.clear();
                current_tokens = 0;
            }
        }

        if !current.is_empty() {
            chunks.push(build_chunk_from_refs(chunks.len(), &current, current_tokens));
        }

        self.merge_small_tail(&mut chunks, target_size);

        chunks
    }

    /// 尾块过小时并入前块
    ///
    /// 仅当并入后不超过token上限才执行，否则保留独立尾块。
    fn merge_small_tail(&self, chunks: &mut Vec<Chunk>, target_size: f64) {
        if chunks.len() < 2 {
            return;
        }

        let last_tokens = chunks[chunks.len() - 1].tokens;
        if (last_tokens as f64) >= target_size * MERGE_THRESHOLD {
            return;
        }

        let prev_tokens = chunks[chunks.len() - 2].tokens;
        if prev_tokens + last_tokens > self.max_token_length {
            tracing::debug!(
                "尾块 {} tokens 过小但并入会超限（{} + {} > {}），保留独立尾块",
                last_tokens,
                prev_tokens,
                last_tokens,
                self.max_token_length
            );
            return;
        }

        let tail = match chunks.pop() {
            Some(chunk) => chunk,
            None => return,
        };
        if let Some(prev) = chunks.last_mut() {
            prev.text.push('\n');
            prev.text.push_str(&tail.text);
            prev.tokens += tail.tokens;
            tracing::debug!(
                "尾块 {} tokens 并入前块，合并后 {} tokens",
                tail.tokens,
                prev.tokens
            );
        }
    }
}

fn build_chunk(index: usize, lines: &[Line]) -> Chunk {
    let tokens = lines.iter().map(|line| line.tokens).sum();
    let text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Chunk::new(index, text, tokens)
}

fn build_chunk_from_refs(index: usize, lines: &[&Line], tokens: usize) -> Chunk {
    let text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Chunk::new(index, text, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lines(token_counts: &[usize]) -> Vec<Line> {
        token_counts
            .iter()
            .enumerate()
            .map(|(i, &tokens)| Line::new(format!("line-{}", i), tokens))
            .collect()
    }

    fn total_tokens(lines: &[Line]) -> usize {
        lines.iter().map(|l| l.tokens).sum()
    }

    #[test]
    fn test_empty_input_produces_no_chunks() {
        let planner = ChunkPlanner::new(1000);
        assert!(planner.plan(&[]).is_empty());
    }

    #[test]
    fn test_single_chunk_when_input_fits() {
        // 15000 tokens，上限20000，恰好单块
        let lines = make_lines(&[5000, 5000, 5000]);
        let planner = ChunkPlanner::new(20000);
        let chunks = planner.plan(&lines);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].tokens, 15000);
    }

    #[test]
    fn test_balanced_two_chunk_split() {
        // 27707 tokens，上限20000：预期2块，目标约13853.5
        let mut counts = vec![1000usize; 27];
        counts.push(707);
        let lines = make_lines(&counts);
        assert_eq!(total_tokens(&lines), 27707);

        let planner = ChunkPlanner::new(20000);
        let chunks = planner.plan(&lines);

        assert_eq!(chunks.len(), 2);
        // 两块大小接近目标，而非贪心的 20000 + 7707
        assert_eq!(chunks[0].tokens, 14000);
        assert_eq!(chunks[1].tokens, 13707);
        assert_eq!(chunks[0].tokens + chunks[1].tokens, 27707);
    }

    #[test]
    fn test_token_counts_are_conserved() {
        let lines = make_lines(&[123, 456, 789, 1011, 213, 1415, 1617, 89, 2021]);
        let planner = ChunkPlanner::new(2000);
        let chunks = planner.plan(&lines);

        let chunk_total: usize = chunks.iter().map(|c| c.tokens).sum();
        assert_eq!(chunk_total, total_tokens(&lines));
    }

    #[test]
    fn test_indices_are_contiguous() {
        let lines = make_lines(&[900, 900, 900, 900, 900, 900]);
        let planner = ChunkPlanner::new(2000);
        let chunks = planner.plan(&lines);

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
    }

    #[test]
    fn test_oversized_single_line_is_standalone() {
        // 单行25000 tokens，上限20000：独立成块且不截断
        let lines = vec![Line::new("huge", 25000)];
        let planner = ChunkPlanner::new(20000);
        let chunks = planner.plan(&lines);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tokens, 25000);
        assert_eq!(chunks[0].text, "huge");
    }

    #[test]
    fn test_oversized_line_between_normal_lines() {
        let lines = make_lines(&[40, 150, 40]);
        let planner = ChunkPlanner::new(100);
        let chunks = planner.plan(&lines);

        // 超限行独立成块，前后各自成块
        let oversized: Vec<_> = chunks.iter().filter(|c| c.tokens > 100).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].tokens, 150);
        assert_eq!(oversized[0].text, "line-1");

        let chunk_total: usize = chunks.iter().map(|c| c.tokens).sum();
        assert_eq!(chunk_total, 230);
    }

    #[test]
    fn test_multi_line_chunks_never_exceed_limit() {
        let lines = make_lines(&[60, 99, 80, 30, 70, 55]);
        let planner = ChunkPlanner::new(100);
        let chunks = planner.plan(&lines);

        for chunk in &chunks {
            // 多行块必须遵守硬上限，超限只允许出现在单行块
            if chunk.text.contains('\n') {
                assert!(chunk.tokens <= 100, "多行块 {} 超限: {}", chunk.index, chunk.tokens);
            }
        }
        let chunk_total: usize = chunks.iter().map(|c| c.tokens).sum();
        assert_eq!(chunk_total, total_tokens(&lines));
    }

    #[test]
    fn test_chunk_text_is_whole_lines_in_order() {
        let lines = vec![
            Line::new("alpha", 600),
            Line::new("beta", 600),
            Line::new("gamma", 600),
            Line::new("delta", 600),
        ];
        let planner = ChunkPlanner::new(1200);
        let chunks = planner.plan(&lines);

        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rejoined, "alpha\nbeta\ngamma\ndelta");
    }

    #[test]
    fn test_small_tail_merges_into_previous() {
        // 超限首行之后：[50,30] 收块，尾块 8 tokens 低于目标的70%，
        // 且并入后 88 <= 100，应并入前块
        let lines = make_lines(&[120, 50, 30, 8]);
        let planner = ChunkPlanner::new(100);
        let chunks = planner.plan(&lines);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].tokens, 120);
        assert_eq!(chunks[1].tokens, 88);
        assert_eq!(chunks[1].text, "line-1\nline-2\nline-3");
    }

    #[test]
    fn test_small_tail_kept_when_merge_would_exceed_limit() {
        // 尾块 4 tokens 过小，但并入 99 会到 103 > 100，保留独立尾块
        let lines = make_lines(&[99, 99, 4]);
        let planner = ChunkPlanner::new(100);
        let chunks = planner.plan(&lines);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].tokens, 4);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let lines = make_lines(&[311, 427, 96, 888, 1205, 64, 733, 550]);
        let planner = ChunkPlanner::new(1500);

        let first = planner.plan(&lines);
        let second = planner.plan(&lines);
        assert_eq!(first, second);
    }
}
