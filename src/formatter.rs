//! 输出格式化模块
//!
//! 对写出的译文文件做统一缩进处理。

use crate::error::Result;
use std::fs;
use std::path::Path;

/// 译文文件格式化工具
pub struct OutputFormatter;

impl OutputFormatter {
    /// 为输出文件的非空行添加统一缩进
    ///
    /// 不以两个空格开头的非空行补上两个空格前缀，空行和已缩进的
    /// 行保持原样。
    ///
    /// # 参数
    ///
    /// * `path` - 待格式化的输出文件路径
    pub fn format_output<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let mut formatted = String::with_capacity(content.len() + content.lines().count() * 2);
        for line in content.lines() {
            if line.trim().is_empty() {
                formatted.push_str(line);
            } else if !line.starts_with("  ") {
                formatted.push_str("  ");
                formatted.push_str(line);
            } else {
                formatted.push_str(line);
            }
            formatted.push('\n');
        }

        fs::write(path, formatted)?;
        tracing::info!("输出格式化完成: {}", path.display());
        Ok(())
    }
}
