//! 失败记录服务 - 业务能力层
//!
//! 只负责"写失败记录文件"能力，不关心流程

use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::debug;

use crate::models::result::JobFailure;

/// 失败记录服务
///
/// 职责：
/// - 将失败的任务追加写入失败记录文件
/// - 对 `MalformedOutput` 附带生成服务的原始输出，便于排查
/// - 原始输出只写入该文件，不出现在导出的 JSON 中
pub struct FailureWriter {
    failure_file_path: String,
}

impl FailureWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            failure_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.failure_file_path
    }

    /// 写入文件头（覆盖旧内容）
    pub fn init(&self) -> Result<()> {
        let header = format!(
            "{}\n生成失败记录 - {}\n{}\n\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        fs::write(&self.failure_file_path, header)?;
        Ok(())
    }

    /// 追加一条失败记录
    pub fn write(&self, failure: &JobFailure) -> Result<()> {
        debug!(
            "写入失败记录: 任务 {} | 阶段 {} | {}",
            failure.job_id,
            failure.stage,
            failure.error.kind()
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failure_file_path)?;

        file.write_all(format_failure(failure).as_bytes())?;
        Ok(())
    }
}

impl Default for FailureWriter {
    fn default() -> Self {
        Self::with_path("failures.txt")
    }
}

fn format_failure(failure: &JobFailure) -> String {
    let mut line = format!(
        "任务 {} | 阶段 {} | {} | {}\n",
        failure.job_id,
        failure.stage,
        failure.error.kind(),
        failure.error
    );
    if let Some(raw) = failure.error.raw_output() {
        line.push_str("--- 原始输出 ---\n");
        line.push_str(raw);
        line.push_str("\n--- 结束 ---\n");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::stage::Stage;

    #[test]
    fn test_format_includes_raw_only_for_malformed() {
        let malformed = JobFailure::new(
            "VA1-2",
            Stage::StemClue,
            GenerationError::MalformedOutput {
                raw: "Sure! here it is".to_string(),
            },
        );
        let text = format_failure(&malformed);
        assert!(text.starts_with("任务 VA1-2 | 阶段 stage1 | MalformedOutput"));
        assert!(text.contains("Sure! here it is"));

        let empty = JobFailure::new("VA1-3", Stage::Holistic, GenerationError::EmptyResponse);
        assert!(!format_failure(&empty).contains("原始输出"));
    }

    #[test]
    fn test_write_appends_after_header() {
        let path = std::env::temp_dir().join(format!("item_forge_failures_{}.txt", std::process::id()));
        let writer = FailureWriter::with_path(path.to_string_lossy().to_string());
        writer.init().unwrap();
        writer
            .write(&JobFailure::new("GA2-1", Stage::Distractors, GenerationError::Aborted))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(content.contains("生成失败记录"));
        assert!(content.contains("任务 GA2-1 | 阶段 stage2 | Aborted"));
    }
}
