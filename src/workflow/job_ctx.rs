//! 任务处理上下文
//!
//! 封装"我正在处理这一批的第几个任务"这一信息，只用于日志

use std::fmt::Display;

/// 任务处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 任务ID
    pub job_id: String,

    /// 任务在批次中的位置（从1开始）
    pub index: usize,

    /// 批次任务总数
    pub total: usize,
}

impl JobCtx {
    pub fn new(job_id: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            job_id: job_id.into(),
            index,
            total,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {} {}/{}]", self.job_id, self.index, self.total)
    }
}
