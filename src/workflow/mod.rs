//! 流程层（Workflow）
//!
//! 定义"一个任务"的完整处理流程：阶段调用、重试、取消检查、阶段间数据传递。

pub mod abort;
pub mod item_flow;
pub mod job_ctx;
pub mod stage_runner;

pub use abort::AbortSignal;
pub use item_flow::{ItemFlow, JobOutcome};
pub use job_ctx::JobCtx;
pub use stage_runner::StageRunner;
