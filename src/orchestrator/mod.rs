//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 校验请求、加载示例题库、规划任务
//! - 写出结果和失败记录，输出全局统计
//!
//! ### `pipeline` - 批量生成编排器
//! - 缺少凭证时整批失败
//! - 逐题模式的并发控制，结果保持输入顺序
//! - 整批模式分派给 `sequential_batch`
//!
//! ### `sequential_batch` - 顺序策略整批执行
//! - 每阶段一次调用，按编号或位置把返回条目分配给任务
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (BatchRequest → Vec<JobSpec>)
//!     ↓
//! pipeline (Vec<JobSpec> → BatchRunResult)
//!     ↓                       ↓
//! workflow::ItemFlow     sequential_batch
//!     ↓                       ↓
//! services (能力层：prompt / llm / normalizer / assembler)
//! ```

pub mod batch_processor;
pub mod pipeline;
pub mod sequential_batch;

// 重新导出主要类型
pub use batch_processor::App;
pub use pipeline::PipelineOrchestrator;
pub use sequential_batch::{align_records, SequentialBatch};
