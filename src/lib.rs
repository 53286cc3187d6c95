//! # Item Forge
//!
//! 基于大模型的英语单选题（语法 / 词汇）批量生成工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 任务、阶段输出、成品题目、批量结果、示例题库
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个任务或单次调用
//! - `JobPlanner` - 把批量请求展开为任务列表
//! - `PromptBuilder` - 构建各阶段提示词
//! - `LlmService` - 调用生成服务（实现 `TextGenerator`）
//! - `ResponseNormalizer` - 把原始文本归一化为 JSON
//! - `ItemAssembler` - 挖空、打乱选项、组装成品题目
//! - `FailureWriter` - 写失败记录能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `JobCtx` - 上下文封装（任务 ID + 位置）
//! - `StageRunner` - 单次阶段调用（取消检查、重试、归一化）
//! - `ItemFlow` - 按策略执行各阶段
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 批量编排，并发控制与粒度选择
//! - `orchestrator/sequential_batch` - 顺序策略整批模式
//! - `orchestrator/batch_processor` - 应用入口，规划与输出
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Granularity, PipelineSettings};
pub use error::{AppError, AppResult, GenerationError};
pub use models::{BatchRequest, BatchRunResult, FinishedItem, JobSpec, PipelineResult};
pub use orchestrator::{App, PipelineOrchestrator};
pub use services::TextGenerator;
pub use workflow::{AbortSignal, ItemFlow, JobCtx};
