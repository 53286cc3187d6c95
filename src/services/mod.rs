//! 业务能力层（Services）
//!
//! 每个服务描述"我能做什么"，只处理单个任务或单次调用，不关心流程顺序。

pub mod failure_writer;
pub mod fakes;
pub mod item_assembler;
pub mod job_planner;
pub mod llm_service;
pub mod prompt_builder;
pub mod response_normalizer;

pub use failure_writer::FailureWriter;
pub use item_assembler::ItemAssembler;
pub use job_planner::JobPlanner;
pub use llm_service::{LlmService, Prompt, TextGenerator, ERROR_PREFIX};
pub use prompt_builder::PromptBuilder;
pub use response_normalizer::ResponseNormalizer;
