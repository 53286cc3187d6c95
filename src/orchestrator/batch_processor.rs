//! 批量生成入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验请求、检查凭证、加载示例题库
//! 2. **任务规划**：把批量请求展开为任务列表
//! 3. **执行**：交给 [`PipelineOrchestrator`] 处理
//! 4. **输出**：写出结果 JSON、失败记录，打印统计

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, Granularity};
use crate::error::{AppError, AppResult, ConfigError};
use crate::models::job::BatchRequest;
use crate::models::loaders::load_example_bank_or_empty;
use crate::models::result::BatchRunResult;
use crate::orchestrator::pipeline::PipelineOrchestrator;
use crate::services::{FailureWriter, JobPlanner, LlmService, PromptBuilder};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::AbortSignal;

/// 应用主结构
pub struct App {
    config: Config,
    request: BatchRequest,
    orchestrator: PipelineOrchestrator<LlmService>,
    failure_writer: FailureWriter,
}

impl App {
    /// 初始化应用
    ///
    /// 请求参数无效或缺少凭证时直接返回错误，不发出任何调用。
    pub async fn initialize(
        config: Config,
        request: BatchRequest,
        granularity: Granularity,
        abort: AbortSignal,
    ) -> AppResult<Self> {
        request.validate()?;
        if !config.has_credential() {
            return Err(ConfigError::MissingCredential.into());
        }

        log_startup(&config, &request);

        let bank = load_example_bank_or_empty(Path::new(&config.example_bank_path)).await?;
        let prompts = PromptBuilder::new(Arc::new(bank));
        let orchestrator = PipelineOrchestrator::new(
            LlmService::new(&config),
            prompts,
            config.pipeline_settings(granularity),
        )
        .with_abort(abort);
        let failure_writer = FailureWriter::with_path(config.failure_log_file.clone());

        Ok(Self {
            config,
            request,
            orchestrator,
            failure_writer,
        })
    }

    /// 运行：规划 → 生成 → 输出
    pub async fn run(&self) -> AppResult<BatchRunResult> {
        let jobs = JobPlanner::plan_seeded(&self.request, self.config.seed);
        info!("✓ 已规划 {} 个任务", jobs.len());

        let result = self
            .orchestrator
            .run_batch(jobs, &self.config.llm_api_key)
            .await?;

        self.write_output(&result)?;
        self.write_failures(&result);

        print_final_stats(
            &result.stats,
            &self.config.output_file,
            &self.config.failure_log_file,
        );
        Ok(result)
    }

    fn write_output(&self, result: &BatchRunResult) -> AppResult<()> {
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&self.config.output_file, json)
            .map_err(|e| AppError::file_write_failed(self.config.output_file.clone(), e))?;
        info!("💾 结果已写入: {}", self.config.output_file);
        Ok(())
    }

    /// 失败记录写不出来不影响本次结果
    fn write_failures(&self, result: &BatchRunResult) {
        if result.stats.failed == 0 {
            return;
        }
        if let Err(e) = self.failure_writer.init() {
            warn!("⚠️ 无法初始化失败记录文件 {}: {}", self.failure_writer.path(), e);
            return;
        }
        for failure in result.failures() {
            if let Err(e) = self.failure_writer.write(failure) {
                warn!("⚠️ 写入失败记录出错 (任务 {}): {}", failure.job_id, e);
            }
        }
    }
}
