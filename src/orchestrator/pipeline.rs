//! 批量生成编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **批量前置检查**：缺少凭证是唯一会中断整批的错误，在任何调用之前检查
//! 2. **粒度选择**：逐题（每个任务每个阶段一次调用）或整批（顺序策略每阶段一次调用）
//! 3. **并发控制**：逐题模式按 `max_concurrent_jobs` 并发，结果顺序始终与输入一致
//! 4. **结果汇总**：每个任务恰好一个结果，连同阶段记录一起返回

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::{Granularity, PipelineSettings};
use crate::error::{AppError, ConfigError};
use crate::models::job::{JobSpec, Strategy};
use crate::models::result::BatchRunResult;
use crate::services::{PromptBuilder, TextGenerator};
use crate::workflow::{AbortSignal, ItemFlow, JobCtx, JobOutcome, StageRunner};

use super::sequential_batch::SequentialBatch;

/// 批量生成编排器
pub struct PipelineOrchestrator<G: TextGenerator> {
    generator: G,
    prompts: PromptBuilder,
    settings: PipelineSettings,
    abort: AbortSignal,
}

impl<G: TextGenerator> PipelineOrchestrator<G> {
    pub fn new(generator: G, prompts: PromptBuilder, settings: PipelineSettings) -> Self {
        Self {
            generator,
            prompts,
            settings,
            abort: AbortSignal::new(),
        }
    }

    /// 使用外部的取消信号
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// 运行一批任务
    ///
    /// 返回的 `results` 与 `jobs` 一一对应、顺序相同。单个任务的失败不会返回 `Err`。
    pub async fn run_batch(&self, jobs: Vec<JobSpec>, credential: &str) -> Result<BatchRunResult, AppError> {
        if credential.trim().is_empty() {
            return Err(ConfigError::MissingCredential.into());
        }

        let runner = || StageRunner::new(&self.generator, credential, &self.settings, &self.abort);

        let use_batch = self.settings.granularity == Granularity::Batch;
        let (batch_jobs, item_jobs): (Vec<usize>, Vec<usize>) = (0..jobs.len())
            .partition(|&i| use_batch && jobs[i].strategy == Strategy::Sequential);
        if use_batch && !item_jobs.is_empty() {
            warn!(
                "⚠️ 整批模式只适用于顺序策略，{} 个任务改为逐题处理",
                item_jobs.len()
            );
        }

        // (输入位置, 结果)，两种粒度的结果合并后按位置排序
        let mut outcomes: Vec<(usize, JobOutcome)> = Vec::with_capacity(jobs.len());

        if !batch_jobs.is_empty() {
            info!("📦 整批模式: {} 个任务, 3 次调用", batch_jobs.len());
            let refs: Vec<&JobSpec> = batch_jobs.iter().map(|&i| &jobs[i]).collect();
            let batch_outcomes = SequentialBatch::new(runner(), &self.prompts).run(&refs).await;
            outcomes.extend(batch_jobs.iter().copied().zip(batch_outcomes));
        }

        if !item_jobs.is_empty() {
            let flow = ItemFlow::new(runner(), &self.prompts);
            let flow = &flow;
            let total = jobs.len();
            let concurrency = self.settings.max_concurrent_jobs.max(1);
            info!("🔁 逐题模式: {} 个任务, 并发 {}", item_jobs.len(), concurrency);

            // buffered 按提交顺序产出结果
            let item_outcomes: Vec<JobOutcome> = stream::iter(item_jobs.iter().copied())
                .map(|i| {
                    let job = &jobs[i];
                    let ctx = JobCtx::new(job.job_id.clone(), i + 1, total);
                    async move { flow.run(job, &ctx).await }
                })
                .buffered(concurrency)
                .collect()
                .await;
            outcomes.extend(item_jobs.iter().copied().zip(item_outcomes));
        }

        // 两种粒度都为每个任务产出恰好一个结果
        debug_assert_eq!(outcomes.len(), jobs.len());
        outcomes.sort_by_key(|(i, _)| *i);

        let mut results = Vec::with_capacity(outcomes.len());
        let mut stage_records = Vec::new();
        for (_, outcome) in outcomes {
            results.push(outcome.result);
            stage_records.extend(outcome.records);
        }

        Ok(BatchRunResult::new(jobs, results, stage_records))
    }
}
