//! 单个任务的处理流程 - 流程层
//!
//! 核心职责：定义"一个任务"的完整处理流程
//!
//! 流程顺序（按策略）：
//! 1. Holistic：整体生成 → 转换为题目
//! 2. Segmented：选项 → 题干（围绕已确定的选项）
//! 3. Sequential：题干+线索 → 干扰项 → 组装 → 质检
//!
//! 某一阶段失败后，后续阶段不再执行，失败只影响当前任务。

use tracing::{debug, error, info, warn};

use crate::error::GenerationError;
use crate::models::item::{DistractorSet, FinishedItem, OptionSet, StemClue, ValidationReport, Verdict};
use crate::models::job::{JobSpec, Strategy};
use crate::models::result::{JobFailure, PipelineResult};
use crate::models::stage::{Stage, StageOutput, StageRecord};
use crate::services::{ItemAssembler, Prompt, PromptBuilder, TextGenerator};
use crate::workflow::job_ctx::JobCtx;
use crate::workflow::stage_runner::StageRunner;

/// 单个任务的处理结果：最终结果 + 审计用的阶段记录
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub result: PipelineResult,
    pub records: Vec<StageRecord>,
}

/// 单个任务的处理流程
///
/// - 决定调用哪些阶段、以什么顺序
/// - 把前一阶段的结构化输出交给下一阶段
/// - 不持有资源，只依赖业务能力（services）
pub struct ItemFlow<'a, G: TextGenerator + ?Sized> {
    runner: StageRunner<'a, G>,
    prompts: &'a PromptBuilder,
}

impl<'a, G: TextGenerator + ?Sized> ItemFlow<'a, G> {
    pub fn new(runner: StageRunner<'a, G>, prompts: &'a PromptBuilder) -> Self {
        Self { runner, prompts }
    }

    pub async fn run(&self, job: &JobSpec, ctx: &JobCtx) -> JobOutcome {
        info!("{} ▶ 开始 ({:?}) | {} | {}", ctx, job.strategy, job.focus, job.context);

        let mut records = Vec::new();
        let outcome = match job.strategy {
            Strategy::Holistic => self.run_holistic(job, ctx, &mut records).await,
            Strategy::Segmented => self.run_segmented(job, ctx, &mut records).await,
            Strategy::Sequential => self.run_sequential(job, ctx, &mut records).await,
        };

        let result = match outcome {
            Ok(item) => {
                if item.needs_revision() {
                    info!("{} ✓ 完成（质检建议修改）", ctx);
                } else {
                    info!("{} ✅ 完成", ctx);
                }
                PipelineResult::Success(item)
            }
            Err(failure) => {
                error!(
                    "{} ❌ 阶段 {} 失败: {}",
                    ctx, failure.stage, failure.error
                );
                PipelineResult::Failure(failure)
            }
        };
        JobOutcome { result, records }
    }

    async fn run_holistic(
        &self,
        job: &JobSpec,
        ctx: &JobCtx,
        records: &mut Vec<StageRecord>,
    ) -> Result<FinishedItem, JobFailure> {
        let prompt = self.prompts.holistic(job);
        let out = self.stage(job, ctx, &prompt, records).await?;
        ItemAssembler::from_final_output(&out, job, None).map_err(fail(job, Stage::Holistic))
    }

    async fn run_segmented(
        &self,
        job: &JobSpec,
        ctx: &JobCtx,
        records: &mut Vec<StageRecord>,
    ) -> Result<FinishedItem, JobFailure> {
        let prompt = self.prompts.options(job);
        let out = self.stage(job, ctx, &prompt, records).await?;
        let options = OptionSet::from_output(&out).map_err(fail(job, Stage::Options))?;
        debug!("{} 选项已确定, 正确选项: {}", ctx, options.correct);

        let prompt = self.prompts.stem(job, &options);
        let out = self.stage(job, ctx, &prompt, records).await?;
        ItemAssembler::from_final_output(&out, job, Some(&options)).map_err(fail(job, Stage::Stem))
    }

    async fn run_sequential(
        &self,
        job: &JobSpec,
        ctx: &JobCtx,
        records: &mut Vec<StageRecord>,
    ) -> Result<FinishedItem, JobFailure> {
        // ========== 阶段 1: 题干 + 语境线索 ==========
        let prompt = self.prompts.stem_clue(job);
        let out = self.stage(job, ctx, &prompt, records).await?;
        let stem = StemClue::from_output(&out, job).map_err(fail(job, Stage::StemClue))?;

        // ========== 阶段 2: 干扰项 ==========
        let prompt = self.prompts.distractors(job, &stem);
        let out = self.stage(job, ctx, &prompt, records).await?;
        let distractors = DistractorSet::from_output(&out).map_err(fail(job, Stage::Distractors))?;

        // ========== 组装 ==========
        let mut rng = ItemAssembler::rng_for(self.runner.settings().seed, &job.job_id);
        let mut item = ItemAssembler::assemble(job, &stem, &distractors, &mut rng)
            .map_err(fail(job, Stage::Assembly))?;

        // ========== 阶段 3: 质检 ==========
        let prompt = self.prompts.validation(job, &item);
        let out = self.stage(job, ctx, &prompt, records).await?;
        let report = ValidationReport::from_output(&out).map_err(fail(job, Stage::Validation))?;
        log_verdict(ctx, &report);

        item.validation = Some(report);
        Ok(item)
    }

    /// 调用一个阶段并记录输出
    async fn stage(
        &self,
        job: &JobSpec,
        ctx: &JobCtx,
        prompt: &Prompt,
        records: &mut Vec<StageRecord>,
    ) -> Result<StageOutput, JobFailure> {
        let label = ctx.to_string();
        let out = self
            .runner
            .call_object(&label, prompt)
            .await
            .map_err(fail(job, prompt.stage))?;
        debug!("{} ✓ 阶段 {} 输出字段: {:?}", ctx, prompt.stage, out.keys());
        records.push(StageRecord {
            job_id: job.job_id.clone(),
            stage: prompt.stage,
            output: out.clone(),
        });
        Ok(out)
    }
}

fn fail(job: &JobSpec, stage: Stage) -> impl FnOnce(GenerationError) -> JobFailure + '_ {
    move |error| JobFailure::new(job.job_id.clone(), stage, error)
}

pub(crate) fn log_verdict(ctx: &impl std::fmt::Display, report: &ValidationReport) {
    match report.verdict {
        Verdict::Pass => debug!("{} 质检通过", ctx),
        Verdict::RequiresRevision => warn!(
            "{} 📝 质检建议修改: {}",
            ctx,
            report
                .revision_recommendations
                .as_deref()
                .unwrap_or("（无具体建议）")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::models::job::{CefrLevel, QuestionType};
    use crate::services::fakes::ScriptedGenerator;
    use crate::workflow::abort::AbortSignal;

    fn job(strategy: Strategy) -> JobSpec {
        JobSpec {
            job_id: "GB1-1".to_string(),
            question_type: QuestionType::Grammar,
            level: CefrLevel::B1,
            focus: "Present Perfect".to_string(),
            context: "Daily Routine (Style: a simple fact)".to_string(),
            strategy,
        }
    }

    fn sequential_responder(prompt: &Prompt) -> String {
        match prompt.stage {
            Stage::StemClue => r#"```json
{"Complete Sentence": "I have lived here for five years.", "Correct Answer": "have lived"}
```"#
                .to_string(),
            Stage::Distractors => {
                r#"{"Distractor A": "lived", "Distractor B": "am living", "Distractor C": "live"}"#.to_string()
            }
            Stage::Validation => r#"{"Overall Quality": "Pass"}"#.to_string(),
            _ => "Error: unexpected stage".to_string(),
        }
    }

    async fn run(generator: &ScriptedGenerator, job: &JobSpec) -> JobOutcome {
        let settings = PipelineSettings {
            seed: Some(11),
            ..PipelineSettings::default()
        };
        let abort = AbortSignal::new();
        let prompts = PromptBuilder::default();
        let runner = StageRunner::new(generator, "key", &settings, &abort);
        ItemFlow::new(runner, &prompts)
            .run(job, &JobCtx::new(job.job_id.clone(), 1, 1))
            .await
    }

    #[tokio::test]
    async fn test_sequential_success_records_three_stages() {
        let generator = ScriptedGenerator::from_fn(sequential_responder);
        let outcome = run(&generator, &job(Strategy::Sequential)).await;
        let item = match outcome.result {
            PipelineResult::Success(item) => item,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(item.question_prompt, "I ____ here for five years.");
        assert_eq!(item.correct_answer(), "have lived");
        assert_eq!(item.validation.map(|v| v.verdict), Some(Verdict::Pass));
        let stages: Vec<Stage> = outcome.records.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![Stage::StemClue, Stage::Distractors, Stage::Validation]);
    }

    #[tokio::test]
    async fn test_sequential_stage2_schema_violation_stops_pipeline() {
        let generator = ScriptedGenerator::from_fn(|p| match p.stage {
            Stage::Distractors => r#"{"Distractor A": "lived"}"#.to_string(),
            _ => sequential_responder(p),
        });
        let outcome = run(&generator, &job(Strategy::Sequential)).await;
        match outcome.result {
            PipelineResult::Failure(f) => {
                assert_eq!(f.stage, Stage::Distractors);
                assert_eq!(f.error.kind(), "SchemaViolation");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(generator.calls_for("GB1-1", Stage::Validation), 0);
    }

    #[tokio::test]
    async fn test_sequential_answer_missing_from_sentence_fails_assembly() {
        let generator = ScriptedGenerator::from_fn(|p| match p.stage {
            Stage::StemClue => {
                r#"{"Complete Sentence": "I have lived here.", "Correct Answer": "Have lived"}"#.to_string()
            }
            _ => sequential_responder(p),
        });
        let outcome = run(&generator, &job(Strategy::Sequential)).await;
        match outcome.result {
            PipelineResult::Failure(f) => {
                assert_eq!(f.stage, Stage::Assembly);
                assert_eq!(f.error.kind(), "CorrectAnswerNotFound");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(generator.calls_for("GB1-1", Stage::Validation), 0);
    }

    #[tokio::test]
    async fn test_segmented_options_failure_skips_stem() {
        let generator = ScriptedGenerator::from_fn(|_| "".to_string());
        let outcome = run(&generator, &job(Strategy::Segmented)).await;
        match outcome.result {
            PipelineResult::Failure(f) => {
                assert_eq!(f.stage, Stage::Options);
                assert_eq!(f.error, GenerationError::EmptyResponse);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(generator.calls_for("GB1-1", Stage::Stem), 0);
    }

    #[tokio::test]
    async fn test_holistic_single_call() {
        let generator = ScriptedGenerator::from_fn(|_| {
            r#"{"questions": "ignored", "Question Prompt": "They ____ tennis every Sunday.",
                "Answer A": "plays", "Answer B": "play", "Answer C": "playing", "Answer D": "played",
                "Correct Answer": "B"}"#
                .to_string()
        });
        let outcome = run(&generator, &job(Strategy::Holistic)).await;
        assert!(outcome.result.is_success());
        assert_eq!(generator.call_count(), 1);
    }
}
