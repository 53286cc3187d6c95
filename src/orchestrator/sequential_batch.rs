//! 顺序策略的整批模式 - 编排层
//!
//! 每个阶段只调用一次生成服务，覆盖本阶段仍然存活的全部任务（共 3 次调用），
//! 让生成服务能看到整批上下文，避免批内重复。
//!
//! 失败隔离与逐题模式相同：
//! - 整次调用失败（上游错误、无法解析、找不到数组）→ 本阶段所有存活任务失败
//! - 返回条目不足 → 缺少条目的任务以 `CountMismatch` 失败，其余照常继续
//! - 单个条目字段缺失 → 只有该任务失败

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::error::GenerationError;
use crate::models::item::{DistractorSet, FinishedItem, StemClue, ValidationReport, ITEM_NUMBER};
use crate::models::job::JobSpec;
use crate::models::result::{JobFailure, PipelineResult};
use crate::models::stage::{Stage, StageOutput, StageRecord};
use crate::services::{ItemAssembler, Prompt, PromptBuilder, TextGenerator};
use crate::utils::logging::log_stage_start;
use crate::workflow::item_flow::{log_verdict, JobOutcome};
use crate::workflow::{JobCtx, StageRunner};

/// 单个任务在整批流程中的状态
struct Slot<'j> {
    job: &'j JobSpec,
    ctx: JobCtx,
    records: Vec<StageRecord>,
    failure: Option<JobFailure>,
    stem: Option<StemClue>,
    distractors: Option<DistractorSet>,
    item: Option<FinishedItem>,
}

impl Slot<'_> {
    fn fail(&mut self, stage: Stage, error: GenerationError) {
        warn!("{} ❌ 阶段 {} 失败: {}", self.ctx, stage, error);
        self.failure = Some(JobFailure::new(self.job.job_id.clone(), stage, error));
    }

    fn alive(&self) -> bool {
        self.failure.is_none()
    }
}

/// 顺序策略整批执行器
pub struct SequentialBatch<'a, G: TextGenerator + ?Sized> {
    runner: StageRunner<'a, G>,
    prompts: &'a PromptBuilder,
}

impl<'a, G: TextGenerator + ?Sized> SequentialBatch<'a, G> {
    pub fn new(runner: StageRunner<'a, G>, prompts: &'a PromptBuilder) -> Self {
        Self { runner, prompts }
    }

    /// 执行三个阶段，返回与 `jobs` 一一对应的结果
    pub async fn run(&self, jobs: &[&JobSpec]) -> Vec<JobOutcome> {
        let total = jobs.len();
        let mut slots: Vec<Slot> = jobs
            .iter()
            .copied()
            .enumerate()
            .map(|(i, job)| Slot {
                job,
                ctx: JobCtx::new(job.job_id.clone(), i + 1, total),
                records: Vec::new(),
                failure: None,
                stem: None,
                distractors: None,
                item: None,
            })
            .collect();

        // ========== 阶段 1: 题干 + 语境线索 ==========
        let alive = alive_indices(&slots);
        if !alive.is_empty() {
            let batch_jobs: Vec<&JobSpec> = alive.iter().map(|&i| slots[i].job).collect();
            let prompt = self.prompts.stem_clue_batch(&batch_jobs);
            for (i, out) in self.batch_stage(&prompt, &mut slots, &alive).await {
                let slot = &mut slots[i];
                match StemClue::from_output(&out, slot.job) {
                    Ok(stem) => slot.stem = Some(stem),
                    Err(e) => slot.fail(Stage::StemClue, e),
                }
            }
        }

        // ========== 阶段 2: 干扰项 ==========
        let alive = alive_indices(&slots);
        if !alive.is_empty() {
            let pairs: Vec<(&JobSpec, &StemClue)> = alive
                .iter()
                .filter_map(|&i| slots[i].stem.as_ref().map(|stem| (slots[i].job, stem)))
                .collect();
            let prompt = self.prompts.distractors_batch(&pairs);
            for (i, out) in self.batch_stage(&prompt, &mut slots, &alive).await {
                let slot = &mut slots[i];
                match DistractorSet::from_output(&out) {
                    Ok(set) => slot.distractors = Some(set),
                    Err(e) => slot.fail(Stage::Distractors, e),
                }
            }
        }

        // ========== 组装 ==========
        let seed = self.runner.settings().seed;
        for slot in slots.iter_mut().filter(|s| s.alive()) {
            let assembled = match (&slot.stem, &slot.distractors) {
                (Some(stem), Some(distractors)) => {
                    let mut rng = ItemAssembler::rng_for(seed, &slot.job.job_id);
                    ItemAssembler::assemble(slot.job, stem, distractors, &mut rng)
                }
                _ => Err(GenerationError::schema(&["Complete Sentence", "Distractor A"])),
            };
            match assembled {
                Ok(item) => slot.item = Some(item),
                Err(e) => slot.fail(Stage::Assembly, e),
            }
        }

        // ========== 阶段 3: 质检 ==========
        let alive = alive_indices(&slots);
        if !alive.is_empty() {
            let pairs: Vec<(&JobSpec, &FinishedItem)> = alive
                .iter()
                .filter_map(|&i| slots[i].item.as_ref().map(|item| (slots[i].job, item)))
                .collect();
            let prompt = self.prompts.validation_batch(&pairs);
            for (i, out) in self.batch_stage(&prompt, &mut slots, &alive).await {
                let slot = &mut slots[i];
                match ValidationReport::from_output(&out) {
                    Ok(report) => {
                        log_verdict(&slot.ctx, &report);
                        if let Some(item) = slot.item.as_mut() {
                            item.validation = Some(report);
                        }
                    }
                    Err(e) => slot.fail(Stage::Validation, e),
                }
            }
        }

        slots.into_iter().map(finish).collect()
    }

    /// 执行一个整批阶段，返回成功取得输出的 (位置, 输出)
    ///
    /// 失败的任务直接在 `slots` 中标记。
    async fn batch_stage(
        &self,
        prompt: &Prompt,
        slots: &mut [Slot<'_>],
        alive: &[usize],
    ) -> Vec<(usize, StageOutput)> {
        let stage = prompt.stage;
        log_stage_start(stage.label(), alive.len(), slots.len());
        let label = format!("[批次 {}]", stage);

        let records = match self.runner.call_array(&label, prompt).await {
            Ok(records) => records,
            Err(e) => {
                warn!("{} ❌ 整批调用失败: {}", label, e);
                for &i in alive {
                    slots[i].fail(stage, e.clone());
                }
                return Vec::new();
            }
        };

        let job_ids: Vec<&str> = alive.iter().map(|&i| slots[i].job.job_id.as_str()).collect();
        let returned = records.len();
        let aligned = align_records(records, &job_ids);
        if returned != alive.len() {
            warn!(
                "{} ⚠️ 返回条目数量不符: 期望 {}, 实际 {}",
                label,
                alive.len(),
                returned
            );
        }

        let mut outputs = Vec::new();
        for (&i, record) in alive.iter().zip(aligned) {
            let slot = &mut slots[i];
            let Some(value) = record else {
                slot.fail(
                    stage,
                    GenerationError::CountMismatch {
                        expected: alive.len(),
                        actual: returned,
                    },
                );
                continue;
            };
            match StageOutput::from_value(value) {
                Ok(out) => {
                    slot.records.push(StageRecord {
                        job_id: slot.job.job_id.clone(),
                        stage,
                        output: out.clone(),
                    });
                    outputs.push((i, out));
                }
                Err(e) => slot.fail(stage, e),
            }
        }
        info!("{} ✓ 取得 {}/{} 个条目", label, outputs.len(), alive.len());
        outputs
    }
}

fn alive_indices(slots: &[Slot<'_>]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.alive())
        .map(|(i, _)| i)
        .collect()
}

fn finish(slot: Slot<'_>) -> JobOutcome {
    let result = match (slot.failure, slot.item) {
        (Some(failure), _) => PipelineResult::Failure(failure),
        (None, Some(item)) => PipelineResult::Success(item),
        (None, None) => PipelineResult::Failure(JobFailure::new(
            slot.job.job_id.clone(),
            Stage::Assembly,
            GenerationError::schema(&["Complete Sentence"]),
        )),
    };
    JobOutcome {
        result,
        records: slot.records,
    }
}

/// 把整批返回的条目分配给任务
///
/// 1. 带有本批任务编号、且该任务尚未分到条目的，按编号分配
/// 2. 其余条目（没有编号、编号未知或重复）按顺序填入还空着的任务
///
/// 已有条目按编号匹配、而剩余条目少于空着的任务时，无法判断剩余条目属于谁，
/// 这些条目被丢弃，空着的任务得到 `None`。多余的条目同样被丢弃。
pub fn align_records(records: Vec<JsonValue>, job_ids: &[&str]) -> Vec<Option<JsonValue>> {
    let mut aligned: Vec<Option<JsonValue>> = vec![None; job_ids.len()];
    let mut unmatched = Vec::new();
    for record in records {
        let pos = item_number(&record).and_then(|n| job_ids.iter().position(|id| *id == n));
        match pos {
            Some(pos) if aligned[pos].is_none() => aligned[pos] = Some(record),
            _ => unmatched.push(record),
        }
    }
    if unmatched.is_empty() {
        return aligned;
    }

    let open: Vec<usize> = (0..job_ids.len()).filter(|&i| aligned[i].is_none()).collect();
    let matched_by_id = open.len() < job_ids.len();
    if matched_by_id && unmatched.len() < open.len() {
        warn!(
            "⚠️ {} 个条目没有可用的编号，无法确定归属，已丢弃",
            unmatched.len()
        );
        return aligned;
    }
    if unmatched.len() > open.len() {
        warn!(
            "⚠️ 返回了多余的条目 ({} > {})，多余部分被丢弃",
            unmatched.len(),
            open.len()
        );
    }
    for (pos, record) in open.into_iter().zip(unmatched) {
        aligned[pos] = Some(record);
    }
    aligned
}

fn item_number(record: &JsonValue) -> Option<String> {
    match record.get(ITEM_NUMBER)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
