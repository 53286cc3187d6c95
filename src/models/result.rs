//! 单个任务与整批的运行结果

use chrono::{DateTime, Local};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::GenerationError;
use crate::models::item::FinishedItem;
use crate::models::job::JobSpec;
use crate::models::stage::{Stage, StageRecord};

/// 任务失败记录：在哪个任务、哪个阶段、因为什么失败
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub job_id: String,
    pub stage: Stage,
    pub error: GenerationError,
}

impl JobFailure {
    pub fn new(job_id: impl Into<String>, stage: Stage, error: GenerationError) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            error,
        }
    }
}

// 导出时只包含面向用户的信息，原始输出只进失败日志
impl Serialize for JobFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("JobFailure", 4)?;
        state.serialize_field("job_id", &self.job_id)?;
        state.serialize_field("stage", &self.stage)?;
        state.serialize_field("kind", self.error.kind())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

/// 单个任务的最终结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PipelineResult {
    Success(FinishedItem),
    Failure(JobFailure),
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }

    pub fn job_id(&self) -> &str {
        match self {
            PipelineResult::Success(item) => &item.item_id,
            PipelineResult::Failure(failure) => &failure.job_id,
        }
    }
}

/// 整批统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 成功但质检结论为 "Requires Revision" 的题目数
    pub needs_revision: usize,
}

/// 一次批量运行的完整结果
///
/// `results` 与 `jobs` 一一对应且顺序相同。`stage_records` 保存顺序策略
/// 各阶段的结构化输出，供审阅和人工修改。
#[derive(Debug, Clone, Serialize)]
pub struct BatchRunResult {
    pub generated_at: DateTime<Local>,
    pub jobs: Vec<JobSpec>,
    pub results: Vec<PipelineResult>,
    pub stage_records: Vec<StageRecord>,
    pub stats: BatchStats,
}

impl BatchRunResult {
    pub fn new(jobs: Vec<JobSpec>, results: Vec<PipelineResult>, stage_records: Vec<StageRecord>) -> Self {
        let stats = compute_stats(&results);
        Self {
            generated_at: Local::now(),
            jobs,
            results,
            stage_records,
            stats,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &FinishedItem> {
        self.results.iter().filter_map(|r| match r {
            PipelineResult::Success(item) => Some(item),
            PipelineResult::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.results.iter().filter_map(|r| match r {
            PipelineResult::Failure(failure) => Some(failure),
            PipelineResult::Success(_) => None,
        })
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// 某个任务的阶段记录（按产生顺序）
    pub fn records_for<'a>(&'a self, job_id: &'a str) -> impl Iterator<Item = &'a StageRecord> + 'a {
        self.stage_records.iter().filter(move |r| r.job_id == job_id)
    }
}

fn compute_stats(results: &[PipelineResult]) -> BatchStats {
    let mut stats = BatchStats {
        total: results.len(),
        ..Default::default()
    };
    for result in results {
        match result {
            PipelineResult::Success(item) => {
                stats.succeeded += 1;
                if item.needs_revision() {
                    stats.needs_revision += 1;
                }
            }
            PipelineResult::Failure(_) => stats.failed += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{OptionLetter, ValidationReport, Verdict};

    fn item(id: &str, verdict: Option<Verdict>) -> FinishedItem {
        FinishedItem {
            item_id: id.to_string(),
            assessment_focus: "Articles".to_string(),
            question_prompt: "She is ____ engineer.".to_string(),
            options: ["an", "a", "the", "one"].map(String::from),
            correct_letter: OptionLetter::A,
            level: "A2".to_string(),
            category: "Grammar".to_string(),
            context_clue: None,
            validation: verdict.map(|verdict| ValidationReport {
                verdict,
                ambiguity_issues: vec![],
                context_clue_assessment: None,
                other_issues: vec![],
                cross_question_issues: vec![],
                revision_recommendations: None,
            }),
        }
    }

    #[test]
    fn test_stats_count_revision_as_success() {
        let results = vec![
            PipelineResult::Success(item("GA2-1", Some(Verdict::Pass))),
            PipelineResult::Success(item("GA2-2", Some(Verdict::RequiresRevision))),
            PipelineResult::Failure(JobFailure::new("GA2-3", Stage::StemClue, GenerationError::EmptyResponse)),
        ];
        let run = BatchRunResult::new(vec![], results, vec![]);
        assert_eq!(
            run.stats(),
            BatchStats {
                total: 3,
                succeeded: 2,
                failed: 1,
                needs_revision: 1
            }
        );
        assert_eq!(run.items().count(), 2);
        assert_eq!(run.failures().next().map(|f| f.job_id.as_str()), Some("GA2-3"));
    }

    #[test]
    fn test_failure_export_omits_raw_text() {
        let failure = JobFailure::new(
            "GB1-1",
            Stage::Distractors,
            GenerationError::MalformedOutput {
                raw: "secret prose".to_string(),
            },
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "stage2");
        assert_eq!(json["kind"], "MalformedOutput");
        assert!(!json.to_string().contains("secret prose"));
    }
}
