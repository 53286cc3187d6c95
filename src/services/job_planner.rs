//! 任务规划服务 - 业务能力层
//!
//! 把一次批量请求展开为独立的任务列表，并为每个任务分配不同的主题和风格，
//! 避免生成服务反复写出相似的句子。纯数据构造，不访问网络，不会失败。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::models::job::{compose_context, split_context, BatchRequest, JobSpec};

/// 风格提示（短句的语体 / 体裁）
pub const STYLE_PALETTE: [&str; 8] = [
    "a simple fact",
    "a polite suggestion",
    "a common phrase",
    "a cause and effect statement",
    "a short dialogue line",
    "a general observation",
    "a brief instruction",
    "a personal opinion",
];

/// 用户未指定主题时轮换使用的语义领域
pub const DOMAIN_PALETTE: [&str; 12] = [
    "Health & Fitness",
    "Technology & Computers",
    "Cooking & Food",
    "Money & Shopping",
    "Daily Routine",
    "Art & Music",
    "Weather & Nature",
    "Work & Jobs",
    "Education & Learning",
    "Transport & Cities",
    "Family & Relationships",
    "Current Events",
];

/// 任务规划服务
pub struct JobPlanner;

impl JobPlanner {
    /// 使用给定的随机源规划任务
    ///
    /// 每个任务依次抽取考查点（可重复）和风格；主题优先使用用户指定的，
    /// 否则按序号在 [`DOMAIN_PALETTE`] 中轮换。
    ///
    /// 前置条件（数量 ≥ 1、至少一个非空考查点）由调用方通过
    /// [`BatchRequest::validate`] 保证。
    pub fn plan<R: Rng + ?Sized>(request: &BatchRequest, rng: &mut R) -> Vec<JobSpec> {
        let focus_choices: Vec<&str> = request
            .focus_choices
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();

        // 用户主题中如果已经带了风格标注，只保留主题部分
        let explicit_topic = request.explicit_topic().map(|t| split_context(t).0);

        (0..request.count)
            .map(|i| {
                let focus = focus_choices.choose(&mut *rng).copied().unwrap_or_default();
                let style = STYLE_PALETTE.choose(&mut *rng).copied().unwrap_or(STYLE_PALETTE[0]);
                let topic = match &explicit_topic {
                    Some(topic) => topic.as_str(),
                    None => DOMAIN_PALETTE[i % DOMAIN_PALETTE.len()],
                };

                let job = JobSpec {
                    job_id: format!("{}{}-{}", request.question_type.initial(), request.level, i + 1),
                    question_type: request.question_type,
                    level: request.level,
                    focus: focus.to_string(),
                    context: compose_context(topic, style),
                    strategy: request.strategy,
                };
                debug!("[任务 {}] 规划完成: {} | {}", job.job_id, job.focus, job.context);
                job
            })
            .collect()
    }

    /// 使用种子规划；未提供种子时使用系统熵
    pub fn plan_seeded(request: &BatchRequest, seed: Option<u64>) -> Vec<JobSpec> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::plan(request, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{CefrLevel, QuestionType, Strategy};

    fn request(count: usize, topic: Option<&str>) -> BatchRequest {
        BatchRequest {
            count,
            question_type: QuestionType::Grammar,
            level: CefrLevel::B1,
            focus_choices: vec!["A".to_string(), "B".to_string()],
            topic_hint: topic.map(String::from),
            strategy: Strategy::Sequential,
        }
    }

    #[test]
    fn test_plan_without_topic_rotates_domains() {
        let jobs = JobPlanner::plan_seeded(&request(3, Some("")), Some(42));
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].topic(), DOMAIN_PALETTE[0]);
        assert_eq!(jobs[1].topic(), DOMAIN_PALETTE[1]);
        assert_ne!(jobs[0].topic(), jobs[1].topic());
        assert!(jobs.iter().all(|j| j.focus == "A" || j.focus == "B"));
    }

    #[test]
    fn test_plan_cycles_domains_when_exhausted() {
        let jobs = JobPlanner::plan_seeded(&request(DOMAIN_PALETTE.len() + 1, None), Some(1));
        assert_eq!(jobs[DOMAIN_PALETTE.len()].topic(), DOMAIN_PALETTE[0]);
    }

    #[test]
    fn test_plan_uses_explicit_topic_and_still_varies_style() {
        let jobs = JobPlanner::plan_seeded(&request(20, Some("  Football ")), Some(9));
        assert!(jobs.iter().all(|j| j.topic() == "Football"));
        assert!(jobs.iter().all(|j| STYLE_PALETTE.contains(&j.style().as_str())));
        let first_style = jobs[0].style();
        assert!(jobs.iter().any(|j| j.style() != first_style));
    }

    #[test]
    fn test_plan_is_deterministic_under_seed() {
        let a = JobPlanner::plan_seeded(&request(10, None), Some(2024));
        let b = JobPlanner::plan_seeded(&request(10, None), Some(2024));
        assert_eq!(a, b);
    }

    #[test]
    fn test_job_ids_follow_type_level_index() {
        let mut req = request(2, None);
        req.question_type = QuestionType::Vocabulary;
        req.level = CefrLevel::C1;
        let ids: Vec<String> = JobPlanner::plan_seeded(&req, Some(0))
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(ids, vec!["VC1-1", "VC1-2"]);
    }

    #[test]
    fn test_plan_ignores_blank_focus_choices() {
        let mut req = request(5, None);
        req.focus_choices = vec!["  ".to_string(), "Only".to_string()];
        let jobs = JobPlanner::plan_seeded(&req, Some(3));
        assert!(jobs.iter().all(|j| j.focus == "Only"));
    }
}
