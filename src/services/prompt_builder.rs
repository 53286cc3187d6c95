//! 提示词构建服务 - 业务能力层
//!
//! 根据任务和前序阶段的结构化输出生成提示词。提示词内容只需满足
//! 输出字段约定（见 `models::item` 中的字段常量），流程层不关心具体措辞。

use serde_json::json;
use std::sync::Arc;

use crate::models::example_bank::ExampleBank;
use crate::models::item::{DistractorSet, FinishedItem, OptionSet, StemClue};
use crate::models::job::JobSpec;
use crate::models::stage::Stage;
use crate::services::llm_service::Prompt;

const JSON_ONLY: &str = "Respond with a single valid JSON value and nothing else.";

/// 所有出题提示词共用的写作规则
const ITEM_RULES: &str = "\
- Keep the prompt to one or two sentences with no preamble.
- Do not use grammar terminology in the prompt.
- Do not repeat the answer word (or its root) elsewhere in the prompt.
- Every option is at most three words and all options share one grammatical form.
- Exactly one option may fit; the sentence must contain a clue that rules out the others.";

/// 提示词构建服务
///
/// 持有只读的示例题库，可在并发任务间共享。
#[derive(Clone, Default)]
pub struct PromptBuilder {
    bank: Arc<ExampleBank>,
}

impl PromptBuilder {
    pub fn new(bank: Arc<ExampleBank>) -> Self {
        Self { bank }
    }

    /// 整体策略：一次生成完整题目
    pub fn holistic(&self, job: &JobSpec) -> Prompt {
        let user = format!(
            "Write one {level} {category} multiple-choice item.\n\
             Focus: {focus}\nTopic: {topic}\nWrite it as {style}.\n\n\
             Rules:\n{rules}\n\n\
             Return this object:\n{format}\n{examples}",
            level = job.level,
            category = job.question_type,
            focus = job.focus,
            topic = job.topic(),
            style = job.style(),
            rules = ITEM_RULES,
            format = final_item_format(job),
            examples = self.examples_block(job),
        );
        single(Stage::Holistic, job, "You write English test items for language learners.", user)
    }

    /// 分段策略 A：先生成四个选项
    pub fn options(&self, job: &JobSpec) -> Prompt {
        let format = json!({
            "Answer A": "...",
            "Answer B": "...",
            "Answer C": "...",
            "Answer D": "...",
            "Correct Answer": "A/B/C/D"
        });
        let user = format!(
            "Propose four answer options for a {level} {category} item.\n\
             Focus: {focus}\nTopic: {topic}\n\n\
             Options are at most three words, parallel in form, and the three wrong ones \
             are mistakes a {level} learner would plausibly make. Mark which letter is correct.\n\n\
             Return this object:\n{format}\n{examples}",
            level = job.level,
            category = job.question_type,
            focus = job.focus,
            topic = job.topic(),
            format = pretty(&format),
            examples = self.examples_block(job),
        );
        single(Stage::Options, job, "You design answer options for English tests.", user)
    }

    /// 分段策略 B：围绕已确定的选项写题干
    pub fn stem(&self, job: &JobSpec, options: &OptionSet) -> Prompt {
        let user = format!(
            "These options are fixed:\n{options}\n\n\
             Write a {level} sentence with a gap where only the marked option fits. \
             Write it as {style}.\n\nRules:\n{rules}\n\n\
             Return this object (copy the options unchanged):\n{format}",
            options = options.to_prompt_json(),
            level = job.level,
            style = job.style(),
            rules = ITEM_RULES,
            format = final_item_format(job),
        );
        single(Stage::Stem, job, "You write English test sentences around given options.", user)
    }

    /// 顺序策略 1：完整句子 + 正确答案 + 语境线索
    pub fn stem_clue(&self, job: &JobSpec) -> Prompt {
        let user = format!(
            "Write one complete {level} sentence that tests: {focus}\n\
             Topic: {topic}\nWrite it as {style}.\n\n\
             Show the correct answer inside the sentence, and point to the words that \
             make every alternative impossible.\n\n\
             Return this object:\n{format}\n{examples}",
            level = job.level,
            focus = job.focus,
            topic = job.topic(),
            style = job.style(),
            format = pretty(&stem_clue_format(job)),
            examples = self.examples_block(job),
        );
        single(Stage::StemClue, job, "You write English test sentences with built-in context clues.", user)
    }

    /// 顺序策略 2：干扰项
    pub fn distractors(&self, job: &JobSpec, stem: &StemClue) -> Prompt {
        let user = format!(
            "Sentence and answer from the previous step:\n{stem}\n\n{rules}\n\n\
             Return this object:\n{format}",
            stem = to_json(stem),
            rules = distractor_rules(),
            format = pretty(&distractor_format(&job.job_id)),
        );
        single(Stage::Distractors, job, "You write distractors for English test items.", user)
    }

    /// 顺序策略 3：独立质检
    pub fn validation(&self, job: &JobSpec, item: &FinishedItem) -> Prompt {
        let user = format!(
            "Review this item as an independent reviewer:\n{item}\n\n{checks}\n\n\
             Return this object:\n{format}",
            item = pretty(&review_view(item)),
            checks = validation_checks(false),
            format = pretty(&validation_format(&job.job_id)),
        );
        single(Stage::Validation, job, "You review English test items for quality problems.", user)
    }

    // ========== 整批模式 ==========

    /// 整批阶段 1
    pub fn stem_clue_batch(&self, jobs: &[&JobSpec]) -> Prompt {
        let specs: Vec<_> = jobs
            .iter()
            .map(|job| {
                json!({
                    "Item Number": job.job_id,
                    "Assessment Focus": job.focus,
                    "CEFR rating": job.level.label(),
                    "Category": job.question_type.label(),
                    "Topic": job.topic(),
                    "Style": job.style(),
                })
            })
            .collect();
        let examples = jobs.first().map(|job| self.examples_block(job)).unwrap_or_default();
        let user = format!(
            "Write {n} complete sentences, one per item brief below. Show the correct answer \
             inside each sentence and point to the words that rule out every alternative. \
             Vary sentence openings and situations across the batch.\n\n\
             Item briefs:\n{specs}\n\n\
             Return {{\"questions\": [...]}} with exactly {n} objects shaped like:\n{format}\n{examples}",
            n = jobs.len(),
            specs = pretty(&json!(specs)),
            format = pretty(&stem_clue_format_generic()),
            examples = examples,
        );
        batch(Stage::StemClue, jobs, "You write batches of English test sentences.", user)
    }

    /// 整批阶段 2
    pub fn distractors_batch(&self, pairs: &[(&JobSpec, &StemClue)]) -> Prompt {
        let stems: Vec<&StemClue> = pairs.iter().map(|(_, stem)| *stem).collect();
        let jobs: Vec<&JobSpec> = pairs.iter().map(|(job, _)| *job).collect();
        let user = format!(
            "Sentences and answers from the previous step:\n{stems}\n\n{rules}\n\
             - Do not reuse the same distractor words across items in this batch.\n\n\
             Return {{\"distractors\": [...]}} with exactly {n} objects shaped like:\n{format}",
            stems = to_json(&stems),
            rules = distractor_rules(),
            n = pairs.len(),
            format = pretty(&distractor_format("...")),
        );
        batch(Stage::Distractors, &jobs, "You write distractors for batches of English test items.", user)
    }

    /// 整批阶段 3
    pub fn validation_batch(&self, pairs: &[(&JobSpec, &FinishedItem)]) -> Prompt {
        let items: Vec<_> = pairs.iter().map(|(_, item)| review_view(item)).collect();
        let jobs: Vec<&JobSpec> = pairs.iter().map(|(job, _)| *job).collect();
        let user = format!(
            "Review these {n} items as an independent reviewer:\n{items}\n\n{checks}\n\n\
             Return {{\"validations\": [...]}} with exactly {n} objects shaped like:\n{format}",
            n = pairs.len(),
            items = pretty(&json!(items)),
            checks = validation_checks(true),
            format = pretty(&validation_format("...")),
        );
        batch(Stage::Validation, &jobs, "You review batches of English test items.", user)
    }

    fn examples_block(&self, job: &JobSpec) -> String {
        let rows = self.bank.few_shot(job.question_type, job.level, &job.job_id);
        if rows.is_empty() {
            return String::new();
        }
        let mut block = String::from("\nMatch the register of these reference items:\n");
        for row in rows {
            block.push_str(&row.to_prompt_json());
            block.push('\n');
        }
        block
    }
}

fn single(stage: Stage, job: &JobSpec, system: &str, user: String) -> Prompt {
    Prompt {
        stage,
        job_ids: vec![job.job_id.clone()],
        system: format!("{} {}", system, JSON_ONLY),
        user,
    }
}

fn batch(stage: Stage, jobs: &[&JobSpec], system: &str, user: String) -> Prompt {
    Prompt {
        stage,
        job_ids: jobs.iter().map(|job| job.job_id.clone()).collect(),
        system: format!("{} {}", system, JSON_ONLY),
        user,
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn final_item_format(job: &JobSpec) -> String {
    pretty(&json!({
        "Item Number": job.job_id,
        "Assessment Focus": job.focus,
        "Question Prompt": "... ____ ...",
        "Answer A": "...",
        "Answer B": "...",
        "Answer C": "...",
        "Answer D": "...",
        "Correct Answer": "A/B/C/D",
        "CEFR rating": job.level.label(),
        "Category": job.question_type.label(),
    }))
}

fn stem_clue_format(job: &JobSpec) -> serde_json::Value {
    json!({
        "Item Number": job.job_id,
        "Assessment Focus": job.focus,
        "Complete Sentence": "...",
        "Correct Answer": "...",
        "Context Clue Location": "...",
        "Context Clue Explanation": "...",
        "CEFR rating": job.level.label(),
        "Category": job.question_type.label(),
    })
}

fn stem_clue_format_generic() -> serde_json::Value {
    json!({
        "Item Number": "copied from the item brief",
        "Assessment Focus": "...",
        "Complete Sentence": "...",
        "Correct Answer": "...",
        "Context Clue Location": "...",
        "Context Clue Explanation": "...",
        "CEFR rating": "...",
        "Category": "..."
    })
}

fn distractor_rules() -> &'static str {
    "Rules:\n\
     - Three distractors, each at most three words.\n\
     - Same grammatical form as the correct answer.\n\
     - Each one is ruled out by the context clue; say how.\n\
     - Use errors a learner at this level would really make.\n\
     - Do not use the correct answer word or its root."
}

fn distractor_format(item_number: &str) -> serde_json::Value {
    json!({
        "Item Number": item_number,
        "Distractor A": "...",
        "Why A is Wrong": "...",
        "Distractor B": "...",
        "Why B is Wrong": "...",
        "Distractor C": "...",
        "Why C is Wrong": "..."
    })
}

fn validation_checks(cross_item: bool) -> String {
    let mut checks = String::from(
        "Check:\n\
         - Could a competent learner defend any distractor?\n\
         - Does the clue really exclude every distractor?\n\
         - Does the prompt use grammar terminology or an unnecessary preamble?\n\
         - Does the prompt repeat words from the options?",
    );
    if cross_item {
        checks.push_str("\n- Are any items in this batch too similar to each other?");
    }
    checks
}

fn validation_format(item_number: &str) -> serde_json::Value {
    json!({
        "Item Number": item_number,
        "Overall Quality": "Pass | Requires Revision",
        "Ambiguity Issues": [],
        "Context Clue Assessment": "Strong / Weak / Absent, with a reason",
        "Other Issues": [],
        "Cross-Question Issues": [],
        "Revision Recommendations": "... or None"
    })
}

/// 质检阶段看到的题目（已挖空、已打乱）
fn review_view(item: &FinishedItem) -> serde_json::Value {
    json!({
        "Item Number": item.item_id,
        "Question Prompt": item.question_prompt,
        "Answer A": item.options[0],
        "Answer B": item.options[1],
        "Answer C": item.options[2],
        "Answer D": item.options[3],
        "Correct Answer": item.correct_letter.to_string(),
        "Context Clue": item.context_clue,
        "CEFR": item.level,
    })
}
