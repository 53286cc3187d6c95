//! 示例题库（few-shot 参考题）
//!
//! 载入后只读，通过 `Arc` 在所有任务间共享。

use serde::{Deserialize, Serialize};

use crate::models::job::{CefrLevel, QuestionType};
use crate::utils::stable_hash;

/// 每个提示词最多附带的示例数量
pub const FEW_SHOT_COUNT: usize = 2;

/// 一道参考题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRow {
    /// CEFR 等级标注，保持原文（题库中可能出现 "B1+" 之类的写法）
    pub level: String,
    pub question_prompt: String,
    pub answer_a: String,
    pub answer_b: String,
    pub answer_c: String,
    pub answer_d: String,
    pub correct_answer: String,
}

impl ExampleRow {
    fn matches_level(&self, level: CefrLevel) -> bool {
        self.level.trim().eq_ignore_ascii_case(level.label())
    }

    /// 以生成服务输出的字段格式展示
    pub fn to_prompt_json(&self) -> String {
        serde_json::json!({
            "Question Prompt": self.question_prompt,
            "Answer A": self.answer_a,
            "Answer B": self.answer_b,
            "Answer C": self.answer_c,
            "Answer D": self.answer_d,
            "Correct Answer": self.correct_answer,
        })
        .to_string()
    }
}

/// 按题型分组的示例题库
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleBank {
    #[serde(default)]
    pub grammar: Vec<ExampleRow>,
    #[serde(default)]
    pub vocabulary: Vec<ExampleRow>,
}

impl ExampleBank {
    pub fn rows(&self, question_type: QuestionType) -> &[ExampleRow] {
        match question_type {
            QuestionType::Grammar => &self.grammar,
            QuestionType::Vocabulary => &self.vocabulary,
        }
    }

    pub fn len(&self) -> usize {
        self.grammar.len() + self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 为某个任务挑选参考题
    ///
    /// 优先取同等级的题；同等级不足两道时从该题型全部题目中取。
    /// 起始位置由 `key`（通常是任务 ID）决定，同一任务总是拿到相同的示例。
    /// 题库不足两道时返回空。
    pub fn few_shot(&self, question_type: QuestionType, level: CefrLevel, key: &str) -> Vec<&ExampleRow> {
        let rows = self.rows(question_type);
        let same_level: Vec<&ExampleRow> = rows.iter().filter(|r| r.matches_level(level)).collect();
        let pool: Vec<&ExampleRow> = if same_level.len() >= FEW_SHOT_COUNT {
            same_level
        } else if rows.len() >= FEW_SHOT_COUNT {
            rows.iter().collect()
        } else {
            return Vec::new();
        };

        let start = (stable_hash(key) % pool.len() as u64) as usize;
        (0..FEW_SHOT_COUNT)
            .map(|offset| pool[(start + offset) % pool.len()])
            .collect()
    }
}
