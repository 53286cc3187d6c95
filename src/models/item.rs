//! 各阶段的结构化记录与最终题目

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GenerationError;
use crate::models::job::JobSpec;
use crate::models::stage::StageOutput;

// 生成服务输出中使用的字段名
pub const ITEM_NUMBER: &str = "Item Number";
pub const ASSESSMENT_FOCUS: &str = "Assessment Focus";
pub const COMPLETE_SENTENCE: &str = "Complete Sentence";
pub const CORRECT_ANSWER: &str = "Correct Answer";
pub const CLUE_LOCATION: &str = "Context Clue Location";
pub const CLUE_EXPLANATION: &str = "Context Clue Explanation";
pub const CEFR_RATING: &str = "CEFR rating";
pub const CATEGORY: &str = "Category";
pub const QUESTION_PROMPT: &str = "Question Prompt";
pub const ANSWER_KEYS: [&str; 4] = ["Answer A", "Answer B", "Answer C", "Answer D"];
pub const DISTRACTOR_KEYS: [&str; 3] = ["Distractor A", "Distractor B", "Distractor C"];
pub const RATIONALE_KEYS: [&str; 3] = ["Why A is Wrong", "Why B is Wrong", "Why C is Wrong"];
pub const OVERALL_QUALITY: &str = "Overall Quality";

/// 选项字母
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [OptionLetter::A, OptionLetter::B, OptionLetter::C, OptionLetter::D];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_char(self) -> char {
        (b'A' + self as u8) as char
    }

    /// 解析 "B" / "b" / "B)" / "B." 这类单字母写法
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim().trim_end_matches([')', '.', ':']);
        let mut chars = trimmed.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// 根据 "Correct Answer" 字段定位正确选项
///
/// 字段可以是字母，也可以是选项原文；原文必须恰好匹配一个选项。
pub fn resolve_correct_letter(
    answers: &[String; 4],
    correct: &str,
) -> Result<OptionLetter, GenerationError> {
    if let Some(letter) = OptionLetter::parse(correct) {
        // 单字母选项与字母写法冲突时，以原文匹配为准
        if !answers.iter().any(|a| a == correct) {
            return Ok(letter);
        }
    }
    let matches: Vec<usize> = answers
        .iter()
        .enumerate()
        .filter(|(_, a)| a.as_str() == correct)
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [index] => OptionLetter::from_index(*index).ok_or_else(|| GenerationError::CorrectAnswerNotFound {
            answer: correct.to_string(),
        }),
        [] => Err(GenerationError::CorrectAnswerNotFound {
            answer: correct.to_string(),
        }),
        _ => Err(GenerationError::DuplicateOption {
            option: correct.to_string(),
        }),
    }
}

/// 阶段 1：完整句子、正确答案和语境线索
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemClue {
    #[serde(rename = "Item Number")]
    pub item_number: String,
    #[serde(rename = "Assessment Focus")]
    pub assessment_focus: String,
    #[serde(rename = "Complete Sentence")]
    pub complete_sentence: String,
    #[serde(rename = "Correct Answer")]
    pub correct_answer: String,
    #[serde(rename = "Context Clue Location", skip_serializing_if = "Option::is_none")]
    pub clue_location: Option<String>,
    #[serde(rename = "Context Clue Explanation", skip_serializing_if = "Option::is_none")]
    pub clue_explanation: Option<String>,
    #[serde(rename = "CEFR rating")]
    pub level_label: String,
    #[serde(rename = "Category")]
    pub category: String,
}

impl StemClue {
    /// 句子和答案必填，其余标识字段缺失时取任务本身的值
    pub fn from_output(out: &StageOutput, job: &JobSpec) -> Result<Self, GenerationError> {
        out.require(&[COMPLETE_SENTENCE, CORRECT_ANSWER])?;
        Ok(Self {
            item_number: out.text(ITEM_NUMBER).unwrap_or_else(|| job.job_id.clone()),
            assessment_focus: out.text(ASSESSMENT_FOCUS).unwrap_or_else(|| job.focus.clone()),
            complete_sentence: out.text(COMPLETE_SENTENCE).unwrap_or_default(),
            correct_answer: out.text(CORRECT_ANSWER).unwrap_or_default(),
            clue_location: out.text(CLUE_LOCATION),
            clue_explanation: out.text(CLUE_EXPLANATION),
            level_label: out.text(CEFR_RATING).unwrap_or_else(|| job.level.to_string()),
            category: out.text(CATEGORY).unwrap_or_else(|| job.question_type.to_string()),
        })
    }
}

/// 阶段 2：三个干扰项及其排除理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistractorSet {
    pub distractors: [String; 3],
    pub rationales: [Option<String>; 3],
}

impl DistractorSet {
    /// 任一干扰项缺失即视为阶段失败，不做默认填充
    pub fn from_output(out: &StageOutput) -> Result<Self, GenerationError> {
        out.require(&DISTRACTOR_KEYS)?;
        let distractors = DISTRACTOR_KEYS.map(|key| out.text(key).unwrap_or_default());
        let rationales = RATIONALE_KEYS.map(|key| out.text(key));
        Ok(Self {
            distractors,
            rationales,
        })
    }
}

/// 分段策略 A：四个选项与正确选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    pub answers: [String; 4],
    pub correct: OptionLetter,
}

impl OptionSet {
    pub fn from_output(out: &StageOutput) -> Result<Self, GenerationError> {
        let mut required: Vec<&str> = ANSWER_KEYS.to_vec();
        required.push(CORRECT_ANSWER);
        out.require(&required)?;
        let answers = ANSWER_KEYS.map(|key| out.text(key).unwrap_or_default());
        let correct = resolve_correct_letter(&answers, &out.text(CORRECT_ANSWER).unwrap_or_default())?;
        Ok(Self { answers, correct })
    }

    /// 发送给题干阶段的选项 JSON
    pub fn to_prompt_json(&self) -> String {
        let mut map = serde_json::Map::new();
        for (key, answer) in ANSWER_KEYS.iter().zip(self.answers.iter()) {
            map.insert(key.to_string(), serde_json::Value::String(answer.clone()));
        }
        map.insert(
            CORRECT_ANSWER.to_string(),
            serde_json::Value::String(self.correct.to_string()),
        );
        serde_json::Value::Object(map).to_string()
    }
}

/// 质检结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    RequiresRevision,
}

impl Verdict {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "pass" | "passed" => Some(Verdict::Pass),
            "requires revision" | "revise" | "needs revision" => Some(Verdict::RequiresRevision),
            _ => None,
        }
    }
}

/// 阶段 3：质检报告
///
/// "Requires Revision" 只作为结果的一部分返回，流程不会据此自动重试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ambiguity_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_clue_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_question_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_recommendations: Option<String>,
}

impl ValidationReport {
    pub fn from_output(out: &StageOutput) -> Result<Self, GenerationError> {
        let verdict = out
            .text(OVERALL_QUALITY)
            .as_deref()
            .and_then(Verdict::parse)
            .ok_or_else(|| GenerationError::schema(&[OVERALL_QUALITY]))?;
        Ok(Self {
            verdict,
            ambiguity_issues: out.text_list("Ambiguity Issues"),
            context_clue_assessment: out.text("Context Clue Assessment"),
            other_issues: out.text_list("Other Issues"),
            cross_question_issues: out.text_list("Cross-Question Issues"),
            revision_recommendations: out
                .text("Revision Recommendations")
                .filter(|r| !r.eq_ignore_ascii_case("none")),
        })
    }
}

/// 最终的多选题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedItem {
    pub item_id: String,
    pub assessment_focus: String,
    /// 正确答案处已替换为空格标记
    pub question_prompt: String,
    /// 按展示顺序排列的四个选项
    pub options: [String; 4],
    pub correct_letter: OptionLetter,
    pub level: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_clue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

impl FinishedItem {
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_letter.index()]
    }

    pub fn needs_revision(&self) -> bool {
        matches!(
            self.validation.as_ref().map(|v| v.verdict),
            Some(Verdict::RequiresRevision)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{CefrLevel, QuestionType, Strategy};
    use serde_json::json;

    fn job() -> JobSpec {
        JobSpec {
            job_id: "GB1-1".to_string(),
            question_type: QuestionType::Grammar,
            level: CefrLevel::B1,
            focus: "Present Perfect".to_string(),
            context: "Daily Routine (Style: a simple fact)".to_string(),
            strategy: Strategy::Sequential,
        }
    }

    fn answers(list: [&str; 4]) -> [String; 4] {
        list.map(|s| s.to_string())
    }

    #[test]
    fn test_option_letter_parse() {
        assert_eq!(OptionLetter::parse("b"), Some(OptionLetter::B));
        assert_eq!(OptionLetter::parse("C)"), Some(OptionLetter::C));
        assert_eq!(OptionLetter::parse("E"), None);
        assert_eq!(OptionLetter::parse("AB"), None);
        assert_eq!(OptionLetter::from_index(3), Some(OptionLetter::D));
        assert_eq!(OptionLetter::from_index(4), None);
    }

    #[test]
    fn test_resolve_correct_letter_by_letter_or_text() {
        let opts = answers(["went", "has gone", "goes", "going"]);
        assert_eq!(resolve_correct_letter(&opts, "B").unwrap(), OptionLetter::B);
        assert_eq!(resolve_correct_letter(&opts, "goes").unwrap(), OptionLetter::C);
        assert!(matches!(
            resolve_correct_letter(&opts, "gone"),
            Err(GenerationError::CorrectAnswerNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_correct_letter_prefers_text_for_single_letter_options() {
        let opts = answers(["x", "a", "y", "z"]);
        assert_eq!(resolve_correct_letter(&opts, "a").unwrap(), OptionLetter::B);
    }

    #[test]
    fn test_stem_clue_falls_back_to_job_fields() {
        let out = StageOutput::from_value(json!({
            "Complete Sentence": "I have lived here for five years.",
            "Correct Answer": "have lived"
        }))
        .unwrap();
        let stem = StemClue::from_output(&out, &job()).unwrap();
        assert_eq!(stem.item_number, "GB1-1");
        assert_eq!(stem.assessment_focus, "Present Perfect");
        assert_eq!(stem.level_label, "B1");
        assert_eq!(stem.category, "Grammar");
        assert!(stem.clue_location.is_none());
    }

    #[test]
    fn test_stem_clue_requires_sentence_and_answer() {
        let out = StageOutput::from_value(json!({"Complete Sentence": "Hi."})).unwrap();
        let err = StemClue::from_output(&out, &job()).unwrap_err();
        assert_eq!(err, GenerationError::schema(&[CORRECT_ANSWER]));
    }

    #[test]
    fn test_distractor_set_missing_field_is_violation() {
        let out = StageOutput::from_value(json!({
            "Distractor A": "live",
            "Distractor B": "am living"
        }))
        .unwrap();
        assert_eq!(
            DistractorSet::from_output(&out).unwrap_err(),
            GenerationError::schema(&["Distractor C"])
        );
    }

    #[test]
    fn test_validation_report_parsing() {
        let out = StageOutput::from_value(json!({
            "Overall Quality": "Requires Revision",
            "Ambiguity Issues": ["C is defensible"],
            "Revision Recommendations": "Strengthen the time clue"
        }))
        .unwrap();
        let report = ValidationReport::from_output(&out).unwrap();
        assert_eq!(report.verdict, Verdict::RequiresRevision);
        assert_eq!(report.ambiguity_issues, vec!["C is defensible"]);

        let out = StageOutput::from_value(json!({"Overall Quality": "Maybe"})).unwrap();
        assert!(ValidationReport::from_output(&out).is_err());
    }

    #[test]
    fn test_option_set_from_output() {
        let out = StageOutput::from_value(json!({
            "Answer A": "bigger",
            "Answer B": "more big",
            "Answer C": "biggest",
            "Answer D": "big",
            "Correct Answer": "A"
        }))
        .unwrap();
        let set = OptionSet::from_output(&out).unwrap();
        assert_eq!(set.correct, OptionLetter::A);
        assert!(set.to_prompt_json().contains("\"Correct Answer\":\"A\""));
    }
}
