//! 题目组装服务 - 业务能力层
//!
//! 把阶段输出组装成最终的多选题：挖空题干、合并选项、打乱顺序、重新计算正确选项字母。
//! 任何一步无法保证"恰好一个选项等于正确答案"时都返回失败，绝不猜测字母。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::{NoExpand, Regex};
use tracing::debug;

use crate::error::GenerationError;
use crate::models::item::{
    resolve_correct_letter, DistractorSet, FinishedItem, OptionLetter, OptionSet, StemClue, ANSWER_KEYS,
    ASSESSMENT_FOCUS, CATEGORY, CEFR_RATING, CORRECT_ANSWER, QUESTION_PROMPT,
};
use crate::models::job::JobSpec;
use crate::models::stage::StageOutput;
use crate::utils::stable_hash;

/// 题干中的空格标记
pub const BLANK: &str = "____";

/// 题目组装服务
pub struct ItemAssembler;

impl ItemAssembler {
    /// 为任务创建打乱选项用的随机源
    ///
    /// 配置了种子时由 (种子, 任务 ID) 决定，同一批次重跑结果一致；否则使用系统熵。
    pub fn rng_for(seed: Option<u64>, job_id: &str) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ stable_hash(job_id)),
            None => StdRng::from_entropy(),
        }
    }

    /// 把句子中出现的正确答案全部替换为空格标记
    ///
    /// 按单词边界精确匹配（区分大小写），找不到时返回 `CorrectAnswerNotFound`，
    /// 不做任何近似替换。答案出现多次时每一处都挖空，题干中不会留下答案原文。
    pub fn blank_answer(sentence: &str, answer: &str) -> Result<String, GenerationError> {
        let answer = answer.trim();
        let not_found = || GenerationError::CorrectAnswerNotFound {
            answer: answer.to_string(),
        };
        if answer.is_empty() {
            return Err(not_found());
        }

        let is_word = |c: Option<char>| c.map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false);
        let pattern = format!(
            "{}{}{}",
            if is_word(answer.chars().next()) { r"\b" } else { "" },
            regex::escape(answer),
            if is_word(answer.chars().last()) { r"\b" } else { "" },
        );
        let re = Regex::new(&pattern).map_err(|_| not_found())?;
        if !re.is_match(sentence) {
            return Err(not_found());
        }

        Ok(re.replace_all(sentence, NoExpand(BLANK)).into_owned())
    }

    /// 顺序策略：由阶段 1 和阶段 2 组装题目
    pub fn assemble<R: Rng + ?Sized>(
        job: &JobSpec,
        stem: &StemClue,
        distractors: &DistractorSet,
        rng: &mut R,
    ) -> Result<FinishedItem, GenerationError> {
        let answer = stem.correct_answer.trim().to_string();
        let question_prompt = Self::blank_answer(&stem.complete_sentence, &answer)?;

        if let Some(dup) = distractors.distractors.iter().find(|d| d.trim() == answer) {
            return Err(GenerationError::DuplicateOption { option: dup.clone() });
        }

        let mut options: Vec<String> = distractors
            .distractors
            .iter()
            .map(|d| d.trim().to_string())
            .collect();
        options.push(answer.clone());
        options.shuffle(rng);

        let index = options
            .iter()
            .position(|o| *o == answer)
            .ok_or_else(|| GenerationError::CorrectAnswerNotFound { answer: answer.clone() })?;
        let correct_letter = OptionLetter::from_index(index)
            .ok_or_else(|| GenerationError::CorrectAnswerNotFound { answer: answer.clone() })?;
        let options: [String; 4] = options
            .try_into()
            .map_err(|v: Vec<String>| GenerationError::CountMismatch {
                expected: 4,
                actual: v.len(),
            })?;

        debug!("[任务 {}] 组装完成, 正确选项: {}", job.job_id, correct_letter);

        Ok(FinishedItem {
            item_id: job.job_id.clone(),
            assessment_focus: stem.assessment_focus.clone(),
            question_prompt,
            options,
            correct_letter,
            level: stem.level_label.clone(),
            category: stem.category.clone(),
            context_clue: stem.clue_location.clone(),
            validation: None,
        })
    }

    /// 整体 / 分段策略：把最终输出对象转换为题目
    ///
    /// 分段策略传入阶段 A 的选项；阶段 B 省略选项或正确答案时使用阶段 A 的值。
    pub fn from_final_output(
        out: &StageOutput,
        job: &JobSpec,
        fallback: Option<&OptionSet>,
    ) -> Result<FinishedItem, GenerationError> {
        let mut required = vec![QUESTION_PROMPT];
        let has_all_answers = ANSWER_KEYS.iter().all(|key| out.text(key).is_some());
        if fallback.is_none() {
            required.extend_from_slice(&ANSWER_KEYS);
            required.push(CORRECT_ANSWER);
        }
        out.require(&required)?;

        let (options, correct_letter) = match fallback {
            Some(set) if !has_all_answers => (set.answers.clone(), set.correct),
            _ => {
                let answers = ANSWER_KEYS.map(|key| out.text(key).unwrap_or_default());
                let letter = match (out.text(CORRECT_ANSWER), fallback) {
                    (Some(correct), _) => resolve_correct_letter(&answers, &correct)?,
                    // 阶段 B 可能调整了选项顺序，按阶段 A 正确选项的原文定位
                    (None, Some(set)) => resolve_correct_letter(&answers, &set.answers[set.correct.index()])?,
                    (None, None) => return Err(GenerationError::schema(&[CORRECT_ANSWER])),
                };
                (answers, letter)
            }
        };

        let correct = &options[correct_letter.index()];
        if options.iter().filter(|o| *o == correct).count() > 1 {
            return Err(GenerationError::DuplicateOption {
                option: correct.clone(),
            });
        }

        Ok(FinishedItem {
            item_id: job.job_id.clone(),
            assessment_focus: out.text(ASSESSMENT_FOCUS).unwrap_or_else(|| job.focus.clone()),
            question_prompt: out.text(QUESTION_PROMPT).unwrap_or_default(),
            options,
            correct_letter,
            level: out.text(CEFR_RATING).unwrap_or_else(|| job.level.to_string()),
            category: out.text(CATEGORY).unwrap_or_else(|| job.question_type.to_string()),
            context_clue: None,
            validation: None,
        })
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

    fn stem(sentence: &str, answer: &str) -> StemClue {
        StemClue {
            item_number: "GB1-1".to_string(),
            assessment_focus: "Present Perfect".to_string(),
            complete_sentence: sentence.to_string(),
            correct_answer: answer.to_string(),
            clue_location: Some("for five years".to_string()),
            clue_explanation: None,
            level_label: "B1".to_string(),
            category: "Grammar".to_string(),
        }
    }

    fn distractors(list: [&str; 3]) -> DistractorSet {
        DistractorSet {
            distractors: list.map(String::from),
            rationales: [None, None, None],
        }
    }

    #[test]
    fn test_blank_answer_basic() {
        assert_eq!(
            ItemAssembler::blank_answer("I have lived here for five years.", "have lived").unwrap(),
            "I ____ here for five years."
        );
    }

    #[test]
    fn test_blank_answer_replaces_every_occurrence() {
        assert_eq!(
            ItemAssembler::blank_answer("I have lived here and have lived there.", "have lived").unwrap(),
            "I ____ here and ____ there."
        );
        // 单词内部的片段不受影响
        assert_eq!(
            ItemAssembler::blank_answer("It is in the inbox, in a folder.", "in").unwrap(),
            "It is ____ the inbox, ____ a folder."
        );
    }

    #[test]
    fn test_blank_answer_respects_word_boundaries() {
        // "in" 不应匹配 "interesting" 中的片段
        assert_eq!(
            ItemAssembler::blank_answer("An interesting film is in town.", "in").unwrap(),
            "An interesting film is ____ town."
        );
        assert_eq!(
            ItemAssembler::blank_answer("Don't stop!", "Don't").unwrap(),
            "____ stop!"
        );
    }

    #[test]
    fn test_blank_answer_not_found_is_explicit() {
        let err = ItemAssembler::blank_answer("She goes to work.", "went").unwrap_err();
        assert_eq!(
            err,
            GenerationError::CorrectAnswerNotFound {
                answer: "went".to_string()
            }
        );
        // 大小写不同也视为找不到
        assert!(ItemAssembler::blank_answer("Have you eaten?", "have").is_err());
    }

    #[test]
    fn test_assemble_letter_points_to_answer_for_many_seeds() {
        let s = stem("I have lived here for five years.", "have lived");
        let d = distractors(["lived", "am living", "live"]);
        for seed in 0..50u64 {
            let mut rng = ItemAssembler::rng_for(Some(seed), "GB1-1");
            let item = ItemAssembler::assemble(&job(), &s, &d, &mut rng).unwrap();
            assert_eq!(item.correct_answer(), "have lived");
            assert_eq!(item.options.iter().filter(|o| *o == "have lived").count(), 1);
            assert_eq!(item.question_prompt, "I ____ here for five years.");
        }
    }

    #[test]
    fn test_assemble_shuffle_reaches_every_position() {
        let s = stem("I have lived here for five years.", "have lived");
        let d = distractors(["lived", "am living", "live"]);
        let mut seen = [false; 4];
        for seed in 0..200u64 {
            let mut rng = ItemAssembler::rng_for(Some(seed), "GB1-1");
            let item = ItemAssembler::assemble(&job(), &s, &d, &mut rng).unwrap();
            seen[item.correct_letter.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_assemble_is_reproducible_with_seed() {
        let s = stem("I have lived here for five years.", "have lived");
        let d = distractors(["lived", "am living", "live"]);
        let a = ItemAssembler::assemble(&job(), &s, &d, &mut ItemAssembler::rng_for(Some(7), "GB1-1")).unwrap();
        let b = ItemAssembler::assemble(&job(), &s, &d, &mut ItemAssembler::rng_for(Some(7), "GB1-1")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_assemble_rejects_duplicate_distractor() {
        let s = stem("I have lived here for five years.", "have lived");
        let d = distractors(["lived", " have lived ", "live"]);
        let mut rng = ItemAssembler::rng_for(Some(1), "GB1-1");
        assert!(matches!(
            ItemAssembler::assemble(&job(), &s, &d, &mut rng),
            Err(GenerationError::DuplicateOption { .. })
        ));
    }

    #[test]
    fn test_from_final_output_holistic() {
        let out = StageOutput::from_value(json!({
            "Item Number": "whatever",
            "Question Prompt": "She is ____ than her brother.",
            "Answer A": "taller",
            "Answer B": "more tall",
            "Answer C": "tallest",
            "Answer D": "tall",
            "Correct Answer": "taller"
        }))
        .unwrap();
        let item = ItemAssembler::from_final_output(&out, &job(), None).unwrap();
        assert_eq!(item.item_id, "GB1-1");
        assert_eq!(item.correct_letter, OptionLetter::A);
        assert_eq!(item.level, "B1");
    }

    #[test]
    fn test_from_final_output_missing_fields() {
        let out = StageOutput::from_value(json!({"Question Prompt": "x ____"})).unwrap();
        let err = ItemAssembler::from_final_output(&out, &job(), None).unwrap_err();
        assert_eq!(
            err,
            GenerationError::schema(&["Answer A", "Answer B", "Answer C", "Answer D", "Correct Answer"])
        );
    }

    #[test]
    fn test_from_final_output_segmented_falls_back_to_options() {
        let set = OptionSet {
            answers: ["bigger", "more big", "biggest", "big"].map(String::from),
            correct: OptionLetter::A,
        };
        let out = StageOutput::from_value(json!({"Question Prompt": "My house is ____ than yours."})).unwrap();
        let item = ItemAssembler::from_final_output(&out, &job(), Some(&set)).unwrap();
        assert_eq!(item.correct_answer(), "bigger");
        assert_eq!(item.options, set.answers);
    }
}
