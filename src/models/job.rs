//! 任务描述与批量请求

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RequestError;

/// 上下文中风格标注的起始标记
pub const STYLE_MARKER: &str = " (Style: ";
/// 上下文中风格标注的结束字符
pub const STYLE_CLOSE: char = ')';
/// 上下文中没有风格标注时使用的风格
pub const DEFAULT_STYLE: &str = "general conversation";

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    Grammar,
    Vocabulary,
}

impl QuestionType {
    /// 标准名称
    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Grammar => "Grammar",
            QuestionType::Vocabulary => "Vocabulary",
        }
    }

    /// 任务 ID 前缀
    pub fn initial(self) -> char {
        match self {
            QuestionType::Grammar => 'G',
            QuestionType::Vocabulary => 'V',
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grammar" | "g" => Ok(QuestionType::Grammar),
            "vocabulary" | "vocab" | "v" => Ok(QuestionType::Vocabulary),
            other => Err(format!("未知题型: {}", other)),
        }
    }
}

/// CEFR 等级（由低到高）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        CefrLevel::ALL
            .iter()
            .copied()
            .find(|level| level.label() == upper)
            .ok_or_else(|| format!("未知 CEFR 等级: {}", s.trim()))
    }
}

/// 生成策略（阶段数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// 单次调用直接生成完整题目
    Holistic,
    /// 先生成选项，再围绕选项写题干
    Segmented,
    /// 题干+线索 → 干扰项 → 质检
    Sequential,
}

/// 一个规划好的生成任务
///
/// `context` 保存 "主题 (Style: 风格)" 形式的组合上下文，
/// 主题和风格通过 [`JobSpec::topic`] / [`JobSpec::style`] 拆回。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: String,
    pub question_type: QuestionType,
    pub level: CefrLevel,
    pub focus: String,
    pub context: String,
    pub strategy: Strategy,
}

impl JobSpec {
    pub fn topic(&self) -> String {
        split_context(&self.context).0
    }

    pub fn style(&self) -> String {
        split_context(&self.context).1
    }
}

/// 组合主题与风格
pub fn compose_context(topic: &str, style: &str) -> String {
    format!("{}{}{}{}", topic, STYLE_MARKER, style, STYLE_CLOSE)
}

/// 拆分组合上下文，返回 (主题, 风格)
///
/// 标记之前为主题，标记与结束字符之间为风格；没有标记时风格取默认值。
pub fn split_context(context: &str) -> (String, String) {
    match context.find(STYLE_MARKER) {
        Some(pos) => {
            let topic = context[..pos].trim().to_string();
            let rest = &context[pos + STYLE_MARKER.len()..];
            let style = match rest.find(STYLE_CLOSE) {
                Some(end) => &rest[..end],
                None => rest,
            };
            let style = style.trim();
            let style = if style.is_empty() { DEFAULT_STYLE } else { style };
            (topic, style.to_string())
        }
        None => (context.trim().to_string(), DEFAULT_STYLE.to_string()),
    }
}

/// 一次批量生成请求
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub count: usize,
    pub question_type: QuestionType,
    pub level: CefrLevel,
    pub focus_choices: Vec<String>,
    /// 用户指定的主题，为空时按语义领域轮换
    pub topic_hint: Option<String>,
    pub strategy: Strategy,
}

impl BatchRequest {
    /// 规划前的参数校验
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.count == 0 {
            return Err(RequestError::ZeroCount);
        }
        if self.focus_choices.iter().all(|f| f.trim().is_empty()) {
            return Err(RequestError::NoFocusSelected);
        }
        Ok(())
    }

    /// 非空的用户主题
    pub fn explicit_topic(&self) -> Option<&str> {
        self.topic_hint
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_context_with_style() {
        let (topic, style) = split_context("Cooking & Food (Style: a brief instruction)");
        assert_eq!(topic, "Cooking & Food");
        assert_eq!(style, "a brief instruction");
    }

    #[test]
    fn test_split_context_without_marker_uses_default_style() {
        let (topic, style) = split_context("Football");
        assert_eq!(topic, "Football");
        assert_eq!(style, DEFAULT_STYLE);
    }

    #[test]
    fn test_compose_then_split_recovers_parts() {
        let context = compose_context("Work & Jobs", "a personal opinion");
        assert_eq!(context, "Work & Jobs (Style: a personal opinion)");
        let (topic, style) = split_context(&context);
        assert_eq!(topic, "Work & Jobs");
        assert_eq!(style, "a personal opinion");
    }

    #[test]
    fn test_parse_level_and_type() {
        assert_eq!("b1".parse::<CefrLevel>().unwrap(), CefrLevel::B1);
        assert!("D1".parse::<CefrLevel>().is_err());
        assert_eq!("Vocabulary".parse::<QuestionType>().unwrap(), QuestionType::Vocabulary);
        assert_eq!(QuestionType::Grammar.initial(), 'G');
    }

    #[test]
    fn test_validate_request() {
        let mut request = BatchRequest {
            count: 2,
            question_type: QuestionType::Grammar,
            level: CefrLevel::A2,
            focus_choices: vec!["Comparatives".to_string()],
            topic_hint: Some("   ".to_string()),
            strategy: Strategy::Holistic,
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.explicit_topic(), None);

        request.focus_choices = vec![" ".to_string()];
        assert!(matches!(request.validate(), Err(RequestError::NoFocusSelected)));

        request.focus_choices = vec!["Comparatives".to_string()];
        request.count = 0;
        assert!(matches!(request.validate(), Err(RequestError::ZeroCount)));
    }
}
