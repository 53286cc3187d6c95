//! 阶段标识与阶段输出

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::error::GenerationError;

/// 流程中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 整体策略的唯一阶段
    Holistic,
    /// 分段策略 A：选项
    Options,
    /// 分段策略 B：题干
    Stem,
    /// 顺序策略 1：题干 + 语境线索
    #[serde(rename = "stage1")]
    StemClue,
    /// 顺序策略 2：干扰项
    #[serde(rename = "stage2")]
    Distractors,
    /// 顺序策略 3：质检
    #[serde(rename = "stage3")]
    Validation,
    /// 组装（不调用生成服务）
    Assembly,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Holistic => "holistic",
            Stage::Options => "options",
            Stage::Stem => "stem",
            Stage::StemClue => "stage1",
            Stage::Distractors => "stage2",
            Stage::Validation => "stage3",
            Stage::Assembly => "assembly",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 一次生成调用归一化后的结构化结果
///
/// 只包装 JSON 对象，创建后不再修改。所有读取都返回 `Option`，
/// 缺失字段必须由调用方显式处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOutput(Map<String, JsonValue>);

impl StageOutput {
    /// 从归一化后的值构造，非对象时失败
    pub fn from_value(value: JsonValue) -> Result<Self, GenerationError> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(GenerationError::UnsupportedShape {
                found: json_kind(&other),
            }),
        }
    }

    /// 读取文本字段（去除首尾空白，空串视为缺失）
    ///
    /// 数字和布尔值按文本读取，生成服务偶尔会把编号写成数字。
    pub fn text(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            JsonValue::String(s) => s.trim().to_string(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// 读取列表字段，单个字符串视为只有一项的列表
    pub fn text_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// 校验必填字段，列出所有缺失项
    pub fn require(&self, keys: &[&str]) -> Result<(), GenerationError> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| self.text(key).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::schema(&missing))
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

/// 审计用的阶段记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub job_id: String,
    pub stage: Stage,
    pub output: StageOutput,
}

/// JSON 值的类型名（用于错误信息）
pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_array() {
        let err = StageOutput::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err, GenerationError::UnsupportedShape { found: "array" });
    }

    #[test]
    fn test_text_trims_and_treats_blank_as_missing() {
        let out = StageOutput::from_value(json!({
            "Correct Answer": "  have lived ",
            "Blank": "   ",
            "Item Number": 3
        }))
        .unwrap();
        assert_eq!(out.text("Correct Answer").as_deref(), Some("have lived"));
        assert_eq!(out.text("Blank"), None);
        assert_eq!(out.text("Item Number").as_deref(), Some("3"));
        assert_eq!(out.text("Absent"), None);
    }

    #[test]
    fn test_require_lists_every_missing_field() {
        let out = StageOutput::from_value(json!({"Distractor A": "went"})).unwrap();
        let err = out
            .require(&["Distractor A", "Distractor B", "Distractor C"])
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::SchemaViolation {
                fields: vec!["Distractor B".to_string(), "Distractor C".to_string()]
            }
        );
    }

    #[test]
    fn test_text_list_accepts_single_string() {
        let out = StageOutput::from_value(json!({
            "Other Issues": "Too long",
            "Ambiguity Issues": ["B could fit", ""]
        }))
        .unwrap();
        assert_eq!(out.text_list("Other Issues"), vec!["Too long"]);
        assert_eq!(out.text_list("Ambiguity Issues"), vec!["B could fit"]);
        assert!(out.text_list("Cross-Question Issues").is_empty());
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::StemClue.to_string(), "stage1");
        assert_eq!(Stage::Validation.to_string(), "stage3");
        assert_eq!(serde_json::to_value(Stage::Distractors).unwrap(), "stage2");
        assert_eq!(serde_json::to_value(Stage::Options).unwrap(), "options");
    }
}
