//! 响应归一化服务 - 业务能力层
//!
//! 把生成服务返回的原始文本变成结构化的 JSON 值，或者明确的失败原因。
//! 生成服务不保证输出格式：可能带 markdown 代码块、前后夹杂说明文字、
//! 用不同的键包装数组。这里尽量宽松地接受，但绝不静默返回错误形状的结果。

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::models::stage::json_kind;
use crate::services::llm_service::ERROR_PREFIX;
use crate::utils::truncate_text;

/// 常见的数组包装键，按优先级排列
pub const WRAPPER_KEYS: [&str; 6] = [
    "questions",
    "items",
    "results",
    "data",
    "distractors",
    "validations",
];

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    // 非贪婪匹配第一个代码块；信息串可以是任意不含换行和反引号的文本（json、json5、jsonc ...），
    // 也可以省略，或者与内容写在同一行
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:[^\n`]*\r?\n|[A-Za-z0-9_+-]*[ \t]+)?(.*?)```").ok())
        .as_ref()
}

/// 响应归一化服务
///
/// 无状态，所有方法都是纯函数。
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    /// 解析原始响应
    ///
    /// - 空响应 → `EmptyResponse`
    /// - 以 `Error:` 开头 → 原样作为 `UpstreamError`，不尝试解析
    /// - 含代码块时只取代码块内容
    /// - JSON 解析失败 → `MalformedOutput`（保留原文用于诊断）
    pub fn parse(raw: Option<&str>) -> Result<JsonValue, GenerationError> {
        let raw = match raw {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(GenerationError::EmptyResponse),
        };

        let trimmed = raw.trim();
        if trimmed.starts_with(ERROR_PREFIX) {
            return Err(GenerationError::UpstreamError(trimmed.to_string()));
        }

        let payload = Self::strip_fence(trimmed);
        serde_json::from_str::<JsonValue>(payload).map_err(|e| {
            warn!("⚠️ 生成服务输出无法解析为 JSON: {}", e);
            debug!("原始输出: {}", truncate_text(raw, 500));
            GenerationError::MalformedOutput {
                raw: raw.to_string(),
            }
        })
    }

    /// 取出代码块中的内容，没有代码块时原样返回
    pub fn strip_fence(text: &str) -> &str {
        let inner = fence_regex()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.get(1));
        match inner {
            Some(inner) => inner.as_str().trim(),
            None => text,
        }
    }

    /// 从各种包装形式中取出数组
    ///
    /// - 数组：原样返回
    /// - 只有一个键且值为数组的对象：取该数组
    /// - 含有常见包装键（见 [`WRAPPER_KEYS`]）且值为数组的对象：取第一个匹配
    /// - 其他对象 → `NoArrayFound`（列出对象的键）
    /// - 其他类型 → `UnsupportedShape`
    pub fn extract_array(value: JsonValue) -> Result<Vec<JsonValue>, GenerationError> {
        match value {
            JsonValue::Array(items) => Ok(items),
            JsonValue::Object(mut map) => {
                let key = if map.len() == 1 && map.values().all(JsonValue::is_array) {
                    map.keys().next().cloned()
                } else {
                    WRAPPER_KEYS
                        .iter()
                        .find(|key| map.get(**key).map(JsonValue::is_array).unwrap_or(false))
                        .map(|key| key.to_string())
                };
                match key.and_then(|key| map.remove(&key)) {
                    Some(JsonValue::Array(items)) => {
                        debug!("从包装键中取出数组, 共 {} 项", items.len());
                        Ok(items)
                    }
                    _ => Err(GenerationError::NoArrayFound {
                        keys: map.keys().cloned().collect(),
                    }),
                }
            }
            other => Err(GenerationError::UnsupportedShape {
                found: json_kind(&other),
            }),
        }
    }
}
