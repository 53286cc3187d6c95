use std::fmt;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有这里的错误会中断整批生成；单个任务的失败见 [`GenerationError`]。
#[derive(Debug)]
pub enum AppError {
    /// 配置错误
    Config(ConfigError),
    /// 文件操作错误
    File(FileError),
    /// 批量请求参数错误
    Request(RequestError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Request(e) => write!(f, "请求错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Request(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 未提供生成服务的凭证，整批无法运行
    MissingCredential,
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCredential => {
                write!(f, "未配置 API Key (LLM_API_KEY / OPENAI_API_KEY)")
            }
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 批量请求参数错误
///
/// 规划之前由调用方校验，规划本身不再失败。
#[derive(Debug)]
pub enum RequestError {
    /// 题目数量为 0
    ZeroCount,
    /// 未选择任何考查点
    NoFocusSelected,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::ZeroCount => write!(f, "题目数量必须至少为 1"),
            RequestError::NoFocusSelected => write!(f, "请至少选择一个考查点 (Assessment Focus)"),
        }
    }
}

impl std::error::Error for RequestError {}

/// 单个任务在某一阶段的失败原因
///
/// 所有变体都只影响当前任务，不会中断整批。`MalformedOutput` 保留原始文本，
/// 仅用于诊断日志，`Display` 中不展示。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("生成服务返回空响应")]
    EmptyResponse,

    /// 生成服务 / 网络 / 鉴权错误，原样透传
    #[error("{0}")]
    UpstreamError(String),

    #[error("输出格式错误: 无法解析为 JSON")]
    MalformedOutput { raw: String },

    #[error("输出中未找到数组, 对象键: {keys:?}")]
    NoArrayFound { keys: Vec<String> },

    #[error("不支持的输出结构: {found}")]
    UnsupportedShape { found: &'static str },

    #[error("返回条目数量不足: 期望 {expected}, 实际 {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("字段缺失或无效: {fields:?}")]
    SchemaViolation { fields: Vec<String> },

    #[error("在句子中找不到正确答案: '{answer}'")]
    CorrectAnswerNotFound { answer: String },

    #[error("干扰项与正确答案重复: '{option}'")]
    DuplicateOption { option: String },

    #[error("任务已取消")]
    Aborted,
}

impl GenerationError {
    /// 稳定的错误类别名，用于导出和统计
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::EmptyResponse => "EmptyResponse",
            GenerationError::UpstreamError(_) => "UpstreamError",
            GenerationError::MalformedOutput { .. } => "MalformedOutput",
            GenerationError::NoArrayFound { .. } => "NoArrayFound",
            GenerationError::UnsupportedShape { .. } => "UnsupportedShape",
            GenerationError::CountMismatch { .. } => "CountMismatch",
            GenerationError::SchemaViolation { .. } => "SchemaViolation",
            GenerationError::CorrectAnswerNotFound { .. } => "CorrectAnswerNotFound",
            GenerationError::DuplicateOption { .. } => "DuplicateOption",
            GenerationError::Aborted => "Aborted",
        }
    }

    /// 原始输出文本（仅诊断用）
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            GenerationError::MalformedOutput { raw } => Some(raw),
            _ => None,
        }
    }

    pub(crate) fn schema(fields: &[&str]) -> Self {
        GenerationError::SchemaViolation {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON序列化失败: {}", err))
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Request(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_passes_message_verbatim() {
        let err = GenerationError::UpstreamError("Error: no key".to_string());
        assert_eq!(err.to_string(), "Error: no key");
        assert_eq!(err.kind(), "UpstreamError");
    }

    #[test]
    fn test_malformed_output_hides_raw_text() {
        let err = GenerationError::MalformedOutput {
            raw: "not json {".to_string(),
        };
        assert!(!err.to_string().contains("not json"));
        assert_eq!(err.raw_output(), Some("not json {"));
    }

    #[test]
    fn test_missing_credential_display() {
        let err: AppError = ConfigError::MissingCredential.into();
        assert!(err.to_string().contains("API Key"));
    }

    #[test]
    fn test_generation_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GenerationError>();
        assert_send_sync::<AppError>();
    }
}
