use std::str::FromStr;

use crate::error::ConfigError;

/// 重试等待时间上限（毫秒）
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// 程序配置
///
/// 所有字段都可以通过环境变量覆盖，命令行参数优先级最高（见 `cli.rs`）。
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    /// 生成服务凭证，为空时整批无法运行
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 要求生成服务只输出 JSON 对象（`response_format: json_object`），
    /// 不支持该参数的端点可以关闭
    pub llm_json_mode: bool,
    // --- 流程配置 ---
    /// 同时处理的任务数量（逐题模式）
    pub max_concurrent_jobs: usize,
    /// 上游错误的最大重试次数
    pub max_retries: u32,
    /// 重试退避的基础延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// 规划与选项打乱使用的随机种子，未设置时每次运行结果不同
    pub seed: Option<u64>,
    // --- 文件配置 ---
    /// 示例题库 TOML 文件
    pub example_bank_path: String,
    /// 批量结果输出文件（JSON）
    pub output_file: String,
    /// 失败记录文件
    pub failure_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4-turbo-preview".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 4096,
            llm_json_mode: true,
            max_concurrent_jobs: 1,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            seed: None,
            example_bank_path: "example_bank.toml".to_string(),
            output_file: "output.json".to_string(),
            failure_log_file: "failures.txt".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或为空的变量使用默认值；设置了但无法解析时返回 `EnvVarParseFailed`。
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE", default.llm_temperature, "f32")?,
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", default.llm_max_tokens, "u32")?,
            llm_json_mode: env_parse("LLM_JSON_MODE", default.llm_json_mode, "bool")?,
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", default.max_concurrent_jobs, "usize")?,
            max_retries: env_parse("LLM_MAX_RETRIES", default.max_retries, "u32")?,
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", default.retry_base_delay_ms, "u64")?,
            seed: parse_value("PLANNER_SEED", std::env::var("PLANNER_SEED").ok(), None, "u64")?,
            example_bank_path: std::env::var("EXAMPLE_BANK_PATH").unwrap_or(default.example_bank_path),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
            failure_log_file: std::env::var("FAILURE_LOG_FILE").unwrap_or(default.failure_log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging, "bool")?,
        })
    }

    /// 是否提供了凭证
    pub fn has_credential(&self) -> bool {
        !self.llm_api_key.trim().is_empty()
    }

    /// 提取流程层关心的参数
    pub fn pipeline_settings(&self, granularity: Granularity) -> PipelineSettings {
        PipelineSettings {
            granularity,
            max_concurrent_jobs: self.max_concurrent_jobs.max(1),
            max_retries: self.max_retries,
            retry_base_delay_ms: self.retry_base_delay_ms,
            seed: self.seed,
        }
    }
}

fn env_parse<T: FromStr>(var_name: &str, default: T, expected_type: &str) -> Result<T, ConfigError> {
    let parsed = parse_value(var_name, std::env::var(var_name).ok(), None, expected_type)?;
    Ok(parsed.unwrap_or(default))
}

/// 解析一个环境变量的值，未设置或为空时返回 `default`
fn parse_value<T: FromStr>(
    var_name: &str,
    raw: Option<String>,
    default: Option<T>,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match raw.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.parse().map(Some).map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        }),
        _ => Ok(default),
    }
}

/// 顺序策略的执行粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Granularity {
    /// 每个任务每个阶段一次调用（N×3 次）
    #[default]
    PerItem,
    /// 每个阶段整批一次调用（共 3 次），提示词可见全批上下文
    Batch,
}

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub granularity: Granularity,
    pub max_concurrent_jobs: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub seed: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            granularity: Granularity::PerItem,
            max_concurrent_jobs: 1,
            max_retries: 0,
            retry_base_delay_ms: 1000,
            seed: None,
        }
    }
}

impl PipelineSettings {
    /// 第 `attempt` 次重试前的等待时间: base * 2^(attempt - 1)，不超过 [`MAX_RETRY_DELAY_MS`]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        2u64.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.retry_base_delay_ms.checked_mul(factor))
            .unwrap_or(MAX_RETRY_DELAY_MS)
            .min(MAX_RETRY_DELAY_MS)
    }
}
