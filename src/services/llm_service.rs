//! LLM 服务 - 业务能力层
//!
//! 只负责"调用生成服务"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! ## 错误约定
//! `generate` 从不返回 `Err`：缺少凭证、网络错误、空响应都会变成以
//! [`ERROR_PREFIX`] 开头的字符串，由 `ResponseNormalizer` 统一识别为 `UpstreamError`。

use anyhow::Result;
use async_trait::async_trait;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::stage::Stage;

/// 生成服务错误文本的固定前缀
pub const ERROR_PREFIX: &str = "Error:";

/// 一次生成调用的提示词
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub stage: Stage,
    /// 本次调用覆盖的任务（逐题模式只有一个）
    pub job_ids: Vec<String>,
    pub system: String,
    pub user: String,
}

/// 文本生成能力
///
/// 流程层只依赖这个 trait，测试中可以替换为脚本化的实现。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 返回生成的原始文本；任何失败都以 [`ERROR_PREFIX`] 开头的字符串表示
    async fn generate(&self, prompt: &Prompt, credential: &str) -> String;
}

/// LLM 服务
///
/// 职责：
/// - 调用兼容 OpenAI 的 Chat Completions 接口
/// - 把所有失败转换为错误文本
/// - 不解析输出，不关心阶段顺序
pub struct LlmService {
    api_base_url: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    json_mode: bool,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        Self {
            api_base_url: config.llm_api_base_url.clone(),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            json_mode: config.llm_json_mode,
        }
    }

    /// 凭证随调用传入，每次调用构建客户端
    fn client(&self, credential: &str) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(credential)
            .with_api_base(&self.api_base_url);
        Client::with_config(openai_config)
    }

    /// 构建请求；开启 JSON 模式时要求输出单个 JSON 对象
    fn build_request(&self, user_message: &str, system_message: &str) -> Result<CreateChatCompletionRequest> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);
        if self.json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        Ok(args.build()?)
    }

    /// 基础的 LLM 调用
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: &str,
        credential: &str,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let request = self.build_request(user_message, system_message)?;

        let response = self
            .client(credential)
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                anyhow::anyhow!("LLM API 调用失败: {}", e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for LlmService {
    async fn generate(&self, prompt: &Prompt, credential: &str) -> String {
        if credential.trim().is_empty() {
            return format!("{} API key is missing. Please provide a credential.", ERROR_PREFIX);
        }

        match self.send_to_llm(&prompt.user, &prompt.system, credential).await {
            Ok(text) => text,
            Err(e) => format!("{} {}", ERROR_PREFIX, e),
        }
    }
}
