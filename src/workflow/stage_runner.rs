//! 单次阶段调用 - 流程层
//!
//! 一次阶段调用 = 检查取消 → 调用生成服务 → 归一化。
//! 只有 `UpstreamError` 会按指数退避重试，其余失败直接返回。

use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PipelineSettings;
use crate::error::GenerationError;
use crate::models::stage::StageOutput;
use crate::services::{Prompt, ResponseNormalizer, TextGenerator};
use crate::workflow::abort::AbortSignal;

/// 阶段调用器
///
/// 只借用生成服务、凭证和运行参数，不持有任何资源。
pub struct StageRunner<'a, G: TextGenerator + ?Sized> {
    generator: &'a G,
    credential: &'a str,
    settings: &'a PipelineSettings,
    abort: &'a AbortSignal,
}

impl<'a, G: TextGenerator + ?Sized> StageRunner<'a, G> {
    pub fn new(
        generator: &'a G,
        credential: &'a str,
        settings: &'a PipelineSettings,
        abort: &'a AbortSignal,
    ) -> Self {
        Self {
            generator,
            credential,
            settings,
            abort,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        self.settings
    }

    /// 调用生成服务并归一化
    ///
    /// `label` 用于日志前缀（任务上下文或批次描述）。
    pub async fn call(&self, label: &str, prompt: &Prompt) -> Result<JsonValue, GenerationError> {
        let mut attempt: u32 = 0;
        loop {
            if self.abort.is_aborted() {
                warn!("{} ⛔ 已取消，跳过阶段 {}", label, prompt.stage);
                return Err(GenerationError::Aborted);
            }

            debug!("{} 调用生成服务: 阶段 {}", label, prompt.stage);
            let raw = self.generator.generate(prompt, self.credential).await;

            match ResponseNormalizer::parse(Some(&raw)) {
                Err(GenerationError::UpstreamError(msg)) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = self.settings.delay_for_attempt(attempt);
                    warn!(
                        "{} ⚠️ 阶段 {} 上游错误: {}，{}ms 后第 {}/{} 次重试",
                        label, prompt.stage, msg, delay, attempt, self.settings.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                other => return other,
            }
        }
    }

    /// 调用并要求输出为 JSON 对象
    pub async fn call_object(&self, label: &str, prompt: &Prompt) -> Result<StageOutput, GenerationError> {
        let value = self.call(label, prompt).await?;
        StageOutput::from_value(value)
    }

    /// 调用并取出数组（整批模式）
    pub async fn call_array(&self, label: &str, prompt: &Prompt) -> Result<Vec<JsonValue>, GenerationError> {
        let value = self.call(label, prompt).await?;
        ResponseNormalizer::extract_array(value)
    }
}
