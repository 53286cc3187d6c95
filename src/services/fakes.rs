//! 生成服务的内存替身（仅用于测试）
//!
//! `ScriptedGenerator` 按提示词决定返回内容，并记录每一次调用，
//! 不访问网络。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::stage::Stage;
use crate::services::llm_service::{Prompt, TextGenerator};

type Responder = Box<dyn Fn(&Prompt) -> String + Send + Sync>;

/// 脚本化的生成服务
pub struct ScriptedGenerator {
    responder: Responder,
    calls: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    /// 由函数决定每次调用的返回文本
    pub fn from_fn(responder: impl Fn(&Prompt) -> String + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 按顺序返回预设文本，用完后返回错误文本
    pub fn sequence(responses: Vec<String>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::from_fn(move |_| {
            queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| "Error: script exhausted".to_string())
        })
    }

    /// 所有调用（按发生顺序）
    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 某个任务在某个阶段被调用的次数
    pub fn calls_for(&self, job_id: &str, stage: Stage) -> usize {
        self.calls
            .lock()
            .map(|c| {
                c.iter()
                    .filter(|p| p.stage == stage && p.job_ids.iter().any(|id| id == job_id))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt, _credential: &str) -> String {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.clone());
        }
        (self.responder)(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(stage: Stage, id: &str) -> Prompt {
        Prompt {
            stage,
            job_ids: vec![id.to_string()],
            system: String::new(),
            user: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sequence_then_exhausted() {
        let generator = ScriptedGenerator::sequence(vec!["{}".to_string()]);
        assert_eq!(generator.generate(&prompt(Stage::Holistic, "a"), "k").await, "{}");
        assert!(generator
            .generate(&prompt(Stage::Holistic, "a"), "k")
            .await
            .starts_with("Error:"));
        assert_eq!(generator.calls_for("a", Stage::Holistic), 2);
        assert_eq!(generator.calls_for("a", Stage::Stem), 0);
    }
}
