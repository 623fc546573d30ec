//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 两种模式：按顺序回放预设的 AssistantTurn，或由闭包根据请求动态生成；
//! 每次请求都会被记录下来，便于断言 system prompt、历史与工具列表。
//! 脚本耗尽后回显最后一条用户消息。

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::llm::{AssistantTurn, LlmClient, LlmError};
use crate::memory::Message;
use crate::tools::ToolDefinition;

/// 被记录的一次补全请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub tool_names: Vec<String>,
}

type Responder =
    Box<dyn Fn(&RecordedRequest) -> Result<AssistantTurn, LlmError> + Send + Sync + 'static>;

enum Mode {
    Scripted(Mutex<VecDeque<Result<AssistantTurn, LlmError>>>),
    Dynamic(Responder),
}

pub struct MockLlmClient {
    mode: Mode,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::scripted(Vec::new())
    }
}

impl MockLlmClient {
    /// 按顺序回放 turns
    pub fn scripted(turns: Vec<AssistantTurn>) -> Self {
        Self::scripted_results(turns.into_iter().map(Ok).collect())
    }

    /// 按顺序回放结果（可包含错误）
    pub fn scripted_results(results: Vec<Result<AssistantTurn, LlmError>>) -> Self {
        Self {
            mode: Mode::Scripted(Mutex::new(results.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 由闭包根据请求生成回复
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<AssistantTurn, LlmError> + Send + Sync + 'static,
    {
        Self {
            mode: Mode::Dynamic(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的请求（按时间顺序）
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn echo_last_user(history: &[Message]) -> AssistantTurn {
    let last_user = history
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
        .unwrap_or("(no input)");
    AssistantTurn::text(format!("Echo from Mock: {}", last_user))
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, LlmError> {
        let request = RecordedRequest {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        };
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match &self.mode {
            Mode::Scripted(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Ok(echo_last_user(history))),
            Mode::Dynamic(f) => f(&request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::scripted(vec![AssistantTurn::text("first")]);
        let history = vec![Message::user("hello")];
        let a = mock.complete("sys", &history, &[]).await.unwrap();
        let b = mock.complete("sys", &history, &[]).await.unwrap();
        assert_eq!(a.text.as_deref(), Some("first"));
        assert_eq!(b.text.as_deref(), Some("Echo from Mock: hello"));
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[0].system_prompt, "sys");
    }

    #[tokio::test]
    async fn test_dynamic_sees_request() {
        let mock = MockLlmClient::from_fn(|req| {
            Ok(AssistantTurn::text(format!("{} tools", req.tool_names.len())))
        });
        let out = mock.complete("sys", &[], &[]).await.unwrap();
        assert_eq!(out.text.as_deref(), Some("0 tools"));
    }
}
