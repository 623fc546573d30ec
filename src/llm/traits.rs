//! LLM 补全能力抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：给定 system prompt、会话历史与可用工具，
//! 返回一次 AssistantTurn（纯文本回复，或一到多个工具调用，二者恰有其一）。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{Message, ToolCall};
use crate::tools::ToolDefinition;

/// 模型一次补全的结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
        }
    }
}

/// LLM 后端错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 请求失败（网络、鉴权、限流等）
    #[error("request failed: {0}")]
    Request(String),
    /// 响应不符合约定（工具参数不是合法 JSON 等）
    #[error("malformed response: {0}")]
    Protocol(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, LlmError>;
}
