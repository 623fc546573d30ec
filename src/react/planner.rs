//! Planner：单个智能体的 system prompt 拼装与补全调用
//!
//! system prompt = 固定角色提示 + 动态约束（本轮已发言的智能体，禁止交接给它们）。
//! plan 在超时内调用 LLM，并校验返回恰有文本或工具调用之一。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::agent::AgentIdentity;
use crate::core::AgentError;
use crate::llm::{AssistantTurn, LlmClient, LlmError};
use crate::memory::Message;
use crate::tools::ToolDefinition;

/// 默认补全超时（秒）
const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

/// Planner：持有智能体身份、角色提示与 LLM
pub struct Planner {
    identity: AgentIdentity,
    llm: Arc<dyn LlmClient>,
    role_prompt: String,
    timeout: Duration,
}

impl Planner {
    pub fn new(identity: AgentIdentity, llm: Arc<dyn LlmClient>, role_prompt: impl Into<String>) -> Self {
        Self {
            identity,
            llm,
            role_prompt: role_prompt.into(),
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn identity(&self) -> AgentIdentity {
        self.identity
    }

    /// 拼装本次调用的 system prompt；visited 非空时追加禁止交接的约束
    pub fn system_prompt(&self, visited: &BTreeSet<AgentIdentity>) -> String {
        let forbidden: Vec<&str> = visited
            .iter()
            .filter(|a| **a != self.identity)
            .map(|a| a.wire_name())
            .collect();
        if forbidden.is_empty() {
            return self.role_prompt.clone();
        }
        format!(
            "{}\n\nYou are currently NOT allowed to hand off to {} at the moment. \
             They already tried to help the user during this message. \
             Do your own part of the request, ask clarifying questions if needed, \
             and never answer on their behalf.",
            self.role_prompt,
            forbidden.join(", ")
        )
    }

    /// 调用 LLM；超时 → CompletionTimeout，格式错误或空回复 → CompletionProtocolError
    pub async fn plan(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, AgentError> {
        let turn = match timeout(self.timeout, self.llm.complete(system_prompt, history, tools)).await {
            Err(_) => return Err(AgentError::CompletionTimeout(self.timeout.as_secs())),
            Ok(Err(LlmError::Protocol(msg))) => return Err(AgentError::CompletionProtocolError(msg)),
            Ok(Err(LlmError::Request(msg))) => return Err(AgentError::LlmError(msg)),
            Ok(Ok(turn)) => turn,
        };

        let has_text = turn.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if turn.tool_calls.is_empty() && !has_text {
            return Err(AgentError::CompletionProtocolError(
                "completion returned neither text nor tool calls".to_string(),
            ));
        }
        Ok(turn)
    }
}
