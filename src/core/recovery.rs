//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 Agent 循环决定是把错误回灌给模型，还是以兜底回复结束本次调用。

use crate::core::{AgentError, RecoveryAction};

/// 默认兜底回复
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, something went wrong on my side while handling that. Could you try again in a moment?";

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    fallback_message: String,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_MESSAGE)
    }
}

impl RecoveryEngine {
    pub fn new(fallback_message: impl Into<String>) -> Self {
        Self {
            fallback_message: fallback_message.into(),
        }
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::UnknownTool(name) => RecoveryAction::FeedBackToModel(format!(
                "Error: tool '{name}' does not exist. Use one of the tools you were given."
            )),
            AgentError::ToolExecutionFailed(msg) => {
                RecoveryAction::FeedBackToModel(format!("Error: {msg}"))
            }
            AgentError::ToolTimeout(name) => RecoveryAction::FeedBackToModel(format!(
                "Error: tool '{name}' timed out. Tell the user and offer to try again."
            )),
            AgentError::CompletionTimeout(_)
            | AgentError::CompletionProtocolError(_)
            | AgentError::LlmError(_)
            | AgentError::AgentLoopExhausted(_)
            | AgentError::ConfigError(_) => RecoveryAction::Apologize(self.fallback_message.clone()),
        }
    }
}
