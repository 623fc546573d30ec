//! 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：工具层错误回灌给模型，补全层错误与循环耗尽转为兜底致歉回复。
//! 以上错误都不会作为一轮对话的硬故障向外传播；只有传输层错误（GatewayError）会结束会话。

use thiserror::Error;

/// Agent 循环内可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Completion timed out after {0}s")]
    CompletionTimeout(u64),

    /// 模型返回了无法解析的工具调用，或既无文本也无工具调用
    #[error("Completion protocol error: {0}")]
    CompletionProtocolError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Agent loop exhausted after {0} tool iterations")]
    AgentLoopExhausted(usize),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 工具自身返回的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::InvalidArguments(e.to_string())
    }
}

/// 传输层错误：地址无效、绑定失败、握手失败
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 把错误文本作为工具结果交还给模型，由它在对话中自行恢复
    FeedBackToModel(String),
    /// 结束本次调用，以兜底文本作为该智能体的回复
    Apologize(String),
}
