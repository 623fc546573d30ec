//! 记忆层：会话内的短期对话历史（按会话显式传递，不跨会话共享）

pub mod conversation;

pub use conversation::{
    prune_turns, strip_handoff_artifacts, strip_handoff_calls, History, Message, ToolCall,
};
