//! 网关消息协议
//!
//! 会话与传输之间只交换 Inbound / Outbound 事件，与具体的 WebSocket 帧解耦：
//! 读任务把帧转为 Inbound，写任务把 Outbound 转为帧。

use serde::{Deserialize, Serialize};

use crate::agent::AgentIdentity;

/// 正常关闭
pub const CLOSE_NORMAL: u16 = 1000;
/// 不支持的数据（收到二进制帧）
pub const CLOSE_UNSUPPORTED_DATA: u16 = 1003;
/// 服务端内部错误
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// 稍后重试（连接数已满）
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// 发给客户端的回复：{"identity": "action_agent", "message": "..."}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub identity: AgentIdentity,
    pub message: String,
}

impl AgentReply {
    pub fn new(identity: AgentIdentity, message: impl Into<String>) -> Self {
        Self {
            identity,
            message: message.into(),
        }
    }
}

/// 从客户端到会话的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// 一条 UTF-8 文本消息
    Utterance(String),
    /// 协议错误（如二进制帧），会话随之结束
    Fault { code: u16, reason: String },
    /// 客户端关闭或连接出错
    Closed,
}

/// 从会话到客户端的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reply(AgentReply),
    /// 故障时的尽力通知，文本为 "Error: <reason>"
    Notice(String),
    Close { code: u16, reason: String },
}

impl Outbound {
    pub fn error_notice(reason: &str) -> Self {
        Outbound::Notice(format!("Error: {}", reason))
    }

    /// 文本帧内容；Close 没有文本
    pub fn to_text(&self) -> Option<String> {
        match self {
            Outbound::Reply(reply) => serde_json::to_string(reply).ok(),
            Outbound::Notice(text) => Some(text.clone()),
            Outbound::Close { .. } => None,
        }
    }
}
