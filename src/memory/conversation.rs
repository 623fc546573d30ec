//! 对话历史：消息标签联合与轮内历史操作
//!
//! History 是按插入顺序排列的 Message 序列，由会话持有、跨轮增长；
//! 每轮内只追加，唯一的删除是编排器在静默交接时剥离交接工具调用的痕迹（见 strip_handoff_artifacts）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentIdentity;

/// 模型发起的单次工具调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 调用 ID（结果消息通过它与调用配对）
    pub id: String,
    pub name: String,
    /// 工具参数（JSON 对象）
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 单条消息：每种消息一个变体，只在调用模型的边界处统一转换为 API 格式
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// 智能体给出的自然语言回复
    AgentAnswer {
        agent: AgentIdentity,
        content: String,
    },
    /// 一次补全中模型请求的全部工具调用
    ToolCall {
        agent: AgentIdentity,
        calls: Vec<ToolCall>,
    },
    /// 工具执行结果（失败时 is_error = true，content 为错误文本）
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn answer(agent: AgentIdentity, content: impl Into<String>) -> Self {
        Self::AgentAnswer {
            agent,
            content: content.into(),
        }
    }

    pub fn tool_calls(agent: AgentIdentity, calls: Vec<ToolCall>) -> Self {
        Self::ToolCall { agent, calls }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// 会话历史（插入顺序有意义）
pub type History = Vec<Message>;

/// 从 history[start..] 中剥离一次交接留下的内部痕迹：
/// - 删除 ToolCall 消息中 ID 属于 handoff_call_ids 的调用，调用清空后整条消息删除；
/// - 删除与之配对的 ToolResult；
/// - 删除该段末尾交接方智能体的 AgentAnswer（从未展示给用户）。
///
/// 返回被移除的消息条数（整条删除的消息才计数）。
pub fn strip_handoff_artifacts(
    history: &mut History,
    start: usize,
    agent: AgentIdentity,
    handoff_call_ids: &[String],
) -> usize {
    let start = start.min(history.len());
    let mut removed = 0;

    if matches!(history.last(), Some(Message::AgentAnswer { agent: a, .. }) if *a == agent)
        && history.len() > start
    {
        history.pop();
        removed += 1;
    }

    removed + strip_handoff_calls(history, start, handoff_call_ids)
}

/// 只删除 history[start..] 中的交接调用及其结果，保留智能体的回复。
/// 用于交接未生效（循环失败后兜底回复）的情况。
pub fn strip_handoff_calls(history: &mut History, start: usize, handoff_call_ids: &[String]) -> usize {
    if handoff_call_ids.is_empty() {
        return 0;
    }
    let start = start.min(history.len());
    let before = history.len();

    let mut segment: History = history.split_off(start);
    segment.retain_mut(|msg| match msg {
        Message::ToolCall { calls, .. } => {
            calls.retain(|c| !handoff_call_ids.contains(&c.id));
            !calls.is_empty()
        }
        Message::ToolResult { call_id, .. } => !handoff_call_ids.contains(call_id),
        _ => true,
    });
    history.extend(segment);

    before - history.len()
}

/// 把历史裁剪到最近 max_turns 轮；只在 User 消息处切开，
/// 一轮内的 ToolCall 与 ToolResult 总是一起保留或一起丢弃。
///
/// 返回被丢弃的消息条数。
pub fn prune_turns(history: &mut History, max_turns: usize) -> usize {
    if max_turns == 0 {
        let dropped = history.len();
        history.clear();
        return dropped;
    }
    let turn_starts: Vec<usize> = history
        .iter()
        .enumerate()
        .filter(|(_, m)| matches!(m, Message::User { .. }))
        .map(|(i, _)| i)
        .collect();
    if turn_starts.len() <= max_turns {
        return 0;
    }
    let cut = turn_starts[turn_starts.len() - max_turns];
    history.drain(..cut);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handoff_segment() -> History {
        vec![
            Message::user("reset my password"),
            Message::tool_calls(
                AgentIdentity::Information,
                vec![
                    ToolCall::new("c1", "faq_search", json!({"query": "password"})),
                    ToolCall::new("c2", "transfer_to_action_agent", json!({})),
                ],
            ),
            Message::tool_result("c1", "faq_search", "[]", false),
            Message::tool_result("c2", "transfer_to_action_agent", "{}", false),
            Message::answer(AgentIdentity::Information, "Let me get the action agent."),
        ]
    }

    #[test]
    fn test_strip_keeps_non_handoff_calls() {
        let mut history = handoff_segment();
        let removed =
            strip_handoff_artifacts(&mut history, 1, AgentIdentity::Information, &["c2".into()]);
        assert_eq!(removed, 2);
        assert_eq!(history.len(), 3);
        match &history[1] {
            Message::ToolCall { calls, .. } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "faq_search");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(matches!(&history[2], Message::ToolResult { call_id, .. } if call_id == "c1"));
    }

    #[test]
    fn test_strip_drops_empty_tool_call_message() {
        let mut history = vec![
            Message::user("hi"),
            Message::tool_calls(
                AgentIdentity::Action,
                vec![ToolCall::new("h", "transfer_to_information_agent", json!({}))],
            ),
            Message::tool_result("h", "transfer_to_information_agent", "{}", false),
            Message::answer(AgentIdentity::Action, "switching"),
        ];
        strip_handoff_artifacts(&mut history, 1, AgentIdentity::Action, &["h".into()]);
        assert_eq!(history, vec![Message::user("hi")]);
    }

    #[test]
    fn test_strip_never_touches_prefix() {
        let mut history = vec![
            Message::answer(AgentIdentity::Information, "earlier answer"),
            Message::user("next"),
        ];
        strip_handoff_artifacts(&mut history, 2, AgentIdentity::Information, &[]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_strip_calls_keeps_answer() {
        let mut history = handoff_segment();
        let removed = strip_handoff_calls(&mut history, 1, &["c2".into()]);
        assert_eq!(removed, 1);
        assert_eq!(history.len(), 4);
        assert!(matches!(
            history.last(),
            Some(Message::AgentAnswer { agent: AgentIdentity::Information, .. })
        ));
        assert!(!history.iter().any(|m| matches!(
            m,
            Message::ToolResult { name, .. } if name.starts_with("transfer_to_")
        )));
    }

    #[test]
    fn test_prune_keeps_recent_turns() {
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(Message::user(format!("q{}", i)));
            history.push(Message::answer(AgentIdentity::Information, format!("a{}", i)));
        }
        let dropped = prune_turns(&mut history, 2);
        assert_eq!(dropped, 6);
        assert_eq!(history[0], Message::user("q3"));
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_prune_never_splits_tool_exchange() {
        let mut history = vec![Message::user("old"), Message::answer(AgentIdentity::Information, "x")];
        history.extend(handoff_segment());
        history.push(Message::user("latest"));
        prune_turns(&mut history, 2);
        assert_eq!(history[0], Message::user("reset my password"));
        assert!(matches!(&history[1], Message::ToolCall { calls, .. } if calls.len() == 2));
        assert!(matches!(&history[2], Message::ToolResult { call_id, .. } if call_id == "c1"));
        assert!(matches!(&history[3], Message::ToolResult { call_id, .. } if call_id == "c2"));
    }

    #[test]
    fn test_prune_under_limit_and_zero() {
        let mut history = handoff_segment();
        assert_eq!(prune_turns(&mut history, 3), 0);
        assert_eq!(history.len(), 5);
        assert_eq!(prune_turns(&mut history, 0), 5);
        assert!(history.is_empty());
    }

    #[test]
    fn test_message_serde_tag() {
        let msg = Message::answer(AgentIdentity::Action, "done");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["kind"], "agent_answer");
        assert_eq!(value["agent"], "action_agent");
    }
}
