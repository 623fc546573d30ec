//! ReAct 主循环（单个智能体的一次调用）
//!
//! 追加用户输入 -> plan -> 若为纯文本回复则结束；
//! 若为工具调用则按顺序执行并写回 ToolResult，再回到 plan（think-act-observe）。
//! 工具轮数有上限（默认 6），超过即 AgentLoopExhausted。
//! 交接信号作为返回值的一部分交给编排器，不经过任何共享状态。
//! 所有错误都在这里转为兜底回复，不向外传播。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::agent::AgentIdentity;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::{History, Message};
use crate::react::Planner;
use crate::tools::{ToolDefinition, ToolExecutor};

/// 默认工具轮数上限
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// 一次 Agent 循环的结果
#[derive(Debug, Clone)]
pub struct AgentTurnResult {
    /// 调用结束时的完整历史（输入历史 + 本次产生的消息）
    pub history: History,
    /// 智能体最终回复（失败时为兜底文本）
    pub answer: String,
    /// 请求交接的目标；None 表示直接回答
    pub handoff_to: Option<AgentIdentity>,
    /// 属于交接请求的工具调用 ID（失败时交接作废，但 ID 仍保留以便剥离痕迹）
    pub handoff_call_ids: Vec<String>,
    /// 执行过的工具轮数
    pub iterations: usize,
    /// 被转为兜底回复的错误
    pub failure: Option<AgentError>,
}

#[derive(Default)]
struct LoopState {
    iterations: usize,
    handoff_to: Option<AgentIdentity>,
    handoff_call_ids: Vec<String>,
}

/// Agent 循环：共享工具执行器与恢复策略，由编排器为每个智能体驱动
pub struct AgentLoop {
    executor: Arc<ToolExecutor>,
    recovery: RecoveryEngine,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self {
            executor,
            recovery: RecoveryEngine::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryEngine) -> Self {
        self.recovery = recovery;
        self
    }

    /// 运行一次调用；user_prompt 只在一条新用户消息的首次调用时提供
    pub async fn run(
        &self,
        planner: &Planner,
        visited: &BTreeSet<AgentIdentity>,
        history: &[Message],
        user_prompt: Option<&str>,
    ) -> AgentTurnResult {
        let agent = planner.identity();
        let mut working: History = history.to_vec();
        if let Some(prompt) = user_prompt {
            working.push(Message::user(prompt));
        }

        let system_prompt = planner.system_prompt(visited);
        let tools = self.executor.definitions(agent);
        let mut state = LoopState::default();

        match self
            .drive(planner, &system_prompt, &tools, &mut working, &mut state)
            .await
        {
            Ok(answer) => AgentTurnResult {
                history: working,
                answer,
                handoff_to: state.handoff_to,
                handoff_call_ids: state.handoff_call_ids,
                iterations: state.iterations,
                failure: None,
            },
            Err(e) => {
                tracing::warn!(agent = agent.wire_name(), iterations = state.iterations, "Agent loop failed: {}", e);
                let answer = match self.recovery.handle(&e) {
                    RecoveryAction::Apologize(text) | RecoveryAction::FeedBackToModel(text) => text,
                };
                working.push(Message::answer(agent, answer.clone()));
                AgentTurnResult {
                    history: working,
                    answer,
                    handoff_to: None,
                    handoff_call_ids: state.handoff_call_ids,
                    iterations: state.iterations,
                    failure: Some(e),
                }
            }
        }
    }

    async fn drive(
        &self,
        planner: &Planner,
        system_prompt: &str,
        tools: &[ToolDefinition],
        working: &mut History,
        state: &mut LoopState,
    ) -> Result<String, AgentError> {
        let agent = planner.identity();
        loop {
            let turn = planner.plan(system_prompt, working, tools).await?;

            if turn.tool_calls.is_empty() {
                let answer = turn.text.unwrap_or_default();
                working.push(Message::answer(agent, answer.clone()));
                return Ok(answer);
            }

            if state.iterations >= self.max_iterations {
                return Err(AgentError::AgentLoopExhausted(self.max_iterations));
            }
            state.iterations += 1;

            working.push(Message::tool_calls(agent, turn.tool_calls.clone()));
            for call in &turn.tool_calls {
                let execution = self.executor.execute(agent, call).await;
                if let Some(target) = execution.handoff {
                    tracing::info!(
                        agent = agent.wire_name(),
                        target = target.wire_name(),
                        "Handoff requested"
                    );
                    state.handoff_to = Some(target);
                    state.handoff_call_ids.push(call.id.clone());
                }
                working.push(execution.message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::llm::{AssistantTurn, LlmError, MockLlmClient};
    use crate::memory::ToolCall;
    use crate::tools::{HandoffTool, ResetPasswordTool, ToolRegistry};

    fn agent_loop() -> AgentLoop {
        let mut registry = ToolRegistry::new();
        registry.register(AgentIdentity::Action, ResetPasswordTool);
        registry.register(AgentIdentity::Action, HandoffTool::to(AgentIdentity::Information));
        AgentLoop::new(Arc::new(ToolExecutor::new(registry, 5)))
    }

    fn planner(mock: &Arc<MockLlmClient>) -> Planner {
        Planner::new(AgentIdentity::Action, mock.clone(), "action role")
    }

    fn reset_call(id: &str) -> ToolCall {
        ToolCall::new(id, "reset_user_password", json!({ "username": "alice" }))
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let mock = Arc::new(MockLlmClient::scripted(vec![AssistantTurn::text("Hi there")]));
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("hello"))
            .await;
        assert_eq!(result.answer, "Hi there");
        assert_eq!(result.handoff_to, None);
        assert_eq!(
            result.history,
            vec![
                Message::user("hello"),
                Message::answer(AgentIdentity::Action, "Hi there")
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_results_visible_before_next_completion() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            AssistantTurn::tool_calls(vec![reset_call("c1")]),
            AssistantTurn::text("I sent you a reset link."),
        ]));
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("reset my password"))
            .await;
        assert_eq!(result.iterations, 1);
        assert_eq!(result.history.len(), 4);

        let second = &mock.requests()[1];
        assert!(matches!(
            second.history.last(),
            Some(Message::ToolResult { call_id, is_error: false, .. }) if call_id == "c1"
        ));
        assert_eq!(second.tool_names, vec!["reset_user_password", "transfer_to_information_agent"]);
    }

    #[tokio::test]
    async fn test_results_appended_in_call_order() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            AssistantTurn::tool_calls(vec![reset_call("a"), reset_call("b"), reset_call("c")]),
            AssistantTurn::text("done"),
        ]));
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("x"))
            .await;
        let ids: Vec<&str> = result
            .history
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_handoff_signal_returned() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            AssistantTurn::tool_calls(vec![ToolCall::new(
                "h1",
                "transfer_to_information_agent",
                json!({}),
            )]),
            AssistantTurn::text("Let me bring in a colleague."),
        ]));
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("what labs exist?"))
            .await;
        assert_eq!(result.handoff_to, Some(AgentIdentity::Information));
        assert_eq!(result.handoff_call_ids, vec!["h1".to_string()]);
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_loop_exhaustion_falls_back() {
        let mock = Arc::new(MockLlmClient::from_fn(|req| {
            Ok(AssistantTurn::tool_calls(vec![reset_call(&format!(
                "c{}",
                req.history.len()
            ))]))
        }));
        let result = agent_loop()
            .with_max_iterations(3)
            .with_recovery(RecoveryEngine::new("sorry"))
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("loop forever"))
            .await;
        assert_eq!(result.answer, "sorry");
        assert_eq!(result.failure, Some(AgentError::AgentLoopExhausted(3)));
        assert_eq!(result.iterations, 3);
        assert_eq!(mock.call_count(), 4);
        assert_eq!(result.handoff_to, None);
        assert!(matches!(
            result.history.last(),
            Some(Message::AgentAnswer { content, .. }) if content == "sorry"
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_drops_pending_handoff() {
        let mock = Arc::new(MockLlmClient::from_fn(|req| {
            Ok(AssistantTurn::tool_calls(vec![ToolCall::new(
                format!("h{}", req.history.len()),
                "transfer_to_information_agent",
                json!({}),
            )]))
        }));
        let result = agent_loop()
            .with_max_iterations(2)
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("x"))
            .await;
        assert_eq!(result.handoff_to, None);
        assert_eq!(result.handoff_call_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_completion_error_falls_back() {
        let mock = Arc::new(MockLlmClient::scripted_results(vec![Err(LlmError::Request(
            "503".into(),
        ))]));
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &[], Some("hello"))
            .await;
        assert_eq!(result.failure, Some(AgentError::LlmError("503".into())));
        assert_eq!(result.history.len(), 2);
    }

    #[tokio::test]
    async fn test_no_user_prompt_on_reinvocation() {
        let mock = Arc::new(MockLlmClient::scripted(vec![AssistantTurn::text("ok")]));
        let prior = vec![Message::user("reset my password")];
        let result = agent_loop()
            .run(&planner(&mock), &BTreeSet::new(), &prior, None)
            .await;
        assert_eq!(result.history.len(), 2);
        assert_eq!(mock.requests()[0].history, prior);
    }
}
