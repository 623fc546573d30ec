//! 轮内交接协议集成测试：用 Mock LLM 驱动完整的编排器与真实工具集

use std::sync::Arc;

use serde_json::json;
use tandem::agent::{build_registry, AgentIdentity};
use tandem::core::{Orchestrator, TurnOutcome};
use tandem::llm::{AssistantTurn, LlmError, MockLlmClient, RecordedRequest};
use tandem::memory::{History, Message, ToolCall};
use tandem::react::{AgentLoop, Planner};
use tandem::tools::{FaqItem, HandoffTool, InMemoryFaqStore, ToolExecutor};

fn faq() -> Arc<InMemoryFaqStore> {
    Arc::new(InMemoryFaqStore::new(vec![
        FaqItem {
            question: "What labs do you have?".into(),
            answer: "We run an AI lab, a robotics lab and a design studio.".into(),
        },
        FaqItem {
            question: "Where is the office?".into(),
            answer: "Amsterdam.".into(),
        },
    ]))
}

fn orchestrator(info: Arc<MockLlmClient>, action: Arc<MockLlmClient>) -> Orchestrator {
    let executor = Arc::new(ToolExecutor::new(build_registry(faq()), 5));
    Orchestrator::new(
        Planner::new(AgentIdentity::Information, info, "information role"),
        Planner::new(AgentIdentity::Action, action, "action role"),
        AgentLoop::new(executor),
    )
}

fn handoff_call(id: &str, target: AgentIdentity) -> AssistantTurn {
    AssistantTurn::tool_calls(vec![ToolCall::new(id, HandoffTool::tool_name(target), json!({}))])
}

fn has_tool_result(req: &RecordedRequest) -> bool {
    req.history
        .iter()
        .rev()
        .take_while(|m| !matches!(m, Message::User { .. }))
        .any(|m| matches!(m, Message::ToolResult { .. }))
}

/// 总是请求交接给 target，看到工具结果后给出一句过渡语
fn always_handoff(target: AgentIdentity) -> MockLlmClient {
    MockLlmClient::from_fn(move |req| {
        if has_tool_result(req) {
            Ok(AssistantTurn::text("Let me get a colleague."))
        } else {
            Ok(handoff_call("handoff", target))
        }
    })
}

fn handoff_leaked(history: &History) -> bool {
    history.iter().any(|m| match m {
        Message::ToolCall { calls, .. } => calls.iter().any(|c| c.name.starts_with("transfer_to_")),
        Message::ToolResult { name, .. } => name.starts_with("transfer_to_"),
        _ => false,
    })
}

#[tokio::test]
async fn test_information_answers_with_faq_lookup() {
    let info = Arc::new(MockLlmClient::scripted(vec![
        AssistantTurn::tool_calls(vec![ToolCall::new(
            "faq1",
            "faq_search",
            json!({ "query": "labs" }),
        )]),
        AssistantTurn::text("We have an AI lab, a robotics lab and a design studio."),
    ]));
    let action = Arc::new(MockLlmClient::default());
    let orch = orchestrator(info.clone(), action.clone());

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "What labs do you have?").await;

    assert_eq!(
        report.outcome,
        TurnOutcome::Emit {
            identity: AgentIdentity::Information,
            message: "We have an AI lab, a robotics lab and a design studio.".into(),
        }
    );
    assert_eq!(report.invocations, 1);
    assert_eq!(action.call_count(), 0);

    let faq_result = info.requests()[1]
        .history
        .iter()
        .find_map(|m| match m {
            Message::ToolResult { content, is_error: false, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(faq_result.contains("robotics lab"));
}

#[tokio::test]
async fn test_reset_password_silent_handoff() {
    let info = Arc::new(MockLlmClient::scripted(vec![
        handoff_call("h1", AgentIdentity::Action),
        AssistantTurn::text("I'll bring in our support colleague for that."),
    ]));
    let action = Arc::new(MockLlmClient::scripted(vec![
        AssistantTurn::tool_calls(vec![ToolCall::new(
            "r1",
            "reset_user_password",
            json!({ "username": "alice" }),
        )]),
        AssistantTurn::text("I used reset_user_password, check your inbox for the link."),
    ]));
    let orch = orchestrator(info, action.clone());

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "reset my password").await;

    assert_eq!(
        report.outcome,
        TurnOutcome::Emit {
            identity: AgentIdentity::Action,
            message: "I used reset_user_password, check your inbox for the link.".into(),
        }
    );
    assert_eq!(report.invocations, 2);

    let first_action_request = &action.requests()[0];
    assert_eq!(first_action_request.history, vec![Message::user("reset my password")]);
    assert!(!handoff_leaked(&history));
    assert!(!history.iter().any(|m| matches!(
        m,
        Message::AgentAnswer { agent: AgentIdentity::Information, .. }
    )));
}

#[tokio::test]
async fn test_ping_pong_is_suppressed_after_two_invocations() {
    let info = Arc::new(always_handoff(AgentIdentity::Action));
    let action = Arc::new(always_handoff(AgentIdentity::Information));
    let orch = orchestrator(info.clone(), action.clone());

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "help?").await;

    assert_eq!(report.outcome, TurnOutcome::Suppressed);
    assert_eq!(report.invocations, 2);
    assert_eq!(
        report.visited.into_iter().collect::<Vec<_>>(),
        vec![AgentIdentity::Information, AgentIdentity::Action]
    );
    // 每个智能体恰好被调用一次（各两次补全：交接 + 过渡语）
    assert_eq!(info.call_count(), 2);
    assert_eq!(action.call_count(), 2);
    assert!(!handoff_leaked(&history));
}

#[tokio::test]
async fn test_history_is_pre_turn_plus_generated_messages() {
    let info = Arc::new(MockLlmClient::scripted(vec![
        AssistantTurn::tool_calls(vec![
            ToolCall::new("faq1", "faq_search", json!({ "query": "office" })),
            ToolCall::new("h1", "transfer_to_action_agent", json!({})),
        ]),
        AssistantTurn::text("Our office is in Amsterdam; a colleague will handle your order."),
    ]));
    let action = Arc::new(MockLlmClient::scripted(vec![AssistantTurn::text(
        "Your order is being processed.",
    )]));
    let orch = orchestrator(info, action.clone());

    let pre_turn = vec![
        Message::user("hi"),
        Message::answer(AgentIdentity::Information, "Hello!"),
    ];
    let mut history = pre_turn.clone();
    let report = orch
        .handle_utterance(&mut history, "where is the office and where is my order?")
        .await;
    assert!(matches!(report.outcome, TurnOutcome::Emit { identity: AgentIdentity::Action, .. }));

    let mut expected = pre_turn;
    expected.push(Message::user("where is the office and where is my order?"));
    expected.push(Message::tool_calls(
        AgentIdentity::Information,
        vec![ToolCall::new("faq1", "faq_search", json!({ "query": "office" }))],
    ));
    assert_eq!(&history[..expected.len()], &expected[..]);
    assert!(matches!(
        &history[expected.len()],
        Message::ToolResult { call_id, .. } if call_id == "faq1"
    ));
    assert_eq!(
        history.last(),
        Some(&Message::answer(AgentIdentity::Action, "Your order is being processed."))
    );
    assert_eq!(history.len(), expected.len() + 2);

    // 下一个智能体能看到 FAQ 结果，但看不到交接痕迹
    assert!(!handoff_leaked(&action.requests()[0].history));
}

#[tokio::test]
async fn test_every_turn_starts_with_information() {
    let info = Arc::new(MockLlmClient::from_fn(|_| Ok(AssistantTurn::text("info here"))));
    let action = Arc::new(MockLlmClient::default());
    let orch = orchestrator(info.clone(), action);

    let mut history = History::new();
    for utterance in ["one", "two", "three"] {
        let report = orch.handle_utterance(&mut history, utterance).await;
        assert!(matches!(
            report.outcome,
            TurnOutcome::Emit { identity: AgentIdentity::Information, .. }
        ));
        assert_eq!(report.visited.len(), 1);
    }
    assert_eq!(info.call_count(), 3);
    assert_eq!(history.len(), 6);
}

#[tokio::test]
async fn test_runaway_tool_loop_emits_fallback() {
    let info = Arc::new(MockLlmClient::from_fn(|req| {
        Ok(AssistantTurn::tool_calls(vec![ToolCall::new(
            format!("faq{}", req.history.len()),
            "faq_search",
            json!({ "query": "labs" }),
        )]))
    }));
    let executor = Arc::new(ToolExecutor::new(build_registry(faq()), 5));
    let orch = Orchestrator::new(
        Planner::new(AgentIdentity::Information, info.clone(), "information role"),
        Planner::new(AgentIdentity::Action, Arc::new(MockLlmClient::default()), "action role"),
        AgentLoop::new(executor)
            .with_max_iterations(2)
            .with_recovery(tandem::core::RecoveryEngine::new("Sorry, something went wrong.")),
    );

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "labs?").await;
    assert_eq!(
        report.outcome,
        TurnOutcome::Emit {
            identity: AgentIdentity::Information,
            message: "Sorry, something went wrong.".into(),
        }
    );
    assert_eq!(info.call_count(), 3);
}

#[tokio::test]
async fn test_unknown_tool_is_fed_back_to_model() {
    let info = Arc::new(MockLlmClient::scripted(vec![
        AssistantTurn::tool_calls(vec![ToolCall::new("x1", "launch_rocket", json!({}))]),
        AssistantTurn::text("I can't do that, but I can tell you about our labs."),
    ]));
    let orch = orchestrator(info.clone(), Arc::new(MockLlmClient::default()));

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "launch a rocket").await;
    assert!(matches!(report.outcome, TurnOutcome::Emit { .. }));

    let fed_back = info.requests()[1].history.last().cloned();
    assert!(matches!(
        fed_back,
        Some(Message::ToolResult { is_error: true, ref content, .. }) if content.starts_with("Error:")
    ));
}

#[tokio::test]
async fn test_completion_failure_after_handoff_keeps_history_clean() {
    let info = Arc::new(MockLlmClient::scripted_results(vec![
        Ok(handoff_call("h1", AgentIdentity::Action)),
        Err(LlmError::Request("503".into())),
    ]));
    let action = Arc::new(MockLlmClient::default());
    let orch = orchestrator(info, action.clone());

    let mut history = History::new();
    let report = orch.handle_utterance(&mut history, "reset my password").await;
    assert!(matches!(
        report.outcome,
        TurnOutcome::Emit { identity: AgentIdentity::Information, .. }
    ));
    assert_eq!(action.call_count(), 0);
    assert!(!handoff_leaked(&history));
    assert_eq!(history.len(), 2);

    // 下一轮模型看到的历史里也没有虚假的交接记录
    let report = orch.handle_utterance(&mut history, "hello again").await;
    assert!(matches!(report.outcome, TurnOutcome::Emit { .. }));
    assert!(!handoff_leaked(&history));
}
