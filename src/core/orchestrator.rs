//! 对话编排器：一条用户消息的主控循环
//!
//! 对当前智能体跑一次 Agent 循环，根据 TurnState 的决策发出回复、静默交接或静默结束。
//! 编排器在历史副本上工作，本轮结束时才提交给调用方；
//! 若本轮 future 被中途丢弃（连接关闭），会话持有的历史保持不变。

use crate::agent::AgentIdentity;
use crate::core::state::{Decision, TurnOutcome, TurnReport, TurnState};
use crate::memory::{strip_handoff_artifacts, strip_handoff_calls, History};
use crate::react::{AgentLoop, Planner};

/// 编排器：两个智能体的 Planner 与共享的 Agent 循环
pub struct Orchestrator {
    information: Planner,
    action: Planner,
    agent_loop: AgentLoop,
}

impl Orchestrator {
    pub fn new(information: Planner, action: Planner, agent_loop: AgentLoop) -> Self {
        Self {
            information,
            action,
            agent_loop,
        }
    }

    pub fn planner(&self, agent: AgentIdentity) -> &Planner {
        match agent {
            AgentIdentity::Information => &self.information,
            AgentIdentity::Action => &self.action,
        }
    }

    /// 处理一条用户消息；返回时 history 已追加本轮保留的消息
    pub async fn handle_utterance(&self, history: &mut History, utterance: &str) -> TurnReport {
        let mut working = history.clone();
        let mut state = TurnState::new();
        let mut user_prompt = Some(utterance);

        loop {
            let current = state.current();
            let start = working.len();
            let result = self
                .agent_loop
                .run(self.planner(current), state.visited(), &working, user_prompt.take())
                .await;
            working = result.history;

            match state.decide(result.handoff_to) {
                Decision::Emit => {
                    // 循环失败时交接作废，只保留兜底回复
                    strip_handoff_calls(&mut working, start, &result.handoff_call_ids);
                    tracing::info!(
                        agent = current.wire_name(),
                        visited = ?state.visited_names(),
                        "Emit"
                    );
                    *history = working;
                    return TurnReport {
                        outcome: TurnOutcome::Emit {
                            identity: current,
                            message: result.answer,
                        },
                        visited: state.visited().clone(),
                        invocations: state.invocations(),
                    };
                }
                Decision::Suppress => {
                    strip_handoff_artifacts(&mut working, start, current, &result.handoff_call_ids);
                    tracing::info!(
                        agent = current.wire_name(),
                        visited = ?state.visited_names(),
                        "Handoff target already spoke this turn, suppressed"
                    );
                    *history = working;
                    return TurnReport {
                        outcome: TurnOutcome::Suppressed,
                        visited: state.visited().clone(),
                        invocations: state.invocations(),
                    };
                }
                Decision::HandOff(target) => {
                    let removed = strip_handoff_artifacts(
                        &mut working,
                        start,
                        current,
                        &result.handoff_call_ids,
                    );
                    tracing::info!(
                        from = current.wire_name(),
                        to = target.wire_name(),
                        removed,
                        "Silent handoff"
                    );
                }
            }
        }
    }
}
