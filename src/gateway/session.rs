//! 会话控制器：单个连接的生命周期
//!
//! 持有跨轮增长的对话历史，按顺序把每条用户消息交给编排器；
//! Emit 转发给客户端，Suppressed 不发送任何内容。
//! 连接关闭时取消令牌被触发，进行中的一轮被直接丢弃，之后不会再发送回复。
//! 每轮开始前按整轮裁剪历史，只保留最近的若干轮。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::auth::UserIdentity;
use super::message::{AgentReply, Inbound, Outbound};
use crate::core::{Orchestrator, TurnOutcome};
use crate::memory::{prune_turns, History};

/// 默认保留的最近轮数
pub const DEFAULT_MAX_CONTEXT_TURNS: usize = 20;

/// 会话结束时的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub username: String,
    /// 完成的轮数（Emit + Suppressed）
    pub turns: usize,
    pub emitted: usize,
    pub suppressed: usize,
    /// 是否在一轮进行中被关闭
    pub cancelled_mid_turn: bool,
    /// 由服务端发起关闭时的关闭码
    pub close_code: Option<u16>,
}

pub struct SessionController {
    orchestrator: Arc<Orchestrator>,
    user: Option<UserIdentity>,
    history: History,
    /// 发给模型的历史最多包含的轮数（含本轮）；0 表示不限制
    max_context_turns: usize,
}

impl SessionController {
    pub fn new(orchestrator: Arc<Orchestrator>, user: Option<UserIdentity>) -> Self {
        Self {
            orchestrator,
            user,
            history: History::new(),
            max_context_turns: DEFAULT_MAX_CONTEXT_TURNS,
        }
    }

    pub fn with_max_context_turns(mut self, max_context_turns: usize) -> Self {
        self.max_context_turns = max_context_turns;
        self
    }

    pub fn username(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or("anonymous")
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// 运行会话直到客户端关闭、协议错误或 cancel 被触发
    pub async fn run(
        &mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        outbound: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
    ) -> SessionSummary {
        let mut summary = SessionSummary {
            username: self.username().to_string(),
            ..Default::default()
        };
        tracing::info!(user = %summary.username, "Session connected");

        loop {
            if self.max_context_turns > 0 {
                let dropped = prune_turns(&mut self.history, self.max_context_turns - 1);
                if dropped > 0 {
                    tracing::debug!(user = %summary.username, dropped, "Pruned session history");
                }
            }

            // 已排队的消息优先于关闭信号，进入下一轮后再按中途关闭处理并记录
            let event = tokio::select! {
                biased;
                event = inbound.recv() => event,
                _ = cancel.cancelled() => break,
            };

            let utterance = match event {
                Some(Inbound::Utterance(text)) => text,
                Some(Inbound::Fault { code, reason }) => {
                    tracing::warn!(user = %summary.username, code, "Protocol fault: {}", reason);
                    let _ = outbound.send(Outbound::error_notice(&reason)).await;
                    let _ = outbound.send(Outbound::Close { code, reason }).await;
                    summary.close_code = Some(code);
                    break;
                }
                Some(Inbound::Closed) | None => break,
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled_mid_turn = true;
                    tracing::info!(user = %summary.username, "Connection closed mid-turn, turn dropped");
                    break;
                }
                report = orchestrator.handle_utterance(&mut self.history, &utterance) => report,
            };
            summary.turns += 1;

            match report.outcome {
                TurnOutcome::Emit { identity, message } => {
                    summary.emitted += 1;
                    if outbound
                        .send(Outbound::Reply(AgentReply::new(identity, message)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                TurnOutcome::Suppressed => {
                    summary.suppressed += 1;
                }
            }
        }

        tracing::info!(
            user = %summary.username,
            turns = summary.turns,
            "Session disconnected"
        );
        summary
    }
}
