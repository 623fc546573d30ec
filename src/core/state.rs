//! 轮内状态机：当前智能体、已发言集合与每次调用后的决策
//!
//! 每条用户消息开始时 current = Information、visited 为空；轮结束即丢弃，不带入下一轮。
//! 决策规则：无交接 → Emit；交接目标已在 visited → Suppress；否则切换到目标继续。
//! 由于身份集合只有两个元素，一轮内最多调用两次智能体。

use std::collections::BTreeSet;

use serde::Serialize;

use crate::agent::AgentIdentity;

/// 每次调用后的决策
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// 把当前智能体的回复发给用户，结束本轮
    Emit,
    /// 交接目标本轮已发言，静默结束本轮
    Suppress,
    /// 静默交接给目标智能体，本轮继续
    HandOff(AgentIdentity),
}

/// 一条用户消息对应的轮内状态
#[derive(Clone, Debug)]
pub struct TurnState {
    current: AgentIdentity,
    visited: BTreeSet<AgentIdentity>,
    invocations: usize,
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnState {
    pub fn new() -> Self {
        Self {
            current: AgentIdentity::default(),
            visited: BTreeSet::new(),
            invocations: 0,
        }
    }

    pub fn current(&self) -> AgentIdentity {
        self.current
    }

    pub fn visited(&self) -> &BTreeSet<AgentIdentity> {
        &self.visited
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// 记录 current 已发言，并根据其交接请求给出决策
    pub fn decide(&mut self, handoff_to: Option<AgentIdentity>) -> Decision {
        self.visited.insert(self.current);
        self.invocations += 1;

        match handoff_to {
            None => Decision::Emit,
            Some(target) if self.visited.contains(&target) => Decision::Suppress,
            Some(target) => {
                self.current = target;
                Decision::HandOff(target)
            }
        }
    }

    pub fn visited_names(&self) -> Vec<&'static str> {
        self.visited.iter().map(|a| a.wire_name()).collect()
    }
}

/// 一轮的最终结果：恰好一次 Emit 或一次 Suppressed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Emit {
        identity: AgentIdentity,
        message: String,
    },
    Suppressed,
}

/// 编排器返回给会话的本轮报告
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub visited: BTreeSet<AgentIdentity>,
    pub invocations: usize,
}

impl TurnReport {
    pub fn is_suppressed(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Suppressed)
    }
}
