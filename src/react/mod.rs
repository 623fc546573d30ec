//! 认知层：Planner（提示拼装与补全）与 ReAct 主循环

pub mod loop_;
pub mod planner;

pub use loop_::{AgentLoop, AgentTurnResult, DEFAULT_MAX_ITERATIONS};
pub use planner::Planner;
