//! 核心编排层：错误与恢复、轮内状态机、对话编排器

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{AgentError, GatewayError, RecoveryAction, ToolError};
pub use orchestrator::Orchestrator;
pub use recovery::RecoveryEngine;
pub use state::{Decision, TurnOutcome, TurnReport, TurnState};
