//! Tandem - 双智能体客服对话系统
//!
//! 模块划分：
//! - **agent**: 智能体身份、角色提示与装配（create_orchestrator）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、轮内状态机、对话编排器
//! - **gateway**: 会话控制器与 WebSocket 传输
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 会话内对话历史
//! - **observability**: 日志初始化
//! - **react**: Planner 与 ReAct 主循环
//! - **tools**: 工具注册表、执行器与具体工具

pub mod agent;
pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::agent::{create_orchestrator, AgentIdentity};
pub use crate::core::{Orchestrator, TurnOutcome, TurnReport};
