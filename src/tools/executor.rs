//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(agent, call) 在超时内调用对应工具；
//! 未知工具、工具报错、超时都会经 RecoveryEngine 转成带错误文本的 ToolResult 回灌给模型，不中断循环。
//! 每次调用输出结构化审计日志（JSON，参数已脱敏）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::agent::AgentIdentity;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::{Message, ToolCall};
use crate::tools::{ToolDefinition, ToolRegistry};

/// 参数预览最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;
/// 审计日志中需要脱敏的参数键（包含即命中，不区分大小写）
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "email", "credential"];

/// 单次工具调用的结果
#[derive(Debug, Clone)]
pub struct ToolExecution {
    /// 写回历史的 ToolResult
    pub message: Message,
    /// 若执行的是交接工具，为其目标智能体
    pub handoff: Option<AgentIdentity>,
    /// 工具层错误（已转为 message 中的错误文本）
    pub error: Option<AgentError>,
}

/// 工具执行器：对每次调用施加超时，并将错误映射为可回灌的 ToolResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    recovery: RecoveryEngine,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            recovery: RecoveryEngine::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn definitions(&self, agent: AgentIdentity) -> Vec<ToolDefinition> {
        self.registry.definitions(agent)
    }

    pub fn tool_names(&self, agent: AgentIdentity) -> Vec<String> {
        self.registry.tool_names(agent)
    }

    /// 执行 agent 工具集中的 call；永不失败，错误体现在返回的 ToolResult 中
    pub async fn execute(&self, agent: AgentIdentity, call: &ToolCall) -> ToolExecution {
        let start = Instant::now();
        let args_preview = args_preview(&call.arguments);

        let (outcome, result) = match self.registry.get(agent, &call.name) {
            None => ("unknown", Err(AgentError::UnknownTool(call.name.clone()))),
            Some(tool) => match timeout(self.timeout, tool.execute(call.arguments.clone())).await {
                Ok(Ok(value)) => ("ok", Ok((value, tool.handoff_target()))),
                Ok(Err(e)) => ("error", Err(AgentError::ToolExecutionFailed(e.to_string()))),
                Err(_) => ("timeout", Err(AgentError::ToolTimeout(call.name.clone()))),
            },
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "agent": agent.wire_name(),
            "tool": call.name,
            "call_id": call.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok((value, handoff)) => ToolExecution {
                message: Message::tool_result(&call.id, &call.name, render_value(&value), false),
                handoff,
                error: None,
            },
            Err(e) => {
                let content = match self.recovery.handle(&e) {
                    RecoveryAction::FeedBackToModel(text) => text,
                    RecoveryAction::Apologize(_) => format!("Error: {e}"),
                };
                ToolExecution {
                    message: Message::tool_result(&call.id, &call.name, content, true),
                    handoff: None,
                    error: Some(e),
                }
            }
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 敏感键的值替换为 ***（递归处理对象与数组）
pub fn redact_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let lower = k.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                        (k.clone(), Value::String("***".to_string()))
                    } else {
                        (k.clone(), redact_args(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_args).collect()),
        other => other.clone(),
    }
}

fn args_preview(args: &Value) -> String {
    let s = redact_args(args).to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}
