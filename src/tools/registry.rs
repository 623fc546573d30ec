//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! ToolRegistry 按智能体分组、按注册顺序保存，保证提供给模型的工具列表稳定（便于确定性的 prompt 与测试）。
//! ToolExecutor 在调用时加超时、写审计日志，并把错误转成 ToolResult。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::agent::AgentIdentity;
use crate::core::ToolError;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型发起调用时使用）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 交接工具返回目标智能体，其余工具返回 None
    fn handoff_target(&self) -> Option<AgentIdentity> {
        None
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// 提供给补全接口的工具声明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// 工具注册表：每个智能体一组有序工具
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<AgentIdentity, Vec<Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个智能体注册工具；同名工具会被替换（保留原位置）
    pub fn register(&mut self, agent: AgentIdentity, tool: impl Tool + 'static) {
        self.register_arc(agent, Arc::new(tool));
    }

    pub fn register_arc(&mut self, agent: AgentIdentity, tool: Arc<dyn Tool>) {
        let list = self.tools.entry(agent).or_default();
        match list.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => list[idx] = tool,
            None => list.push(tool),
        }
    }

    /// 按注册顺序列出某个智能体的工具
    pub fn list_tools(&self, agent: AgentIdentity) -> &[Arc<dyn Tool>] {
        self.tools.get(&agent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, agent: AgentIdentity, name: &str) -> Option<Arc<dyn Tool>> {
        self.list_tools(agent)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    pub fn tool_names(&self, agent: AgentIdentity) -> Vec<String> {
        self.list_tools(agent)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    /// 生成提供给模型的工具声明列表（顺序与注册顺序一致）
    pub fn definitions(&self, agent: AgentIdentity) -> Vec<ToolDefinition> {
        self.list_tools(agent)
            .iter()
            .map(|t| ToolDefinition::of(t.as_ref()))
            .collect()
    }
}
