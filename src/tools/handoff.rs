//! 交接工具：请求把本轮的发言权交给另一个智能体
//!
//! execute 没有任何业务副作用；Agent 循环通过 handoff_target() 识别它，并把目标作为返回值的一部分交给编排器。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::AgentIdentity;
use crate::core::ToolError;
use crate::tools::Tool;

pub struct HandoffTool {
    target: AgentIdentity,
    name: String,
    description: String,
}

impl HandoffTool {
    pub fn to(target: AgentIdentity) -> Self {
        let description = match target {
            AgentIdentity::Action => {
                "Hand the conversation to the action_agent. Call this when the user needs help \
                 with their account or level-1 customer support."
            }
            AgentIdentity::Information => {
                "Hand the conversation to the information_agent. Call this when the user asks \
                 about the organization or its content."
            }
        };
        Self {
            target,
            name: Self::tool_name(target),
            description: description.to_string(),
        }
    }

    /// 指向 target 的交接工具名，如 transfer_to_action_agent
    pub fn tool_name(target: AgentIdentity) -> String {
        format!("transfer_to_{}", target.wire_name())
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn handoff_target(&self) -> Option<AgentIdentity> {
        Some(self.target)
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(json!({
            "status": "success",
            "message": format!("Control will pass to the {}.", self.target.wire_name()),
        }))
    }
}
