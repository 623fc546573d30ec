//! 智能体定义与装配
//!
//! AgentIdentity 是两个智能体的身份；每个身份有固定的角色提示与工具集。
//! create_orchestrator 根据配置构建 LLM、工具注册表、Planner 与 Agent 循环，
//! 得到可被多个会话共享的 Orchestrator（会话之间不共享可变状态）。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator, RecoveryEngine};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::react::{AgentLoop, Planner};
use crate::tools::{
    CreateTicketTool, FaqSearchTool, FaqStore, FollowupEmailTool, HandoffTool, InMemoryFaqStore,
    OrderStatusTool, ResetPasswordTool, ToolExecutor, ToolRegistry, UpdateProfileTool,
};

/// 智能体身份；序列化为浏览器端使用的名字
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentIdentity {
    /// 每条用户消息的默认起点
    #[default]
    #[serde(rename = "information_agent")]
    Information,
    #[serde(rename = "action_agent")]
    Action,
}

impl AgentIdentity {
    pub fn wire_name(self) -> &'static str {
        match self {
            AgentIdentity::Information => "information_agent",
            AgentIdentity::Action => "action_agent",
        }
    }
}

impl std::fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

const INFORMATION_PROMPT: &str = "You are the information_agent, the assistant that provides information about the \
organization behind this website. You also answer general pleasantries such as greetings. \
Keep answers short, in your own words, and without emoticons. Always try to help yourself before \
involving another agent. When a request is unclear, ask a clarifying question instead of calling tools, \
and look at the message history first. \
If the user needs help with their account or level-1 customer support, call the \
transfer_to_action_agent tool and tell the user naturally that a colleague will take over and why. \
When you used faq_search, always mention what you learned even if you also hand off. \
Reply as a single chat message without line breaks, like a quick instant message. \
Never answer on behalf of another agent. Never say you 'found information'; you simply know it.";

const ACTION_PROMPT: &str = "You are the action_agent, responsible for level-1 customer support on this website. \
This covers operations on user accounts; if that might be the goal, ask clarifying questions. \
Use the available tools to help the user and tell them which tools you used and why. \
Always try to help yourself before involving another agent. When a request is unclear, ask a \
clarifying question instead of calling tools, and look at the message history first. \
If the user asks about the organization or its content, call the transfer_to_information_agent tool \
and tell the user naturally that a colleague will take over and why. \
Reply as a single chat message without line breaks, like a quick instant message. \
Never answer on behalf of another agent. Never say you 'found information'; you simply know it.";

/// 内置角色提示
pub fn default_role_prompt(agent: AgentIdentity) -> &'static str {
    match agent {
        AgentIdentity::Information => INFORMATION_PROMPT,
        AgentIdentity::Action => ACTION_PROMPT,
    }
}

/// 角色提示：优先读取配置的文件，失败时使用内置提示
pub fn load_role_prompt(agent: AgentIdentity, path: Option<&Path>) -> String {
    let Some(path) = path else {
        return default_role_prompt(agent).to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Prompt file {} is empty, using built-in prompt", path.display());
            default_role_prompt(agent).to_string()
        }
        Err(e) => {
            tracing::warn!("Prompt file {} not readable ({}), using built-in prompt", path.display(), e);
            default_role_prompt(agent).to_string()
        }
    }
}

/// 注册两个智能体的工具；注册顺序即提供给模型的顺序
pub fn build_registry(faq: Arc<dyn FaqStore>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();

    tools.register(AgentIdentity::Information, FaqSearchTool::new(faq));
    tools.register(AgentIdentity::Information, HandoffTool::to(AgentIdentity::Action));

    tools.register(AgentIdentity::Action, ResetPasswordTool);
    tools.register(AgentIdentity::Action, CreateTicketTool);
    tools.register(AgentIdentity::Action, OrderStatusTool);
    tools.register(AgentIdentity::Action, UpdateProfileTool);
    tools.register(AgentIdentity::Action, FollowupEmailTool);
    tools.register(AgentIdentity::Action, HandoffTool::to(AgentIdentity::Information));

    tools
}

/// 根据配置为某个智能体选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig, agent: AgentIdentity) -> Result<Arc<dyn LlmClient>, AgentError> {
    match cfg.llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::info!(agent = agent.wire_name(), "Using Mock LLM");
            Ok(Arc::new(MockLlmClient::default()))
        }
        "openai" => {
            let api_key = cfg
                .llm
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            let Some(api_key) = api_key else {
                tracing::warn!(agent = agent.wire_name(), "No API key set, using Mock LLM");
                return Ok(Arc::new(MockLlmClient::default()));
            };
            let model = cfg.agents.model_for(agent);
            tracing::info!(agent = agent.wire_name(), "Using OpenAI LLM ({})", model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &model,
                Some(&api_key),
            )))
        }
        other => Err(AgentError::ConfigError(format!("unknown llm provider '{}'", other))),
    }
}

/// 按配置加载 FAQ 库；未配置 faq_path 时为空库
pub fn create_faq_store(cfg: &AppConfig) -> Arc<dyn FaqStore> {
    Arc::new(match &cfg.tools.faq_path {
        Some(path) => InMemoryFaqStore::load(path),
        None => InMemoryFaqStore::default(),
    })
}

/// 由配置装配编排器
pub fn create_orchestrator(cfg: &AppConfig) -> Result<Orchestrator, AgentError> {
    create_orchestrator_with_faq(cfg, create_faq_store(cfg))
}

/// 由配置与已有的 FAQ 库装配编排器（与 HTTP 接口共享同一个库）
pub fn create_orchestrator_with_faq(cfg: &AppConfig, faq: Arc<dyn FaqStore>) -> Result<Orchestrator, AgentError> {
    let executor = Arc::new(ToolExecutor::new(
        build_registry(faq),
        cfg.tools.tool_timeout_secs,
    ));

    let completion_timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let planner = |agent: AgentIdentity| -> Result<Planner, AgentError> {
        let prompt = load_role_prompt(agent, cfg.agents.profile(agent).prompt_path.as_deref());
        Ok(Planner::new(agent, create_llm_from_config(cfg, agent)?, prompt).with_timeout(completion_timeout))
    };

    let agent_loop = AgentLoop::new(executor)
        .with_max_iterations(cfg.agents.max_iterations)
        .with_recovery(RecoveryEngine::new(cfg.agents.fallback_message.clone()));

    Ok(Orchestrator::new(
        planner(AgentIdentity::Information)?,
        planner(AgentIdentity::Action)?,
        agent_loop,
    ))
}
