//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TANDEM__*` 覆盖（双下划线表示嵌套，如 `TANDEM__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::AgentIdentity;
use crate::core::recovery::DEFAULT_FALLBACK_MESSAGE;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agents: AgentsSection,
    pub tools: ToolsSection,
    pub gateway: GatewaySection,
    pub auth: AuthSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 每个会话发给模型的最近轮数（含当前轮）；0 表示不裁剪
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_max_context_turns() -> usize {
    crate::gateway::DEFAULT_MAX_CONTEXT_TURNS
}

/// [llm] 段：后端选择、端点与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 缺少 API Key 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次补全超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agents] 段：循环上限、兜底回复与每个智能体的模型
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
    /// 单次调用内的工具轮数上限
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default)]
    pub information: AgentProfile,
    #[serde(default)]
    pub action: AgentProfile,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            fallback_message: default_fallback_message(),
            information: AgentProfile::default(),
            action: AgentProfile::default(),
        }
    }
}

impl AgentsSection {
    pub fn profile(&self, agent: AgentIdentity) -> &AgentProfile {
        match agent {
            AgentIdentity::Information => &self.information,
            AgentIdentity::Action => &self.action,
        }
    }

    /// 智能体使用的模型；未配置时 information 用 gpt-4o，action 用 gpt-4o-mini
    pub fn model_for(&self, agent: AgentIdentity) -> String {
        self.profile(agent).model.clone().unwrap_or_else(|| {
            match agent {
                AgentIdentity::Information => "gpt-4o",
                AgentIdentity::Action => "gpt-4o-mini",
            }
            .to_string()
        })
    }
}

fn default_max_iterations() -> usize {
    crate::react::DEFAULT_MAX_ITERATIONS
}

fn default_fallback_message() -> String {
    DEFAULT_FALLBACK_MESSAGE.to_string()
}

/// [agents.information] / [agents.action]
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentProfile {
    pub model: Option<String>,
    /// 自定义角色提示文件；读取失败时使用内置提示
    pub prompt_path: Option<PathBuf>,
}

/// [tools] 段：工具超时、FAQ 数据文件
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// FAQ JSON 文件（[{question, answer}]）
    pub faq_path: Option<PathBuf>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            faq_path: None,
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [gateway] 段：监听地址与连接上限
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// FAQ HTTP 接口的监听地址（web feature）
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_connections: default_max_connections(),
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_connections() -> usize {
    1000
}

/// [auth] 段：未设置 jwt_secret 时所有会话都是匿名的
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthSection {
    pub jwt_secret: Option<String>,
}

/// 从 config 目录加载配置，环境变量 TANDEM__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TANDEM__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TANDEM")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.agents.max_iterations, 6);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.gateway.bind_addr, "127.0.0.1:8000");
        assert_eq!(cfg.gateway.max_connections, 1000);
        assert_eq!(cfg.app.max_context_turns, 20);
        assert_eq!(cfg.gateway.http_addr, "127.0.0.1:8080");
        assert!(cfg.auth.jwt_secret.is_none());
        assert_eq!(cfg.agents.model_for(AgentIdentity::Information), "gpt-4o");
        assert_eq!(cfg.agents.model_for(AgentIdentity::Action), "gpt-4o-mini");
    }

    #[test]
    fn test_load_file_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\n\n[agents.action]\nmodel = \"gpt-4.1-mini\"\n\n[gateway]\nmax_connections = 8\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.agents.model_for(AgentIdentity::Action), "gpt-4.1-mini");
        assert_eq!(cfg.agents.model_for(AgentIdentity::Information), "gpt-4o");
        assert_eq!(cfg.gateway.max_connections, 8);
        assert_eq!(cfg.gateway.bind_addr, "127.0.0.1:8000");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("TANDEM__AUTH__JWT_SECRET", "from-env");
        let cfg = load_config(None).unwrap();
        std::env::remove_var("TANDEM__AUTH__JWT_SECRET");
        assert_eq!(cfg.auth.jwt_secret.as_deref(), Some("from-env"));
    }
}
