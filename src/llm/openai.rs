//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。
//! 消息标签联合只在这里转换一次为 chat completions 的请求类型：
//! ToolCall → assistant.tool_calls，ToolResult → tool 角色（带 tool_call_id）。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionResponseMessage, ChatCompletionTool,
    ChatCompletionTools, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{AssistantTurn, LlmClient, LlmError};
use crate::memory::{Message, ToolCall};
use crate::tools::ToolDefinition;

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url)
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.0,
        }
    }

    fn build_request(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(to_openai_messages(system_prompt, history)?)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(to_openai_tools(tools)?);
        }
        builder.build()
    }
}

/// 转为 chat completions 的 messages（首条为 system prompt）
pub fn to_openai_messages(
    system_prompt: &str,
    history: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut out: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
    out.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into(),
    );
    for msg in history {
        let wire: ChatCompletionRequestMessage = match msg {
            Message::System { content } => ChatCompletionRequestSystemMessageArgs::default()
                .content(content.as_str())
                .build()?
                .into(),
            Message::User { content } => ChatCompletionRequestUserMessageArgs::default()
                .content(content.as_str())
                .build()?
                .into(),
            Message::AgentAnswer { content, .. } => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content.as_str())
                .build()?
                .into(),
            Message::ToolCall { calls, .. } => ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(
                    calls
                        .iter()
                        .map(|c| {
                            ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                                id: c.id.clone(),
                                function: FunctionCall {
                                    name: c.name.clone(),
                                    arguments: c.arguments.to_string(),
                                },
                            })
                        })
                        .collect::<Vec<_>>(),
                )
                .build()?
                .into(),
            Message::ToolResult { call_id, content, .. } => ChatCompletionRequestToolMessageArgs::default()
                .content(content.as_str())
                .tool_call_id(call_id.as_str())
                .build()?
                .into(),
        };
        out.push(wire);
    }
    Ok(out)
}

/// 工具声明转为 function 定义
pub fn to_openai_tools(tools: &[ToolDefinition]) -> Result<Vec<ChatCompletionTools>, OpenAIError> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(t.name.as_str())
                .description(t.description.as_str())
                .parameters(t.parameters.clone())
                .build()?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

/// 解析模型返回的消息：有工具调用时只取工具调用，否则取文本
pub fn parse_message(message: &ChatCompletionResponseMessage) -> Result<AssistantTurn, LlmError> {
    let raw_calls = message.tool_calls.as_deref().unwrap_or_default();
    if raw_calls.is_empty() {
        return Ok(AssistantTurn {
            text: message.content.clone(),
            tool_calls: Vec::new(),
        });
    }

    let mut calls = Vec::with_capacity(raw_calls.len());
    for raw in raw_calls {
        let ChatCompletionMessageToolCalls::Function(call) = raw else {
            return Err(LlmError::Protocol("custom tool calls are not supported".to_string()));
        };
        let name = call.function.name.as_str();
        if call.id.is_empty() || name.is_empty() {
            return Err(LlmError::Protocol(format!("tool call missing id or name: {:?}", call)));
        }
        let arguments = parse_arguments(name, &call.function.arguments)?;
        calls.push(ToolCall::new(call.id.as_str(), name, arguments));
    }
    Ok(AssistantTurn::tool_calls(calls))
}

/// 工具参数必须是 JSON 对象；空字符串视为 {}
pub fn parse_arguments(name: &str, raw: &str) -> Result<Value, LlmError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    let arguments: Value = serde_json::from_str(raw)
        .map_err(|e| LlmError::Protocol(format!("arguments of '{name}' are not valid JSON: {e}")))?;
    if !arguments.is_object() {
        return Err(LlmError::Protocol(format!(
            "arguments of '{name}' must be a JSON object"
        )));
    }
    Ok(arguments)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, LlmError> {
        let request = self
            .build_request(system_prompt, history, tools)
            .map_err(|e| LlmError::Request(format!("invalid request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::Protocol("response has no choices".to_string()))?;
        parse_message(&choice.message)
    }
}
