//! Client for OpenAI-compatible chat-completions endpoints, including
//! locally hosted inference servers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sbops_models::{Message, ModelRequest, ModelResponse, Role, ToolCall, ToolSpec, Usage};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::model::ModelClient;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiModel {
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
    http: Client,
}

impl OpenAiModel {
    pub fn new(
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Model(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            timeout,
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: ChatFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct ChatFunctionCall {
    name: String,
    /// JSON-encoded arguments.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn map_messages(system_prompt: &str, messages: &[Message]) -> Vec<ChatMessage> {
    let mut mapped = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.trim().is_empty() {
        mapped.push(ChatMessage {
            role: "system".to_string(),
            content: Some(system_prompt.to_string()),
            tool_calls: vec![],
            tool_call_id: None,
        });
    }

    for message in messages {
        mapped.push(match message.role {
            Role::User => ChatMessage {
                role: "user".to_string(),
                content: Some(message.content.clone()),
                tool_calls: vec![],
                tool_call_id: None,
            },
            Role::Assistant => ChatMessage {
                role: "assistant".to_string(),
                content: Some(message.content.clone()).filter(|c| !c.is_empty()),
                tool_calls: message
                    .tool_calls
                    .iter()
                    .map(|call| ChatToolCall {
                        id: call.id.clone(),
                        kind: function_type(),
                        function: ChatFunctionCall {
                            name: call.name.clone(),
                            arguments: call.args.to_string(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            },
            Role::Tool => ChatMessage {
                role: "tool".to_string(),
                content: Some(message.content.clone()),
                tool_calls: vec![],
                tool_call_id: message.tool_call_id.clone(),
            },
        });
    }

    mapped
}

fn map_tools(tools: &[ToolSpec]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|tool| ChatTool {
            kind: "function",
            function: ChatFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

#[async_trait]
impl ModelClient for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn request(&self, request: &ModelRequest) -> Result<ModelResponse, AgentError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: map_messages(&request.system_prompt, &request.messages),
            tools: map_tools(&request.tools),
        };
        debug!(model = %self.model, messages = body.messages.len(), "Chat completion request");

        let mut builder = self.http.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.timeout.as_secs())
            } else {
                AgentError::Model(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
            warn!(status = %status, error = %message, "Chat completion failed");
            return Err(AgentError::Model(message));
        }

        let response = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;

        let chat_usage = response.usage.unwrap_or_default();
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AgentError::Model("No choices in response".to_string()))?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| {
                let args = if call.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| json!({ "value": call.function.arguments }))
                };
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    args,
                }
            })
            .collect();

        Ok(ModelResponse {
            content: message.content.unwrap_or_default(),
            tool_calls,
            usage: Usage {
                requests: 0,
                request_tokens: chat_usage.prompt_tokens,
                response_tokens: chat_usage.completion_tokens,
                total_tokens: chat_usage.total_tokens,
            },
        })
    }
}
