//! Test doubles for the model endpoint and the remote tool server.
//!
//! `ScriptedModel` replays a fixed sequence of replies and records every
//! request it receives; `StaticToolset` stands in for the bot platform with
//! canned tool outputs.

use std::collections::VecDeque;

use async_trait::async_trait;
use sbops_models::{ModelRequest, ModelResponse, ToolCall, ToolSpec, Usage};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{AgentError, ToolError};
use crate::model::ModelClient;
use crate::tool::Toolset;

pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, AgentError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(script: Vec<Result<ModelResponse, AgentError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A final text reply with a small token count.
    pub fn text(content: &str) -> ModelResponse {
        ModelResponse {
            content: content.to_string(),
            tool_calls: vec![],
            usage: Usage {
                requests: 0,
                request_tokens: 10,
                response_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    /// A reply that asks for one tool call.
    pub fn tool_call(name: &str, args: Value) -> ModelResponse {
        ModelResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                name: name.to_string(),
                args,
            }],
            usage: Usage {
                requests: 0,
                request_tokens: 10,
                response_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn request(&self, request: &ModelRequest) -> Result<ModelResponse, AgentError> {
        self.requests.lock().await.push(request.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Model("script exhausted".to_string())))
    }
}

/// Remote toolset whose tools always return the same text.
pub struct StaticToolset {
    tools: Vec<(String, String)>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StaticToolset {
    pub fn new(tools: Vec<(&str, &str)>) -> Self {
        Self {
            tools: tools
                .into_iter()
                .map(|(name, output)| (name.to_string(), output.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Toolset for StaticToolset {
    fn name(&self) -> &str {
        "static"
    }

    async fn tool_specs(&self) -> Result<Vec<ToolSpec>, AgentError> {
        Ok(self
            .tools
            .iter()
            .map(|(name, _)| ToolSpec {
                name: name.clone(),
                description: format!("Canned {name}"),
                parameters: json!({"type": "object", "properties": {}}),
            })
            .collect())
    }

    async fn call(&self, tool: &str, args: Value) -> Result<String, ToolError> {
        self.calls.lock().await.push((tool.to_string(), args));
        self.tools
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, output)| output.clone())
            .ok_or_else(|| ToolError::Retry(format!("no such tool: {tool}")))
    }
}
