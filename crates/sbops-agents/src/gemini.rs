//! Gemini `generateContent` client with function calling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sbops_models::{Message, ModelRequest, ModelResponse, Role, ToolCall, ToolSpec, Usage};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::model::ModelClient;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiModel {
    base_url: String,
    api_key: SecretString,
    model: String,
    timeout: Duration,
    http: Client,
}

impl GeminiModel {
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Model(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: GEMINI_BASE_URL.to_string(),
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

    fn generate_url(&self) -> String {
        let model = self.model.trim();
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model.strip_prefix("models/").unwrap_or(model)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters_json_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Part::default()
    }
}

fn map_tools(tools: &[ToolSpec]) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(vec![GeminiTool {
        function_declarations: tools
            .iter()
            .map(|tool| FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters_json_schema: tool.parameters.clone(),
            })
            .collect(),
    }])
}

/// Gemini wants an object as a function response.
fn function_response_body(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(obj)) => Value::Object(obj),
        Ok(other) => json!({ "result": other }),
        Err(_) => json!({ "result": content }),
    }
}

fn map_contents(messages: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    for message in messages {
        match message.role {
            Role::User => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![text_part(&message.content)],
            }),
            Role::Assistant => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(text_part(&message.content));
                }
                for call in &message.tool_calls {
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        }),
                        ..Part::default()
                    });
                }
                if !parts.is_empty() {
                    contents.push(Content {
                        role: Some("model".to_string()),
                        parts,
                    });
                }
            }
            Role::Tool => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: message.tool_name.clone().unwrap_or_else(|| "tool".to_string()),
                        response: function_response_body(&message.content),
                    }),
                    ..Part::default()
                };

                // All responses to one model turn travel in a single content.
                match contents.last_mut() {
                    Some(last)
                        if last.role.as_deref() == Some("user")
                            && last.parts.iter().all(|p| p.function_response.is_some()) =>
                    {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    contents
}

fn build_request(request: &ModelRequest) -> GenerateContentRequest {
    let system_instruction = if request.system_prompt.trim().is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: vec![text_part(&request.system_prompt)],
        })
    };

    GenerateContentRequest {
        contents: map_contents(&request.messages),
        system_instruction,
        tools: map_tools(&request.tools),
    }
}

fn is_blocked_finish_reason(reason: &str) -> bool {
    matches!(reason, "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")
}

#[async_trait]
impl ModelClient for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn request(&self, request: &ModelRequest) -> Result<ModelResponse, AgentError> {
        let body = build_request(request);
        debug!(model = %self.model, messages = body.contents.len(), "Gemini request");

        let response = self
            .http
            .post(self.generate_url())
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout.as_secs())
                } else {
                    AgentError::Model(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
            warn!(status = %status, error = %message, "Gemini request failed");
            return Err(AgentError::Model(message));
        }

        let response = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AgentError::Model(e.without_url().to_string()))?;

        let metadata = response.usage_metadata.unwrap_or_default();
        let usage = Usage {
            requests: 0,
            request_tokens: metadata.prompt_token_count,
            response_tokens: metadata.candidates_token_count,
            total_tokens: metadata.total_token_count,
        };

        let candidate = response
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .ok_or_else(|| AgentError::Model("No candidates in response".to_string()))?;

        let finish_reason = candidate.finish_reason;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                let args = if call.args.is_object() {
                    call.args
                } else if call.args.is_null() {
                    json!({})
                } else {
                    json!({ "value": call.args })
                };
                tool_calls.push(ToolCall {
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    name: call.name,
                    args,
                });
            }
        }

        if text.is_empty() && tool_calls.is_empty() {
            if let Some(reason) = finish_reason.as_deref().filter(|r| is_blocked_finish_reason(r)) {
                return Err(AgentError::Model(format!("Generation blocked: {reason}")));
            }
        }

        Ok(ModelResponse {
            content: text,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_responses_for_one_turn_are_merged() {
        let first = ToolCall {
            id: "a".to_string(),
            name: "check_operations".to_string(),
            args: json!({}),
        };
        let second = ToolCall {
            id: "b".to_string(),
            name: "restart_bot".to_string(),
            args: json!({"bot_name": "mm-usdc"}),
        };
        let messages = vec![
            Message::user("check and restart mm-usdc"),
            Message::assistant("", vec![first.clone(), second.clone()]),
            Message::tool(&first, "\"no issues\""),
            Message::tool(&second, "true"),
        ];

        let contents = map_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[2].parts.len(), 2);

        let response = contents[2].parts[1].function_response.as_ref().unwrap();
        assert_eq!(response.name, "restart_bot");
        assert_eq!(response.response, json!({"result": true}));
    }

    #[test]
    fn function_response_wraps_plain_text() {
        assert_eq!(
            function_response_body("bot arb-eth: 2 errors"),
            json!({"result": "bot arb-eth: 2 errors"})
        );
        assert_eq!(function_response_body(r#"{"ok": 1}"#), json!({"ok": 1}));
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let request = ModelRequest {
            model: "gemini-2.0-flash".to_string(),
            system_prompt: String::new(),
            messages: vec![Message::user("hi")],
            tools: vec![],
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("tools").is_none());
    }
}
