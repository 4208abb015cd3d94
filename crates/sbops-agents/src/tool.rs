use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sbops_mcp::{McpError, McpServer};
use sbops_models::{ToolSpec, Usage};
use serde_json::Value;

use crate::error::{AgentError, ToolError};

/// Retries allowed for a tool that does not ask for more.
pub const DEFAULT_TOOL_RETRIES: u32 = 1;

/// Usage counters shared by a run and every run it delegates to.
#[derive(Debug, Clone, Default)]
pub struct UsageHandle(Arc<Mutex<Usage>>);

impl UsageHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, usage: Usage) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) += usage;
    }

    pub fn snapshot(&self) -> Usage {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What a tool sees about the run that invoked it.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub usage: UsageHandle,
    /// How many times this tool has already been retried in the current run.
    pub retry: u32,
}

/// A function the model may call. Mockable for testing.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments.
    fn parameters(&self) -> Value;

    fn max_retries(&self) -> u32 {
        DEFAULT_TOOL_RETRIES
    }

    async fn call(&self, ctx: &RunContext, args: Value) -> Result<Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A remote source of tools whose list is only known at run time.
#[async_trait]
pub trait Toolset: Send + Sync {
    fn name(&self) -> &str;

    async fn tool_specs(&self) -> Result<Vec<ToolSpec>, AgentError>;

    async fn call(&self, tool: &str, args: Value) -> Result<String, ToolError>;

    fn max_retries(&self) -> u32 {
        DEFAULT_TOOL_RETRIES
    }
}

#[async_trait]
impl Toolset for McpServer {
    fn name(&self) -> &str {
        self.url()
    }

    async fn tool_specs(&self) -> Result<Vec<ToolSpec>, AgentError> {
        let tools = self.tools().await?;
        Ok(tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                parameters: tool.input_schema.clone(),
            })
            .collect())
    }

    async fn call(&self, tool: &str, args: Value) -> Result<String, ToolError> {
        self.call_tool(tool, args).await.map_err(|e| match e {
            McpError::ToolError(message) => ToolError::Retry(message),
            other => ToolError::Failed(other.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_handle_is_shared_between_clones() {
        let parent = UsageHandle::new();
        let child = parent.clone();

        parent.add(Usage {
            requests: 1,
            request_tokens: 10,
            response_tokens: 2,
            total_tokens: 12,
        });
        child.add(Usage {
            requests: 2,
            request_tokens: 30,
            response_tokens: 6,
            total_tokens: 36,
        });

        assert_eq!(parent.snapshot().requests, 3);
        assert_eq!(parent.snapshot().total_tokens, 48);
        assert_eq!(parent.snapshot(), child.snapshot());
    }
}
