use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use sbops_models::{Message, ModelRequest, RunResult, ToolCall, ToolSpec, Usage, UsageLimits};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AgentError, ToolError};
use crate::model::ModelClient;
use crate::tool::{RunContext, Tool, Toolset, UsageHandle, DEFAULT_TOOL_RETRIES};

const RETRY_SUFFIX: &str = "Fix the errors and try again.";

/// A model bound to instructions and a set of tools.
pub struct Agent {
    name: String,
    model: Arc<dyn ModelClient>,
    system_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    toolsets: Vec<Arc<dyn Toolset>>,
    limits: UsageLimits,
}

/// Where a tool offered in the current step lives.
#[derive(Clone, Copy)]
enum ToolSource {
    Local(usize),
    Remote(usize),
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn ModelClient>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            toolsets: Vec::new(),
            limits: UsageLimits::default(),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_toolset(mut self, toolset: Arc<dyn Toolset>) -> Self {
        self.toolsets.push(toolset);
        self
    }

    pub fn with_limits(mut self, limits: UsageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Names of the locally registered tools.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Run the agent on `prompt` with prior conversation `history`.
    ///
    /// Pass the caller's `usage` when delegating so the counters cover the
    /// whole call chain; `None` starts fresh counters.
    pub async fn run(
        &self,
        prompt: &str,
        history: &[Message],
        usage: Option<&UsageHandle>,
    ) -> Result<RunResult, AgentError> {
        let start = Instant::now();
        let usage = usage.cloned().unwrap_or_default();
        let mut new_messages = vec![Message::user(prompt)];
        let mut retries: HashMap<String, u32> = HashMap::new();

        info!(agent = %self.name, history = history.len(), "Agent run started");

        loop {
            let (specs, sources) = self.collect_tools().await?;

            self.limits
                .check_before_request(&usage.snapshot())
                .map_err(AgentError::UsageLimitExceeded)?;

            let request = ModelRequest {
                model: self.model.name().to_string(),
                system_prompt: self.system_prompt.clone(),
                messages: history.iter().chain(new_messages.iter()).cloned().collect(),
                tools: specs,
            };

            let response = self.model.request(&request).await?;
            usage.add(Usage {
                requests: 1,
                ..response.usage
            });
            self.limits
                .check_tokens(&usage.snapshot())
                .map_err(AgentError::UsageLimitExceeded)?;

            new_messages.push(Message::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                let total = usage.snapshot();
                info!(
                    agent = %self.name,
                    requests = total.requests,
                    total_tokens = total.total_tokens,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Agent run finished"
                );
                return Ok(RunResult {
                    output: response.content,
                    new_messages,
                    usage: total,
                });
            }

            for call in &response.tool_calls {
                let content = self.dispatch(call, &sources, &usage, &mut retries).await?;
                new_messages.push(Message::tool(call, content));
            }
        }
    }

    async fn collect_tools(
        &self,
    ) -> Result<(Vec<ToolSpec>, HashMap<String, ToolSource>), AgentError> {
        let mut specs = Vec::new();
        let mut sources = HashMap::new();

        for (i, tool) in self.tools.iter().enumerate() {
            sources.insert(tool.name().to_string(), ToolSource::Local(i));
            specs.push(tool.spec());
        }

        for (i, toolset) in self.toolsets.iter().enumerate() {
            for spec in toolset.tool_specs().await? {
                if sources.contains_key(&spec.name) {
                    warn!(tool = %spec.name, toolset = toolset.name(), "Duplicate tool name ignored");
                    continue;
                }
                sources.insert(spec.name.clone(), ToolSource::Remote(i));
                specs.push(spec);
            }
        }

        Ok((specs, sources))
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        sources: &HashMap<String, ToolSource>,
        usage: &UsageHandle,
        retries: &mut HashMap<String, u32>,
    ) -> Result<String, AgentError> {
        let retry = retries.get(&call.name).copied().unwrap_or(0);
        debug!(agent = %self.name, tool = %call.name, retry, "Dispatching tool call");

        let (outcome, max_retries) = match sources.get(&call.name).copied() {
            Some(ToolSource::Local(i)) => {
                let tool = &self.tools[i];
                let ctx = RunContext {
                    usage: usage.clone(),
                    retry,
                };
                (
                    tool.call(&ctx, call.args.clone()).await.map(render_value),
                    tool.max_retries(),
                )
            }
            Some(ToolSource::Remote(i)) => {
                let toolset = &self.toolsets[i];
                (
                    toolset.call(&call.name, call.args.clone()).await,
                    toolset.max_retries(),
                )
            }
            None => {
                let mut known: Vec<&str> = sources.keys().map(String::as_str).collect();
                known.sort_unstable();
                (
                    Err(ToolError::Retry(format!(
                        "Unknown tool name: '{}'. Available tools: {}",
                        call.name,
                        known.join(", ")
                    ))),
                    DEFAULT_TOOL_RETRIES,
                )
            }
        };

        match outcome {
            Ok(content) => {
                retries.remove(&call.name);
                Ok(content)
            }
            Err(ToolError::Retry(message)) => {
                let attempt = retry + 1;
                if attempt > max_retries {
                    warn!(agent = %self.name, tool = %call.name, max_retries, "Tool out of retries");
                    return Err(AgentError::ToolRetriesExceeded {
                        tool: call.name.clone(),
                        max: max_retries,
                    });
                }
                warn!(
                    agent = %self.name,
                    tool = %call.name,
                    attempt,
                    max_retries,
                    error = %message,
                    "Tool asked for a retry"
                );
                retries.insert(call.name.clone(), attempt);
                Ok(format!("{message}\n\n{RETRY_SUFFIX}"))
            }
            Err(ToolError::Failed(e)) => Err(e),
        }
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
