use sbops_models::LimitBreach;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model request failed: {0}")]
    Model(String),

    #[error("Model request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Unknown model provider: {0}")]
    UnknownProvider(String),

    #[error("Missing API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("Usage limit exceeded: {0}")]
    UsageLimitExceeded(LimitBreach),

    #[error("Tool '{tool}' exceeded max retries count of {max}")]
    ToolRetriesExceeded { tool: String, max: u32 },

    #[error("MCP error: {0}")]
    Mcp(#[from] sbops_mcp::McpError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a failed tool call.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Hand the message back to the model and let it try the call again.
    #[error("{0}")]
    Retry(String),

    /// Abort the whole run.
    #[error(transparent)]
    Failed(#[from] AgentError),
}
