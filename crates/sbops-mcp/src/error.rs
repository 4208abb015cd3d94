use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid MCP URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("MCP server did not announce a message endpoint: {0}")]
    NoEndpoint(String),

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP request timed out after {0} seconds")]
    Timeout(u64),

    #[error("MCP connection closed")]
    Disconnected,

    #[error("Tool reported an error: {0}")]
    ToolError(String),
}
