//! Client for the remote bot-management tool server, spoken over the MCP
//! HTTP+SSE transport.

pub mod catalog;
pub mod client;
pub mod error;
pub mod protocol;
pub mod sse;

pub use catalog::ToolCatalog;
pub use client::{McpServer, McpServerConfig};
pub use error::McpError;
pub use protocol::{CallToolResult, McpTool};
