pub mod config;
pub mod message;
pub mod run_result;
pub mod usage;

pub use config::{AgentsConfig, McpConfig, ModelConfig, SbopsConfig};
pub use message::{Message, ModelRequest, ModelResponse, Role, ToolCall, ToolSpec};
pub use run_result::RunResult;
pub use usage::{LimitBreach, Usage, UsageLimits};
