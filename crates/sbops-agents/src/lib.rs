pub mod agent;
pub mod delegation;
pub mod error;
pub mod gemini;
pub mod model;
pub mod openai;
pub mod parser;
pub mod prompts;
pub mod team;
pub mod tool;

pub mod test_support;

pub use agent::Agent;
pub use delegation::{CheckOperations, RestartBot};
pub use error::{AgentError, ToolError};
pub use model::{build_model, ModelClient, ModelId, Provider};
pub use team::{manager_agent, operator_agent};
pub use tool::{RunContext, Tool, Toolset, UsageHandle};
