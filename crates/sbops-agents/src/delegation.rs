//! The manager's tools: thin wrappers that hand an instruction to the
//! operator agent and relay its answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::error::ToolError;
use crate::parser::parse_verdict;
use crate::prompts::{restart_bot_instruction, CHECK_OPERATIONS_INSTRUCTION};
use crate::tool::{RunContext, Tool};

/// Ask the operator for a cluster status report.
pub struct CheckOperations {
    operator: Arc<Agent>,
}

impl CheckOperations {
    pub fn new(operator: Arc<Agent>) -> Self {
        Self { operator }
    }
}

#[async_trait]
impl Tool for CheckOperations {
    fn name(&self) -> &str {
        "check_operations"
    }

    fn description(&self) -> &str {
        "Ask the operator to check the cluster's status, and return any issues"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, ctx: &RunContext, _args: Value) -> Result<Value, ToolError> {
        info!("Manager requested a cluster status check");
        let result = self
            .operator
            .run(CHECK_OPERATIONS_INSTRUCTION, &[], Some(&ctx.usage))
            .await?;
        Ok(Value::String(result.output))
    }
}

/// Have the operator restart one bot and report whether it came up healthy.
pub struct RestartBot {
    operator: Arc<Agent>,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct RestartArgs {
    bot_name: String,
}

impl RestartBot {
    pub fn new(operator: Arc<Agent>, max_retries: u32) -> Self {
        Self {
            operator,
            max_retries,
        }
    }
}

#[async_trait]
impl Tool for RestartBot {
    fn name(&self) -> &str {
        "restart_bot"
    }

    fn description(&self) -> &str {
        "Instruct the operator to restart the bot, and return if it started up healthy or not"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bot_name": {"type": "string", "description": "Name of the bot to restart"}
            },
            "required": ["bot_name"]
        })
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    async fn call(&self, ctx: &RunContext, args: Value) -> Result<Value, ToolError> {
        let args: RestartArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::Retry(format!("Invalid arguments for restart_bot: {e}")))?;

        info!(bot = %args.bot_name, retry = ctx.retry, "Manager requested a bot restart");
        let result = self
            .operator
            .run(&restart_bot_instruction(&args.bot_name), &[], Some(&ctx.usage))
            .await
            .map_err(|e| {
                warn!(bot = %args.bot_name, error = %e, "Operator failed to restart bot");
                ToolError::Retry(e.to_string())
            })?;

        let healthy = parse_verdict(&result.output);
        info!(bot = %args.bot_name, healthy, "Restart finished");
        Ok(Value::Bool(healthy))
    }
}
