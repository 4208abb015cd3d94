use std::sync::Arc;

use sbops_models::UsageLimits;

use crate::agent::Agent;
use crate::delegation::{CheckOperations, RestartBot};
use crate::model::ModelClient;
use crate::prompts::{manager_system_prompt, operator_system_prompt};
use crate::tool::Toolset;

/// The operator: drives the bot platform through its remote tools.
pub fn operator_agent(
    model: Arc<dyn ModelClient>,
    platform: Arc<dyn Toolset>,
    limits: UsageLimits,
) -> Agent {
    Agent::new("operator", model, operator_system_prompt())
        .with_toolset(platform)
        .with_limits(limits)
}

/// The manager: talks to the human and delegates to the operator.
pub fn manager_agent(
    model: Arc<dyn ModelClient>,
    operator: Arc<Agent>,
    restart_retries: u32,
    limits: UsageLimits,
) -> Agent {
    Agent::new("manager", model, manager_system_prompt())
        .with_tool(Arc::new(CheckOperations::new(Arc::clone(&operator))))
        .with_tool(Arc::new(RestartBot::new(operator, restart_retries)))
        .with_limits(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, StaticToolset};

    #[test]
    fn manager_has_both_delegation_tools() {
        let operator = Arc::new(operator_agent(
            Arc::new(ScriptedModel::new(vec![])),
            Arc::new(StaticToolset::new(vec![])),
            UsageLimits::default(),
        ));
        let manager = manager_agent(
            Arc::new(ScriptedModel::new(vec![])),
            operator,
            3,
            UsageLimits::default(),
        );

        assert_eq!(manager.name(), "manager");
        assert_eq!(manager.tool_names(), vec!["check_operations", "restart_bot"]);
        assert!(manager.system_prompt().contains("hedge fund"));
    }
}
