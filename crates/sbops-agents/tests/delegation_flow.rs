//! End-to-end manager → operator → platform flows with scripted models.
//!
//! Each test scripts both agents' models, wires them the way the binary does
//! (`operator_agent` + `manager_agent`) and checks what the human would see.

use std::sync::Arc;

use sbops_agents::test_support::{ScriptedModel, StaticToolset};
use sbops_agents::{manager_agent, operator_agent, AgentError};
use sbops_models::{ModelResponse, Role, UsageLimits};
use serde_json::json;

struct Team {
    manager: sbops_agents::Agent,
    manager_model: Arc<ScriptedModel>,
    operator_model: Arc<ScriptedModel>,
    platform: Arc<StaticToolset>,
}

fn team(
    manager_script: Vec<Result<ModelResponse, AgentError>>,
    operator_script: Vec<Result<ModelResponse, AgentError>>,
) -> Team {
    let manager_model = Arc::new(ScriptedModel::from_results(manager_script));
    let operator_model = Arc::new(ScriptedModel::from_results(operator_script));
    let platform = Arc::new(StaticToolset::new(vec![
        ("list_bots", "arb-eth: ERROR (3 restarts)\nmm-usdc: RUNNING"),
        ("restart_bot", "restarted"),
        ("bot_logs", "INFO startup complete"),
    ]));

    let operator = Arc::new(operator_agent(
        operator_model.clone(),
        platform.clone(),
        UsageLimits::default(),
    ));
    let manager = manager_agent(manager_model.clone(), operator, 3, UsageLimits::default());

    Team {
        manager,
        manager_model,
        operator_model,
        platform,
    }
}

#[tokio::test]
async fn status_check_reaches_platform() {
    let t = team(
        vec![
            Ok(ScriptedModel::tool_call("check_operations", json!({}))),
            Ok(ScriptedModel::text("arb-eth is failing; mm-usdc is fine.")),
        ],
        vec![
            Ok(ScriptedModel::tool_call("list_bots", json!({}))),
            Ok(ScriptedModel::text("arb-eth has errors and restarted 3 times.")),
        ],
    );

    let result = t.manager.run("How are the bots?", &[], None).await.unwrap();
    assert_eq!(result.output, "arb-eth is failing; mm-usdc is fine.");

    // The operator's summary is what the manager's model saw as tool output
    let tool_message = &result.new_messages[2];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.content, "arb-eth has errors and restarted 3 times.");

    // Usage covers both agents: 2 manager + 2 operator requests
    assert_eq!(result.usage.requests, 4);
    assert_eq!(t.platform.calls().await.len(), 1);
}

#[tokio::test]
async fn restart_reports_boolean_to_manager() {
    let t = team(
        vec![
            Ok(ScriptedModel::tool_call("restart_bot", json!({"bot_name": "arb-eth"}))),
            Ok(ScriptedModel::text("arb-eth was restarted and is healthy.")),
        ],
        vec![
            Ok(ScriptedModel::tool_call("restart_bot", json!({"bot": "arb-eth"}))),
            Ok(ScriptedModel::tool_call("bot_logs", json!({"bot": "arb-eth"}))),
            Ok(ScriptedModel::text("True")),
        ],
    );

    let result = t.manager.run("Restart arb-eth", &[], None).await.unwrap();
    assert_eq!(result.new_messages[2].content, "true");
    assert_eq!(result.output, "arb-eth was restarted and is healthy.");

    let operator_requests = t.operator_model.requests().await;
    assert!(operator_requests[0].messages[0]
        .content
        .contains("restart the bot named 'arb-eth'"));
    // The operator is offered the platform's tools
    assert_eq!(operator_requests[0].tools.len(), 3);
}

#[tokio::test]
async fn restart_failure_is_retried_then_succeeds() {
    let t = team(
        vec![
            Ok(ScriptedModel::tool_call("restart_bot", json!({"bot_name": "arb-eth"}))),
            Ok(ScriptedModel::tool_call("restart_bot", json!({"bot_name": "arb-eth"}))),
            Ok(ScriptedModel::text("Restarted on the second try.")),
        ],
        vec![
            Err(AgentError::Model("upstream 503".to_string())),
            Ok(ScriptedModel::text("healthy")),
        ],
    );

    let result = t.manager.run("Restart arb-eth", &[], None).await.unwrap();
    assert!(result.new_messages[2].content.contains("upstream 503"));
    assert!(result.new_messages[2].content.contains("Fix the errors and try again."));
    assert_eq!(result.new_messages[4].content, "true");
    assert_eq!(result.output, "Restarted on the second try.");
}

#[tokio::test]
async fn restart_gives_up_after_three_retries() {
    let restart = || Ok(ScriptedModel::tool_call("restart_bot", json!({"bot_name": "arb-eth"})));
    let t = team(
        vec![restart(), restart(), restart(), restart()],
        vec![
            Err(AgentError::Timeout(120)),
            Err(AgentError::Timeout(120)),
            Err(AgentError::Timeout(120)),
            Err(AgentError::Timeout(120)),
        ],
    );

    let err = t.manager.run("Restart arb-eth", &[], None).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolRetriesExceeded { ref tool, max: 3 } if tool == "restart_bot"
    ));
    assert_eq!(t.manager_model.remaining().await, 0);
}

#[tokio::test]
async fn status_check_failure_aborts_manager_run() {
    let t = team(
        vec![Ok(ScriptedModel::tool_call("check_operations", json!({})))],
        vec![Err(AgentError::Model("quota exceeded".to_string()))],
    );

    let err = t.manager.run("Status?", &[], None).await.unwrap_err();
    assert!(matches!(err, AgentError::Model(ref msg) if msg == "quota exceeded"));
}
