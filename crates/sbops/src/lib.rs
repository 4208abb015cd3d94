//! sbops - fund operations agents
//!
//! A manager agent that talks to a human and delegates cluster status checks
//! and bot restarts to an operator agent, which drives the Silverback bot
//! platform through its MCP tool server.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use sbops::models::SbopsConfig;
//! use sbops::agents::{manager_agent, operator_agent, Agent};
//! use sbops::mcp::{McpServer, McpServerConfig};
//! ```

pub use sbops_agents as agents;
pub use sbops_mcp as mcp;
pub use sbops_models as models;

pub mod repl;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sbops_agents::{build_model, manager_agent, operator_agent, Agent, Toolset};
use sbops_mcp::{McpServer, McpServerConfig};
use sbops_models::{AgentsConfig, SbopsConfig, UsageLimits};
use tracing::info;

/// The connected agents and the platform session they share.
pub struct Team {
    pub manager: Agent,
    pub operator: Arc<Agent>,
    pub platform: Arc<McpServer>,
}

impl Team {
    /// Close the platform session.
    pub async fn shutdown(&self) {
        self.platform.shutdown().await;
    }
}

/// Load configuration from `path`.
///
/// When `required` is false a missing file yields the built-in defaults.
pub fn load_config(path: &Path, required: bool) -> anyhow::Result<SbopsConfig> {
    if !required && !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(SbopsConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Per-run caps from configuration; `0` disables a cap.
pub fn usage_limits(config: &AgentsConfig) -> UsageLimits {
    UsageLimits {
        request_limit: Some(config.request_limit).filter(|&n| n > 0),
        total_tokens_limit: Some(config.total_tokens_limit).filter(|&n| n > 0),
    }
}

/// Connect to the platform and build the operator and manager.
pub async fn connect(config: &SbopsConfig) -> anyhow::Result<Team> {
    let platform = McpServer::connect(McpServerConfig {
        url: config.mcp.url.clone(),
        request_timeout: Duration::from_secs(config.mcp.request_timeout_seconds),
        tool_cache_ttl: Duration::from_secs(config.mcp.tool_cache_ttl_seconds),
        ..McpServerConfig::default()
    })
    .await
    .with_context(|| format!("Failed to connect to MCP server at {}", config.mcp.url))?;
    let platform = Arc::new(platform);

    let limits = usage_limits(&config.agents);

    let operator_model = build_model(config.operator_model(), &config.model)
        .context("Failed to build operator model")?;
    let operator = Arc::new(operator_agent(
        operator_model,
        Arc::clone(&platform) as Arc<dyn Toolset>,
        limits,
    ));

    let manager_model = build_model(config.manager_model(), &config.model)
        .context("Failed to build manager model")?;
    let manager = manager_agent(
        manager_model,
        Arc::clone(&operator),
        config.agents.restart_retries,
        limits,
    );

    info!(
        operator_model = config.operator_model(),
        manager_model = config.manager_model(),
        "Agents ready"
    );

    Ok(Team {
        manager,
        operator,
        platform,
    })
}
