use serde::{Deserialize, Serialize};

/// Top-level configuration for the fund operations agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SbopsConfig {
    pub model: ModelConfig,
    pub mcp: McpConfig,
    pub agents: AgentsConfig,
}

/// Configuration for the language-model endpoint shared by both agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier in `provider:name` form, e.g. `google-gla:gemini-2.0-flash`.
    pub name: String,
    /// Environment variable holding the API key. Not required for local endpoints.
    pub api_key_env: String,
    /// Override the provider's base URL (e.g. a locally hosted inference server).
    pub base_url: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "google-gla:gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            timeout_seconds: 120,
        }
    }
}

/// Configuration for the remote bot-management tool server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    /// SSE endpoint of the MCP server.
    pub url: String,
    /// How long a single JSON-RPC request may wait for its response.
    /// A restart watch can legitimately take several minutes.
    pub request_timeout_seconds: u64,
    /// How long a `tools/list` result is reused before re-listing.
    pub tool_cache_ttl_seconds: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/sse".to_string(),
            request_timeout_seconds: 600,
            tool_cache_ttl_seconds: 60,
        }
    }
}

/// Configuration for the manager and operator agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Override model for the operator. Falls back to `ModelConfig::name`.
    pub operator_model: Option<String>,
    /// Override model for the manager. Falls back to `ModelConfig::name`.
    pub manager_model: Option<String>,
    /// Maximum model requests per run. `0` disables the limit.
    pub request_limit: u32,
    /// Maximum total tokens per run. `0` disables the limit.
    pub total_tokens_limit: u64,
    /// How many times the manager may retry `restart_bot`.
    pub restart_retries: u32,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            operator_model: None,
            manager_model: None,
            request_limit: 50,
            total_tokens_limit: 0,
            restart_retries: 3,
        }
    }
}

impl SbopsConfig {
    pub fn operator_model(&self) -> &str {
        self.agents
            .operator_model
            .as_deref()
            .unwrap_or(&self.model.name)
    }

    pub fn manager_model(&self) -> &str {
        self.agents
            .manager_model
            .as_deref()
            .unwrap_or(&self.model.name)
    }
}
