use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::protocol::McpTool;

/// In-memory cache of `tools/list` results, keyed by server URL.
///
/// An agent asks for the tool list on every model step; entries are evicted
/// after TTL so tools added on the server side eventually show up.
#[derive(Clone)]
pub struct ToolCatalog {
    inner: Cache<String, Arc<Vec<McpTool>>>,
}

impl ToolCatalog {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, server: &str) -> Option<Arc<Vec<McpTool>>> {
        self.inner.get(server).await
    }

    pub async fn insert(&self, server: String, tools: Vec<McpTool>) -> Arc<Vec<McpTool>> {
        let tools = Arc::new(tools);
        self.inner.insert(server, Arc::clone(&tools)).await;
        tools
    }

    pub async fn invalidate(&self, server: &str) {
        self.inner.invalidate(server).await;
    }
}
