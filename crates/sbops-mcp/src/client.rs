use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::ToolCatalog;
use crate::error::McpError;
use crate::protocol::{
    CallToolResult, Implementation, InitializeResult, JsonRpcMessage, JsonRpcRequest,
    ListToolsResult, McpTool, PROTOCOL_VERSION,
};
use crate::sse::{SseEvent, SseParser};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcMessage>>>>;

/// Connection settings for one MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// The server's SSE URL, e.g. `http://localhost:8000/sse`.
    pub url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub tool_cache_ttl: Duration,
}

impl McpServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/sse".to_string(),
            request_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            tool_cache_ttl: Duration::from_secs(60),
        }
    }
}

/// A live MCP session over the HTTP+SSE transport.
///
/// Requests are POSTed to the endpoint the server announces on the event
/// stream; responses come back on the stream and are matched by id. Servers
/// that answer a POST directly with a JSON body are handled as well.
pub struct McpServer {
    config: McpServerConfig,
    http: Client,
    endpoint: Url,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    catalog: ToolCatalog,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    server_info: Option<Implementation>,
}

impl McpServer {
    /// Open the event stream, wait for the message endpoint and run the
    /// `initialize` handshake.
    pub async fn connect(config: McpServerConfig) -> Result<Self, McpError> {
        let sse_url = Url::parse(&config.url)?;
        info!(url = %sse_url, "Connecting to MCP server");

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        let response = http
            .get(sse_url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        let reader = tokio::spawn(read_events(
            response,
            Arc::clone(&pending),
            Arc::clone(&closed),
            endpoint_tx,
            cancel.clone(),
        ));

        let endpoint = match tokio::time::timeout(config.connect_timeout, endpoint_rx).await {
            Ok(Ok(path)) => sse_url.join(&path),
            Ok(Err(_)) => {
                cancel.cancel();
                return Err(McpError::NoEndpoint(
                    "event stream closed before an endpoint event".to_string(),
                ));
            }
            Err(_) => {
                cancel.cancel();
                return Err(McpError::NoEndpoint(format!(
                    "no endpoint event within {} seconds",
                    config.connect_timeout.as_secs()
                )));
            }
        };
        let endpoint = match endpoint {
            Ok(endpoint) => endpoint,
            Err(e) => {
                cancel.cancel();
                return Err(e.into());
            }
        };
        debug!(endpoint = %endpoint, "MCP message endpoint announced");

        let catalog = ToolCatalog::new(config.tool_cache_ttl);
        let mut server = Self {
            config,
            http,
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            catalog,
            cancel,
            reader: Mutex::new(Some(reader)),
            server_info: None,
        };

        let init = server.initialize().await?;
        server.server_info = init.server_info;
        Ok(server)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result: InitializeResult =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                server_version = %result.protocol_version,
                client_version = PROTOCOL_VERSION,
                "MCP protocol version mismatch"
            );
        }

        self.notify("notifications/initialized", None).await?;
        info!(
            server = ?result.server_info.as_ref().map(|s| &s.name),
            protocol = %result.protocol_version,
            "MCP session initialized"
        );
        Ok(result)
    }

    /// Send a JSON-RPC request and wait for its result.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        debug!(id, method, "MCP request");
        let direct = match self.post(&JsonRpcRequest::request(id, method, params)).await {
            Ok(direct) => direct,
            Err(e) => {
                self.lock_pending().remove(&id);
                return Err(e);
            }
        };

        let response = match direct {
            Some(message) if message.response_id() == Some(id) => {
                self.lock_pending().remove(&id);
                message
            }
            _ => self.wait_for(id, rx).await?,
        };

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        debug!(method, "MCP notification");
        self.post(&JsonRpcRequest::notification(method, params))
            .await
            .map(|_| ())
    }

    /// List every tool the server offers, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Tool list, served from the catalog while fresh.
    pub async fn tools(&self) -> Result<Arc<Vec<McpTool>>, McpError> {
        if let Some(tools) = self.catalog.get(&self.config.url).await {
            return Ok(tools);
        }
        let tools = self.list_tools().await?;
        Ok(self.catalog.insert(self.config.url.clone(), tools).await)
    }

    /// Drop the cached tool list so the next `tools()` re-lists.
    pub async fn refresh_tools(&self) {
        self.catalog.invalidate(&self.config.url).await;
    }

    /// Invoke a tool and return its text output.
    ///
    /// A result flagged `isError` becomes `McpError::ToolError` carrying the
    /// tool's own message.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        info!(tool = name, "Calling MCP tool");
        let params = json!({ "name": name, "arguments": arguments });
        let result: CallToolResult =
            serde_json::from_value(self.request("tools/call", Some(params)).await?)?;

        let text = result.text();
        if result.is_error {
            warn!(tool = name, error = %text, "MCP tool reported an error");
            return Err(McpError::ToolError(text));
        }
        Ok(text)
    }

    /// Stop the event-stream reader and fail any in-flight requests.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!(url = %self.config.url, "MCP session closed");
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<Option<JsonRpcMessage>, McpError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.config.request_timeout)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if !is_json {
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&body).ok())
    }

    async fn wait_for(
        &self,
        id: u64,
        mut rx: oneshot::Receiver<JsonRpcMessage>,
    ) -> Result<JsonRpcMessage, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            self.lock_pending().remove(&id);
            return rx.try_recv().map_err(|_| McpError::Disconnected);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.lock_pending().remove(&id);
                warn!(id, "MCP request timed out");
                Err(McpError::Timeout(self.config.request_timeout.as_secs()))
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcMessage>>> {
        lock(&self.pending)
    }
}

impl Drop for McpServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcMessage>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

async fn read_events(
    response: reqwest::Response,
    pending: Pending,
    closed: Arc<AtomicBool>,
    endpoint_tx: oneshot::Sender<String>,
    cancel: CancellationToken,
) {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut endpoint_tx = Some(endpoint_tx);

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for event in parser.push(&bytes) {
                    route_event(&pending, &mut endpoint_tx, event);
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "MCP event stream failed");
                break;
            }
            None => {
                debug!("MCP event stream closed by server");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiting caller with Disconnected.
    lock(&pending).clear();
}

fn route_event(
    pending: &Pending,
    endpoint_tx: &mut Option<oneshot::Sender<String>>,
    event: SseEvent,
) {
    match event.event.as_str() {
        "endpoint" => {
            if let Some(tx) = endpoint_tx.take() {
                let _ = tx.send(event.data);
            }
        }
        "message" => match serde_json::from_str::<JsonRpcMessage>(&event.data) {
            Ok(message) => match message.response_id() {
                Some(id) => {
                    let waiter = lock(pending).remove(&id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(message);
                        }
                        None => debug!(id, "Response for unknown or abandoned request"),
                    }
                }
                None => debug!(method = ?message.method, "Ignoring server-initiated MCP message"),
            },
            Err(e) => warn!(error = %e, "Unparseable MCP message"),
        },
        other => debug!(event = other, "Ignoring SSE event"),
    }
}
