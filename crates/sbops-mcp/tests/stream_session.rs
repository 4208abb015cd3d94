//! Session tests against a small MCP server that behaves like the stock SSE
//! transport: every POST is answered `202 Accepted` and the JSON-RPC response
//! is delivered later as a `message` event on the open event stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sbops_mcp::{McpError, McpServer, McpServerConfig};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// What the server does with a request.
enum Reply {
    Result(Value),
    /// End the event stream without answering.
    CloseStream,
}

type Handler = fn(&str, &Value) -> Reply;
type Events = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;
type Posts = Arc<Mutex<Vec<Value>>>;

struct StreamServer {
    url: String,
    posts: Posts,
}

impl StreamServer {
    async fn start(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let events: Events = Arc::default();
        let posts: Posts = Arc::default();

        let accepted = Arc::clone(&posts);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(
                    socket,
                    handler,
                    Arc::clone(&events),
                    Arc::clone(&accepted),
                ));
            }
        });

        Self {
            url: format!("http://{addr}/sse"),
            posts,
        }
    }

    fn config(&self, request_timeout: Duration) -> McpServerConfig {
        McpServerConfig {
            url: self.url.clone(),
            request_timeout,
            connect_timeout: Duration::from_secs(5),
            tool_cache_ttl: Duration::from_secs(60),
        }
    }

    async fn methods(&self) -> Vec<String> {
        self.posts
            .lock()
            .await
            .iter()
            .map(|m| m["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn serve(socket: TcpStream, handler: Handler, events: Events, posts: Posts) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
                return;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        if request_line.starts_with("GET /sse") {
            stream_events(write, events).await;
            return;
        }

        let message: Value = serde_json::from_slice(&body).unwrap();
        posts.lock().await.push(message.clone());
        if write
            .write_all(b"HTTP/1.1 202 Accepted\r\ncontent-length: 8\r\n\r\nAccepted")
            .await
            .is_err()
        {
            return;
        }

        let Some(id) = message.get("id").cloned() else {
            continue;
        };
        let method = message["method"].as_str().unwrap_or_default();
        match handler(method, &message["params"]) {
            Reply::Result(result) => {
                let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
                if let Some(tx) = events.lock().await.as_ref() {
                    let _ = tx.send(format!("event: message\ndata: {response}\n\n"));
                }
            }
            Reply::CloseStream => {
                events.lock().await.take();
            }
        }
    }
}

/// Hold the event stream open, writing one chunk per queued event until the
/// sender is dropped.
async fn stream_events(mut write: OwnedWriteHalf, events: Events) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _ = tx.send("event: endpoint\ndata: /messages/?session_id=s1\n\n".to_string());
    *events.lock().await = Some(tx);

    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                cache-control: no-cache\r\ntransfer-encoding: chunked\r\n\r\n";
    if write.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    while let Some(event) = rx.recv().await {
        let chunk = format!("{:x}\r\n{event}\r\n", event.len());
        if write.write_all(chunk.as_bytes()).await.is_err() {
            return;
        }
    }
    let _ = write.write_all(b"0\r\n\r\n").await;
}

fn platform(method: &str, params: &Value) -> Reply {
    match method {
        "initialize" => Reply::Result(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "silverback", "version": "0.6.0"}
        })),
        "tools/list" => Reply::Result(json!({
            "tools": [{
                "name": "restart_bot",
                "description": "Restart a bot",
                "inputSchema": {"type": "object", "properties": {"bot": {"type": "string"}}}
            }]
        })),
        "tools/call" => Reply::Result(json!({
            "content": [{"type": "text", "text": format!("restarted {}", params["arguments"]["bot"].as_str().unwrap_or("?"))}],
            "isError": false
        })),
        _ => Reply::CloseStream,
    }
}

fn hangs_up_on_calls(method: &str, params: &Value) -> Reply {
    match method {
        "tools/call" => Reply::CloseStream,
        _ => platform(method, params),
    }
}

#[tokio::test]
async fn responses_arrive_on_event_stream() {
    let server = StreamServer::start(platform).await;
    let session = McpServer::connect(server.config(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(session.server_info().unwrap().name, "silverback");

    let tools = session.tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "restart_bot");

    let text = session
        .call_tool("restart_bot", json!({"bot": "arb-eth"}))
        .await
        .unwrap();
    assert_eq!(text, "restarted arb-eth");

    assert_eq!(
        server.methods().await,
        vec!["initialize", "notifications/initialized", "tools/list", "tools/call"]
    );
    session.shutdown().await;
}

#[tokio::test]
async fn refresh_relists_tools() {
    let server = StreamServer::start(platform).await;
    let session = McpServer::connect(server.config(Duration::from_secs(5)))
        .await
        .unwrap();

    session.tools().await.unwrap();
    session.tools().await.unwrap();
    session.refresh_tools().await;
    session.tools().await.unwrap();

    let lists = server
        .methods()
        .await
        .into_iter()
        .filter(|m| m == "tools/list")
        .count();
    assert_eq!(lists, 2);
    session.shutdown().await;
}

#[tokio::test]
async fn stream_close_fails_pending_request() {
    let server = StreamServer::start(hangs_up_on_calls).await;
    let session = McpServer::connect(server.config(Duration::from_secs(30)))
        .await
        .unwrap();

    let started = Instant::now();
    let err = session
        .call_tool("restart_bot", json!({"bot": "arb-eth"}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Disconnected), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));

    // The session stays dead afterwards
    let err = session.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Disconnected), "got {err:?}");
}
