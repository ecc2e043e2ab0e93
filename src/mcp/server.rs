//! MCP server that reads JSON-RPC 2.0 messages from stdin and writes
//! responses to stdout.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::querier::Querier;

use super::tools::{get_tool_definitions, handle_tool_call};
use super::transport::{ErrorCode, JsonRpcRequest, JsonRpcResponse};

/// The MCP server wrapping a querier.
///
/// Every tool call runs under a child of the server's cancellation token, so
/// cancelling the server aborts whichever query is in flight.
pub struct McpServer<Q> {
    client: Q,
    cancel: CancellationToken,
    total_requests: AtomicU64,
    tool_calls: AtomicU64,
}

impl<Q: Querier> McpServer<Q> {
    /// Creates a new MCP server backed by the given querier.
    pub fn new(client: Q, cancel: CancellationToken) -> Self {
        Self {
            client,
            cancel,
            total_requests: AtomicU64::new(0),
            tool_calls: AtomicU64::new(0),
        }
    }

    /// Runs the server over stdio until stdin is closed or the server is
    /// cancelled.
    pub async fn run(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serves newline-delimited JSON-RPC requests from `reader`, writing one
    /// response line per request to `writer`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = lines.next_line() => match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "failed to read request");
                        break;
                    }
                },
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => self.handle_request(&request).await,
                Err(e) => Some(JsonRpcResponse::error(
                    Value::Null,
                    ErrorCode::ParseError,
                    format!("failed to parse JSON-RPC request: {}", e),
                )),
            };

            if let Some(resp) = response {
                let json_line = match serde_json::to_string(&resp) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize response");
                        continue;
                    }
                };
                writer.write_all(json_line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!(
            requests = self.total_requests.load(Ordering::Relaxed),
            tool_calls = self.tool_calls.load(Ordering::Relaxed),
            "mcp server stopped"
        );
        Ok(())
    }

    /// Dispatches a parsed JSON-RPC request to the appropriate handler.
    ///
    /// Returns `None` for notifications, including unknown ones.
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "initialized" | "notifications/initialized" => None,
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => Some(self.handle_tools_call(id, &request.params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            _ if request.is_notification() => None,
            _ => Some(JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("method not found: {}", request.method),
            )),
        }
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "cie",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools = get_tool_definitions();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: &Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                return JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidParams,
                    "missing params for tools/call".to_string(),
                );
            }
        };

        let tool_name = match params.get("name").and_then(|v| v.as_str()) {
            Some(name) => name,
            None => {
                return JsonRpcResponse::error(
                    id,
                    ErrorCode::InvalidParams,
                    "missing 'name' in tools/call params".to_string(),
                );
            }
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        debug!(tool = tool_name, "tool call");

        let cancel = self.cancel.child_token();
        match handle_tool_call(&self.client, &cancel, tool_name, arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                format!("tool execution failed: {}", e),
            ),
        }
    }
}
