//! MCP server implementation.
//!
//! Dispatches JSON-RPC methods to the tool registry and executor, over
//! stdio (one JSON message per line) or HTTP.

use crate::catalog;
use crate::error::McpError;
use crate::executor::{ExecutionResult, ToolExecutor};
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::tools::ToolRegistry;
use cosmo_core::{McpConfig, Transport};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

pub const SERVER_NAME: &str = "cosmosdb-proxy-server";

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    config: McpConfig,
    tools: ToolRegistry,
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a server exposing the full tool catalog.
    pub fn new(config: McpConfig, executor: ToolExecutor) -> Self {
        Self {
            config,
            tools: catalog::registry(),
            executor,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Serve on the configured transport, then close every live connection.
    pub async fn run(&self) -> Result<(), McpError> {
        let result = match self.config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        };
        self.executor.registry().close_all().await;
        result
    }

    /// Run the server with stdio transport until stdin closes.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if let Some(reply) = self.handle_line(&line).await {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, stopping MCP server");
        Ok(())
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self) -> Result<(), McpError> {
        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            "Starting MCP server with HTTP transport"
        );

        let (request_tx, mut request_rx) =
            mpsc::channel::<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>(100);

        let server = self.clone();
        tokio::spawn(async move {
            while let Some((request, response_tx)) = request_rx.recv().await {
                let server = server.clone();
                tokio::spawn(async move {
                    let response = server.handle_request(request).await;
                    let _ = response_tx.send(response).await;
                });
            }
        });

        let http_server = HttpServer::new(self.config.host.clone(), self.config.port, request_tx);
        http_server.run().await
    }

    /// Handle one raw stdio line. Returns the serialized reply, or `None` for
    /// blank lines and notifications.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) if request.is_notification() => {
                tracing::debug!(method = %request.method, "Notification received");
                return None;
            }
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable JSON-RPC message");
                JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {}", e))
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                None
            }
        }
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<ToolDefinition> = self.tools.list().into_iter().cloned().collect();
        match serde_json::to_value(ListToolsResponse { tools }) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        codes::INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    );
                }
            },
            None => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing params"),
        };

        // Unknown tools are a tool-level error, not a protocol error.
        let result = if self.tools.contains(&params.name) {
            self.executor.execute(&params.name, params.arguments).await
        } else {
            let err = McpError::ToolNotFound {
                name: params.name.clone(),
                available: self.tools.names().into_iter().map(String::from).collect(),
            };
            tracing::warn!(tool = %params.name, "Unknown tool requested");
            ExecutionResult::error(err.to_string())
        };

        self.execution_result_to_response(id, result)
    }

    fn execution_result_to_response(
        &self,
        id: Option<Value>,
        result: ExecutionResult,
    ) -> JsonRpcResponse {
        let response = CallToolResponse {
            content: result.content,
            is_error: (!result.success).then_some(true),
        };
        match serde_json::to_value(response) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}
