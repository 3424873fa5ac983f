//! HTTP transport for the MCP server.
//!
//! `POST /mcp` carries one JSON-RPC request per call; `GET /health` reports
//! liveness.

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, codes};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::mpsc;

type RequestSender = mpsc::Sender<(JsonRpcRequest, mpsc::Sender<JsonRpcResponse>)>;

/// HTTP transport handler state.
pub struct HttpTransportState {
    /// Channel for sending requests to the MCP server.
    request_tx: RequestSender,
}

impl HttpTransportState {
    pub fn new(request_tx: RequestSender) -> Self {
        Self { request_tx }
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let (response_tx, mut response_rx) = mpsc::channel(1);

    if state.request_tx.send((request, response_tx)).await.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                codes::INTERNAL_ERROR,
                "MCP server unavailable",
            )),
        );
    }

    match response_rx.recv().await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                codes::INTERNAL_ERROR,
                "No response from MCP server",
            )),
        ),
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "cosmo-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    host: String,
    port: u16,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    pub fn new(host: String, port: u16, request_tx: RequestSender) -> Self {
        Self {
            host,
            port,
            state: Arc::new(HttpTransportState::new(request_tx)),
        }
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "MCP HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }
}
