//! Serving transports
//!
//! Two ways to put the bridge on the wire: a streamable-HTTP service nested
//! into an axum router, or plain stdio for hosts spawned directly by an MCP
//! client. Both expect a coordinator that has already scanned.
//!
//! Test with curl:
//! ```bash
//! # Initialize
//! curl -X POST http://localhost:4445/mcp \
//!   -H "Content-Type: application/json" \
//!   -H "Accept: application/json, text/event-stream" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"curl","version":"1.0"}}}'
//!
//! # List tools (session id comes from the initialize response headers)
//! curl -X POST http://localhost:4445/mcp \
//!   -H "Content-Type: application/json" \
//!   -H "Accept: application/json, text/event-stream" \
//!   -H "Mcp-Session-Id: $SESSION" \
//!   -d '{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::lifecycle::Gantry;
use crate::mcp_bridge::GantryMcpBridge;

/// Build the HTTP router: the MCP service under the configured prefix, a
/// debug endpoint beside it, and a JSON 404 for everything else.
pub fn mcp_router(gantry: Arc<Gantry>) -> axum::Router {
    let bridge = GantryMcpBridge::new(gantry.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let prefix = gantry.config().mcp_path_prefix.clone();
    axum::Router::new()
        .nest_service(&prefix, mcp_service)
        .route("/debug", any(debug_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn(log_request_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(gantry)
}

/// Middleware to log HTTP requests
async fn log_request_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::debug!("MCP adapter: {} {}", method, uri);

    next.run(request).await
}

/// Debug endpoint: current lifecycle state and the exposed surface.
async fn debug_handler(State(gantry): State<Arc<Gantry>>) -> impl IntoResponse {
    let config = gantry.config();
    let registrations = match gantry.maps() {
        Some(maps) => json!({
            "hash": maps.compute_hash(),
            "tools": maps.tools().iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
            "resources": maps
                .resources()
                .iter()
                .map(|r| r.template.raw().to_string())
                .collect::<Vec<_>>(),
        }),
        None => json!(null),
    };

    let info = json!({
        "server": config.server_name,
        "state": gantry.state(),
        "mcp_endpoint": config.mcp_path_prefix,
        "auth_required": config.auth_required,
        "registrations": registrations,
    });

    (
        StatusCode::OK,
        [("content-type", "application/json")],
        serde_json::to_string_pretty(&info).unwrap_or_default(),
    )
}

/// Fallback handler
async fn fallback_handler(State(gantry): State<Arc<Gantry>>, request: Request) -> impl IntoResponse {
    let uri = request.uri().clone();
    tracing::warn!("MCP adapter: Unmatched route: {}", uri);

    (
        StatusCode::NOT_FOUND,
        [("content-type", "application/json")],
        format!(
            r#"{{"error": "Not found", "hint": "MCP endpoint is at {}"}}"#,
            gantry.config().mcp_path_prefix
        ),
    )
}

/// Serve the bridge over streamable HTTP at the configured address.
pub async fn serve_http(gantry: Arc<Gantry>) -> anyhow::Result<()> {
    let addr: SocketAddr = gantry.config().bind_addr().parse()?;
    let prefix = gantry.config().mcp_path_prefix.clone();
    let app = mcp_router(gantry);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP adapter listening on http://{}{}", addr, prefix);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Serve the bridge on stdin/stdout.
///
/// Blocks until the client disconnects (stdin EOF) or the process is
/// terminated.
pub async fn serve_stdio(gantry: Arc<Gantry>) -> anyhow::Result<()> {
    let bridge = GantryMcpBridge::new(gantry);
    let running = bridge
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}
