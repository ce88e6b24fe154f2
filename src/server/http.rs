//! Transport front door: three endpoints on one listener.
//!
//! - `/`   streamable HTTP MCP (JSON responses, stateless)
//! - `/sse` legacy SSE compatibility endpoint
//! - `/ws`  WebSocket envelope transport
//!
//! HTTP and SSE get their MCP session handling from rmcp; the WebSocket
//! layer keeps its own connection table.

use super::websocket::{ws_handler, WebSocketManager};
use super::GatewayServer;
use axum::routing::get;
use axum::Router;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Assemble the full router. `ct` cancels server-side SSE streams on
/// shutdown; `bind_addr` is advertised in the SSE endpoint metadata.
pub fn build_router(server: GatewayServer, bind_addr: SocketAddr, ct: CancellationToken) -> Router {
    let streamable = {
        let server = server.clone();
        StreamableHttpService::new(
            move || Ok(server.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: Some(SSE_KEEP_ALIVE),
                stateful_mode: false,
            },
        )
    };

    let (sse_server, sse_router) = SseServer::new(SseServerConfig {
        bind: bind_addr,
        sse_path: "/sse".to_string(),
        post_path: "/sse/message".to_string(),
        ct: ct.child_token(),
        sse_keep_alive: Some(SSE_KEEP_ALIVE),
    });
    {
        let server = server.clone();
        let _ct = sse_server.with_service(move || server.clone());
    }

    let ws_manager = Arc::new(WebSocketManager::new(server));
    {
        let ws_manager = ws_manager.clone();
        let ct = ct.clone();
        tokio::spawn(async move {
            ct.cancelled().await;
            ws_manager.close_all();
        });
    }

    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(ws_manager)
        .merge(sse_router)
        .fallback(axum::routing::any_service(streamable))
}
