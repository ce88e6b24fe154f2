//! One-shot MCP message handling for the WebSocket transport.
//!
//! The HTTP and SSE endpoints get full MCP framing from rmcp; WebSocket
//! frames carry a single JSON-RPC message each, so this bridge answers one
//! message with one response over the same dispatcher the other transports
//! use. Progress notifications are not routed through this path - WebSocket
//! calls carry no progress token.

use super::{GatewayServer, ToolContext};
use serde_json::{json, Value};

const JSONRPC_VERSION: &str = "2.0";
const PROTOCOL_VERSION: &str = "2025-03-26";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_REQUEST: i64 = -32600;

/// Handle one MCP JSON-RPC message. Returns `None` for notifications, which
/// expect no reply.
pub(crate) async fn handle_message(server: &GatewayServer, message: &Value) -> Option<Value> {
    let method = message.get("method").and_then(Value::as_str).unwrap_or("");
    if method.starts_with("notifications/") {
        return None;
    }
    let id = message.get("id").cloned().unwrap_or(Value::Null);

    if method.is_empty() {
        return Some(error_response(id, INVALID_REQUEST, "missing method"));
    }

    let params = message.get("params").cloned().unwrap_or(Value::Null);
    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": "ida-mcp-gateway",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
        "ping" => json!({}),
        "tools/list" => {
            let tools = server.tools();
            json!({"tools": tools})
        }
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let args = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            match server
                .dispatch_tool(name, args, ToolContext::default())
                .await
            {
                Ok(output) => json!({
                    "content": [{"type": "text", "text": output.render()}],
                    "isError": false,
                }),
                Err(e) => json!({
                    "content": [{"type": "text", "text": e.to_string()}],
                    "isError": true,
                }),
            }
        }
        _ => {
            return Some(error_response(
                id,
                METHOD_NOT_FOUND,
                &format!("method not found: {method}"),
            ));
        }
    };

    Some(json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    }))
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {"code": code, "message": message},
    })
}
