//! Error types for the gateway.
//!
//! Tool execution errors are returned with `is_error: true` in
//! `CallToolResult`; protocol errors (unknown tool, malformed arguments) are
//! handled by rmcp. Everything a client sees is sanitized: full error detail
//! stays in the server log.

use rmcp::model::{CallToolResult, Content};
use thiserror::Error;
use tracing::error;

/// Client-observable gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("max sessions ({0}) reached")]
    CapacityExceeded(usize),

    #[error("session {0} already exists")]
    DuplicateId(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("worker start failed: {0}")]
    WorkerStartFailed(String),

    #[error("no worker for session {0}")]
    WorkerGone(String),

    #[error("{0}")]
    Backend(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Convert to an MCP `CallToolResult` with `is_error: true`.
    pub fn to_tool_result(&self) -> CallToolResult {
        CallToolResult {
            content: vec![Content::text(self.to_string())],
            is_error: Some(true),
            meta: None,
            structured_content: None,
        }
    }
}

/// Log the full error server-side and return a sanitized error for the
/// client. Internal detail (file paths, socket addresses, worker output)
/// never crosses the wire.
pub fn log_and_sanitize(context: &str, err: impl std::fmt::Display) -> GatewayError {
    error!("{context}: {err}");
    GatewayError::Backend(format!("{context} failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_error_hides_detail() {
        let err = log_and_sanitize(
            "get_bytes RPC call",
            "dial unix /tmp/ida-worker-deadbeef.sock: connection refused",
        );
        assert_eq!(err.to_string(), "get_bytes RPC call failed");
    }

    #[test]
    fn tool_result_marks_error() {
        let result = GatewayError::SessionNotFound("ab12cd34".to_string()).to_tool_result();
        assert_eq!(result.is_error, Some(true));
    }
}
