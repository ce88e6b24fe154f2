//! WebSocket transport: envelope framing over `/ws`.
//!
//! Each frame is a JSON envelope correlating requests to responses by an
//! opaque `id`. Connections are tracked in a manager-owned table; every
//! connection runs a reader loop and a writer task, with all frame writes
//! (messages, pings, the close frame) funneled through the single writer so
//! the sink never sees concurrent writes.

use super::{wire, GatewayServer};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const OUTBOUND_QUEUE_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_WAIT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// The wire envelope. Exactly one payload field is set, matching `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Value>,
}

impl Envelope {
    fn response(id: &str, payload: Value) -> Self {
        Self {
            kind: "response".to_string(),
            id: id.to_string(),
            request: None,
            response: Some(payload),
            error: None,
            notification: None,
        }
    }

    fn error(id: &str, message: &str) -> Self {
        Self {
            kind: "error".to_string(),
            id: id.to_string(),
            request: None,
            response: None,
            error: Some(json!({"message": message})),
            notification: None,
        }
    }
}

/// Per-connection bookkeeping. The outbound sender is the only way to reach
/// the socket; the writer task owns the sink.
pub struct Connection {
    pub id: String,
    cancel: CancellationToken,
    outbound: mpsc::Sender<String>,
    closed: AtomicBool,
    messages_in: AtomicI64,
    messages_out: AtomicI64,
    errors: AtomicI64,
}

impl Connection {
    fn new(id: String, cancel: CancellationToken, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id,
            cancel,
            outbound,
            closed: AtomicBool::new(false),
            messages_in: AtomicI64::new(0),
            messages_out: AtomicI64::new(0),
            errors: AtomicI64::new(0),
        }
    }

    /// Queue a frame for the writer. Drops the frame (with a log line) when
    /// the connection is closed or the queue stays full.
    async fn enqueue(&self, frame: String) {
        if self.closed.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
            debug!(connection = %self.id, "dropping frame for closed connection");
            return;
        }
        match self
            .outbound
            .send_timeout(frame, ENQUEUE_TIMEOUT)
            .await
        {
            Ok(()) => {}
            Err(_) => {
                warn!(connection = %self.id, "outbound queue full, dropping frame");
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Tracks all live WebSocket connections. HTTP and SSE sessions are managed
/// by the MCP library itself and never appear here.
pub struct WebSocketManager {
    server: GatewayServer,
    connections: Mutex<HashMap<String, Arc<Connection>>>,
    next_id: AtomicI64,
}

impl WebSocketManager {
    pub fn new(server: GatewayServer) -> Self {
        Self {
            server,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn active_connections(&self) -> usize {
        let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.len()
    }

    fn next_connection_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("ws-connection-{n}")
    }

    fn register(&self, connection: Arc<Connection>) {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.insert(connection.id.clone(), connection);
    }

    /// Close-once: cancel the loops and drop the table entry. Safe to call
    /// from any path; only the first call does anything.
    fn unregister(&self, connection_id: &str) {
        let entry = {
            let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.remove(connection_id)
        };
        if let Some(connection) = entry {
            if !connection.closed.swap(true, Ordering::SeqCst) {
                connection.cancel.cancel();
                debug!(connection = %connection_id, "connection unregistered");
            }
        }
    }

    /// Close every live connection. Used on server shutdown so open sockets
    /// do not hold up the listener drain.
    pub fn close_all(&self) {
        let ids: Vec<String> = {
            let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.keys().cloned().collect()
        };
        for id in ids {
            self.unregister(&id);
        }
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let connection_id = self.next_connection_id();
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

        let connection = Arc::new(Connection::new(
            connection_id.clone(),
            cancel.clone(),
            outbound_tx,
        ));
        self.register(connection.clone());
        debug!(connection = %connection_id, "websocket connection established");

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(writer_loop(
            sink,
            outbound_rx,
            cancel.clone(),
            connection.clone(),
        ));

        self.reader_loop(stream, &connection).await;

        self.unregister(&connection_id);
        let _ = writer.await;
        debug!(
            connection = %connection_id,
            received = connection.messages_in.load(Ordering::Relaxed),
            sent = connection.messages_out.load(Ordering::Relaxed),
            errors = connection.errors.load(Ordering::Relaxed),
            "websocket connection closed"
        );
    }

    async fn reader_loop(
        &self,
        mut stream: futures::stream::SplitStream<WebSocket>,
        connection: &Arc<Connection>,
    ) {
        // Pings go out every 30s; only a pong extends the deadline. A client
        // that keeps sending data frames but never answers a ping still
        // times out.
        let mut pong_deadline = tokio::time::Instant::now() + PONG_WAIT;
        loop {
            let message = tokio::select! {
                _ = connection.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(pong_deadline) => {
                    warn!(connection = %connection.id, "pong deadline exceeded");
                    break;
                }
                frame = stream.next() => match frame {
                    None => break,
                    Some(Err(e)) => {
                        debug!(connection = %connection.id, "read error: {e}");
                        connection.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(message)) => message,
                },
            };

            let text = match message {
                Message::Text(text) => text.to_string(),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        connection.errors.fetch_add(1, Ordering::Relaxed);
                        let envelope =
                            Envelope::error("", "Failed to parse message JSON: invalid UTF-8");
                        self.send_envelope(connection, &envelope).await;
                        continue;
                    }
                },
                Message::Close(_) => break,
                // Client pings are answered by axum automatically.
                Message::Ping(_) => continue,
                Message::Pong(_) => {
                    pong_deadline = tokio::time::Instant::now() + PONG_WAIT;
                    continue;
                }
            };

            connection.messages_in.fetch_add(1, Ordering::Relaxed);
            self.process_frame(connection, &text).await;
        }
    }

    async fn process_frame(&self, connection: &Arc<Connection>, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                connection.errors.fetch_add(1, Ordering::Relaxed);
                let reply = Envelope::error("", &format!("Failed to parse message JSON: {e}"));
                self.send_envelope(connection, &reply).await;
                return;
            }
        };

        if envelope.kind != "request" {
            debug!(
                connection = %connection.id,
                kind = %envelope.kind,
                "ignoring non-request envelope"
            );
            return;
        }

        let request = envelope.request.unwrap_or(Value::Null);
        match wire::handle_message(&self.server, &request).await {
            Some(response) => {
                let reply = Envelope::response(&envelope.id, response);
                self.send_envelope(connection, &reply).await;
            }
            None => {}
        }
    }

    async fn send_envelope(&self, connection: &Arc<Connection>, envelope: &Envelope) {
        match serde_json::to_string(envelope) {
            Ok(frame) => connection.enqueue(frame).await,
            Err(e) => {
                warn!(connection = %connection.id, "failed to marshal envelope: {e}");
                connection.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Drains the outbound queue and keeps the connection alive with pings. Any
/// write failure cancels the connection. Sends the closing frame on the way
/// out, so every write to the sink happens on this task.
async fn writer_loop(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
    connection: Arc<Connection>,
) {
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + PING_INTERVAL,
        PING_INTERVAL,
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let write = sink.send(Message::Text(frame.into()));
                match tokio::time::timeout(WRITE_TIMEOUT, write).await {
                    Ok(Ok(())) => {
                        connection.messages_out.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        warn!(connection = %connection.id, "write failed: {e}");
                        connection.errors.fetch_add(1, Ordering::Relaxed);
                        cancel.cancel();
                        break;
                    }
                    Err(_) => {
                        warn!(connection = %connection.id, "write timed out");
                        connection.errors.fetch_add(1, Ordering::Relaxed);
                        cancel.cancel();
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                let write = sink.send(Message::Ping(Vec::new().into()));
                match tokio::time::timeout(WRITE_TIMEOUT, write).await {
                    Ok(Ok(())) => {}
                    _ => {
                        warn!(connection = %connection.id, "ping failed");
                        connection.errors.fetch_add(1, Ordering::Relaxed);
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    let close = sink.send(Message::Close(Some(CloseFrame {
        code: axum::extract::ws::close_code::NORMAL,
        reason: "Server closing connection".into(),
    })));
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, close).await;
}

/// Upgrade handler for `/ws`. All origins are accepted (trust-local).
pub async fn ws_handler(
    State(manager): State<Arc<WebSocketManager>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| manager.handle_socket(socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Registry;
    use crate::worker::Manager;
    use std::path::Path;

    fn manager() -> WebSocketManager {
        let server = GatewayServer::new(
            Arc::new(Registry::new(2)),
            Arc::new(Manager::new(Path::new("/bin/true"))),
            None,
            Duration::from_secs(60),
            false,
        );
        WebSocketManager::new(server)
    }

    fn round_trip(envelope: &Envelope) -> Envelope {
        let encoded = serde_json::to_string(envelope).expect("serialize");
        serde_json::from_str(&encoded).expect("parse")
    }

    #[test]
    fn envelope_round_trips_every_variant() {
        let request = Envelope {
            kind: "request".to_string(),
            id: "t1".to_string(),
            request: Some(json!({"method": "tools/list", "params": {}})),
            response: None,
            error: None,
            notification: None,
        };
        assert_eq!(round_trip(&request), request);

        let response = Envelope::response("t1", json!({"result": {"tools": []}}));
        assert_eq!(round_trip(&response), response);

        let error = Envelope::error("t2", "Failed to parse message JSON");
        assert_eq!(round_trip(&error), error);

        let notification = Envelope {
            kind: "notification".to_string(),
            id: String::new(),
            request: None,
            response: None,
            error: None,
            notification: Some(json!({"method": "notifications/progress"})),
        };
        assert_eq!(round_trip(&notification), notification);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let error = Envelope::error("", "bad frame");
        let encoded = serde_json::to_value(&error).expect("serialize");
        let map = encoded.as_object().expect("object");
        assert!(!map.contains_key("id"));
        assert!(!map.contains_key("request"));
        assert!(!map.contains_key("response"));
        assert!(!map.contains_key("notification"));
        assert_eq!(map["type"], "error");
    }

    #[test]
    fn connection_ids_are_sequential() {
        let manager = manager();
        assert_eq!(manager.next_connection_id(), "ws-connection-1");
        assert_eq!(manager.next_connection_id(), "ws-connection-2");
    }

    #[tokio::test]
    async fn register_and_unregister_track_counts() {
        let manager = manager();
        assert_eq!(manager.active_connections(), 0);

        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(8);
        let connection = Arc::new(Connection::new(
            "ws-connection-9".to_string(),
            cancel.clone(),
            tx,
        ));
        manager.register(connection.clone());
        assert_eq!(manager.active_connections(), 1);

        manager.unregister("ws-connection-9");
        assert_eq!(manager.active_connections(), 0);
        assert!(cancel.is_cancelled());

        // Unregistering again is a no-op.
        manager.unregister("ws-connection-9");
        assert_eq!(manager.active_connections(), 0);
    }

    #[tokio::test]
    async fn enqueue_after_close_drops_frame() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(8);
        let connection = Connection::new("ws-connection-1".to_string(), cancel, tx);

        connection.enqueue("hello".to_string()).await;
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        connection.closed.store(true, Ordering::SeqCst);
        connection.enqueue("late".to_string()).await;
        assert!(rx.try_recv().is_err(), "closed connection must not enqueue");
    }
}
