//! Idle-session eviction.

use crate::server::GatewayServer;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the watchdog: every minute, tear down every expired session. Errors
/// during teardown are logged inside the eviction path; the sweep continues.
pub fn spawn(server: GatewayServer) -> JoinHandle<()> {
    spawn_with_interval(server, SWEEP_INTERVAL)
}

pub fn spawn_with_interval(server: GatewayServer, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            for session in server.registry.expired() {
                debug!(session_id = %session.id, "session expired, cleaning up");
                server.evict_session(&session.id).await;
            }
        }
    })
}
