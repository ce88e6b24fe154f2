//! Worker process lifecycle.
//!
//! Workers outlive the request that spawned them: the child's lifetime is
//! owned by the manager's cancellation token, never by an inbound call, so
//! MCP retries and client disconnects cannot kill a long-running open.

use super::client::WorkerClient;
use super::proto::CloseSessionRequest;
use crate::error::GatewayError;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SOCKET_READY_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLOSE_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// The worker operations the tool dispatcher needs. Kept as a trait so tests
/// can substitute a controller backed by an in-process fake worker.
#[async_trait]
pub trait WorkerController: Send + Sync {
    async fn start(&self, session: &Arc<Session>, binary_path: &Path)
        -> Result<(), GatewayError>;
    async fn stop(&self, session_id: &str) -> Result<(), GatewayError>;
    async fn get_client(&self, session_id: &str) -> Result<Arc<WorkerClient>, GatewayError>;
}

struct WorkerHandle {
    client: Arc<WorkerClient>,
    cancel: CancellationToken,
    exited: watch::Receiver<bool>,
    pid: Option<u32>,
}

type HandleMap = Arc<RwLock<HashMap<String, Arc<WorkerHandle>>>>;

/// Spawns and tracks one worker process per session.
pub struct Manager {
    worker_script: PathBuf,
    handles: HandleMap,
    socket_timeout: Duration,
    quiet_child_io: bool,
}

impl Manager {
    pub fn new(worker_script: &Path) -> Self {
        Self {
            worker_script: worker_script.to_path_buf(),
            handles: Arc::new(RwLock::new(HashMap::new())),
            socket_timeout: SOCKET_READY_TIMEOUT,
            quiet_child_io: false,
        }
    }

    /// Shorter socket-readiness deadline, for tests.
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Discard worker stdout/stderr instead of inheriting it. Used under
    /// test harnesses where orphaned pipe writes confuse the runner.
    pub fn with_quiet_child_io(mut self) -> Self {
        self.quiet_child_io = true;
        self
    }

    fn lookup(&self, session_id: &str) -> Option<Arc<WorkerHandle>> {
        let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
        handles.get(session_id).cloned()
    }

    /// Poll until the socket file exists and accepts a connection.
    async fn wait_for_socket(&self, socket_path: &Path) -> Result<(), GatewayError> {
        let deadline = tokio::time::Instant::now() + self.socket_timeout;
        loop {
            if tokio::net::UnixStream::connect(socket_path).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GatewayError::WorkerStartFailed(format!(
                    "timeout waiting for socket {}",
                    socket_path.display()
                )));
            }
            tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
        }
    }

    fn spawn_monitor(
        session_id: String,
        mut child: tokio::process::Child,
        pid: Option<u32>,
        cancel: CancellationToken,
        exit_tx: watch::Sender<bool>,
        handles: Weak<RwLock<HashMap<String, Arc<WorkerHandle>>>>,
    ) {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    info!(session_id = %session_id, pid, "worker stopped");
                }
                status = child.wait() => {
                    match status {
                        Ok(status) => {
                            info!(session_id = %session_id, pid, %status, "worker exited");
                        }
                        Err(e) => {
                            warn!(session_id = %session_id, pid, "worker wait failed: {e}");
                        }
                    }
                }
            }
            if let Some(handles) = handles.upgrade() {
                let mut handles = handles.write().unwrap_or_else(|e| e.into_inner());
                handles.remove(&session_id);
            }
            let _ = exit_tx.send(true);
        });
    }
}

#[async_trait]
impl WorkerController for Manager {
    async fn start(
        &self,
        session: &Arc<Session>,
        binary_path: &Path,
    ) -> Result<(), GatewayError> {
        // A leftover socket from a previous run would make the readiness
        // probe connect to nothing.
        match tokio::fs::remove_file(&session.socket_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                return Err(GatewayError::WorkerStartFailed(format!(
                    "failed to remove old socket: {e}"
                )));
            }
            _ => {}
        }

        let mut cmd = tokio::process::Command::new(&self.worker_script);
        cmd.arg("--socket")
            .arg(&session.socket_path)
            .arg("--binary")
            .arg(binary_path)
            .arg("--session-id")
            .arg(&session.id)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if self.quiet_child_io {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| GatewayError::WorkerStartFailed(format!("failed to start worker: {e}")))?;
        let pid = child.id();
        if let Some(pid) = pid {
            session.set_worker_pid(pid);
        }
        info!(session_id = %session.id, pid, "worker started");

        if let Err(e) = self.wait_for_socket(&session.socket_path).await {
            // Kill and reap so a half-started worker cannot leak.
            if let Err(kill_err) = child.start_kill() {
                warn!(session_id = %session.id, "failed to kill worker: {kill_err}");
            }
            let _ = child.wait().await;
            return Err(e);
        }

        let client = Arc::new(WorkerClient::connect(&session.socket_path));
        let cancel = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(false);

        let handle = Arc::new(WorkerHandle {
            client,
            cancel: cancel.clone(),
            exited: exit_rx,
            pid,
        });
        {
            let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
            handles.insert(session.id.clone(), handle);
        }

        // Monitor owns the child: reaps it on natural exit and on stop. It
        // holds only a weak reference to the handle map so a lingering child
        // cannot keep the manager alive.
        Self::spawn_monitor(
            session.id.clone(),
            child,
            pid,
            cancel,
            exit_tx,
            Arc::downgrade(&self.handles),
        );

        Ok(())
    }

    async fn stop(&self, session_id: &str) -> Result<(), GatewayError> {
        let handle = self
            .lookup(session_id)
            .ok_or_else(|| GatewayError::WorkerGone(session_id.to_string()))?;

        info!(session_id, pid = handle.pid, "stopping worker");

        // Opportunistic save-and-close; a dead worker just times out here.
        let close = handle
            .client
            .session_ctrl
            .close_session(&CloseSessionRequest { save: true });
        if let Ok(Err(e)) = tokio::time::timeout(CLOSE_RPC_TIMEOUT, close).await {
            warn!(session_id, "close-session RPC failed: {e}");
        }

        handle.cancel.cancel();
        let mut exited = handle.exited.clone();
        while !*exited.borrow() {
            if exited.changed().await.is_err() {
                break;
            }
        }

        // The monitor already removed the entry; this covers the window
        // where stop ran before the monitor was scheduled.
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        handles.remove(session_id);
        Ok(())
    }

    async fn get_client(&self, session_id: &str) -> Result<Arc<WorkerClient>, GatewayError> {
        self.lookup(session_id)
            .map(|h| h.client.clone())
            .ok_or_else(|| GatewayError::WorkerGone(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Registry;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in worker that parses the real argument set and binds the
    /// socket without speaking any RPC.
    fn write_fake_worker(dir: &Path) -> PathBuf {
        let script = r#"#!/usr/bin/env python3
import argparse, os, signal, socket, sys, time
parser = argparse.ArgumentParser()
parser.add_argument("--socket", required=True)
parser.add_argument("--binary", required=True)
parser.add_argument("--session-id", required=True)
args = parser.parse_args()
if os.path.exists(args.socket):
    os.remove(args.socket)
sock = socket.socket(socket.AF_UNIX, socket.SOCK_STREAM)
sock.bind(args.socket)
sock.listen(1)
signal.signal(signal.SIGTERM, lambda s, f: sys.exit(0))
signal.signal(signal.SIGINT, lambda s, f: sys.exit(0))
while True:
    try:
        conn, _ = sock.accept()
        conn.close()
    except Exception:
        time.sleep(0.1)
"#;
        let path = dir.join("fake_worker.py");
        let mut f = std::fs::File::create(&path).expect("create fake worker");
        f.write_all(script.as_bytes()).expect("write fake worker");
        drop(f);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake worker");
        path
    }

    fn process_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn worker_has_independent_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_fake_worker(dir.path());
        let mgr = Manager::new(&script).with_quiet_child_io();

        let registry = Registry::new(4);
        let session = registry
            .create(Path::new("/bin/ls"), Duration::from_secs(60))
            .expect("create session");

        // The caller's request finishing (or being cancelled) must not take
        // the worker down; only Stop does.
        let start = mgr.start(&session, Path::new("/bin/ls"));
        tokio::time::timeout(Duration::from_secs(15), start)
            .await
            .expect("start should not hang")
            .expect("start");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let pid = session.worker_pid().expect("pid recorded");
        assert!(process_alive(pid), "worker {pid} exited prematurely");
        assert!(mgr.get_client(&session.id).await.is_ok());

        mgr.stop(&session.id).await.expect("stop");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!process_alive(pid), "worker {pid} survived stop");
        assert!(matches!(
            mgr.get_client(&session.id).await,
            Err(GatewayError::WorkerGone(_))
        ));
        let _ = std::fs::remove_file(&session.socket_path);
    }

    #[tokio::test]
    async fn start_fails_when_socket_never_appears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("sleepy.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let mgr = Manager::new(&script)
            .with_quiet_child_io()
            .with_socket_timeout(Duration::from_millis(300));

        let registry = Registry::new(4);
        let session = registry
            .create(Path::new("/bin/ls"), Duration::from_secs(60))
            .expect("create session");

        let err = mgr
            .start(&session, Path::new("/bin/ls"))
            .await
            .expect_err("socket never appears");
        assert!(matches!(err, GatewayError::WorkerStartFailed(_)));

        // Socket-wait failures leave no state behind.
        assert!(mgr.get_client(&session.id).await.is_err());
        if let Some(pid) = session.worker_pid() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(!process_alive(pid), "half-started worker leaked");
        }
    }

    #[tokio::test]
    async fn stop_unknown_session_reports_worker_gone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_fake_worker(dir.path());
        let mgr = Manager::new(&script);
        assert!(matches!(
            mgr.stop("deadbeef").await,
            Err(GatewayError::WorkerGone(_))
        ));
    }
}
