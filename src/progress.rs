//! Per-session progress snapshots and MCP progress notifications.
//!
//! Every long-running operation records its latest state into the tracker so
//! `get_session_progress` can answer at any time. When the tool call that
//! started the operation carried a progress token, the reporter additionally
//! pushes notifications on that call's session, clamped to be monotonically
//! non-decreasing.

use chrono::{DateTime, Utc};
use rmcp::model::{ProgressNotificationParam, ProgressToken};
use rmcp::service::{Peer, RoleServer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Latest progress for one session. Last writer wins.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub stage: String,
    pub message: String,
    pub progress: f64,
    pub total: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ProgressTracker {
    inner: Mutex<HashMap<String, ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session_id: &str, stage: &str, message: &str, progress: f64, total: f64) {
        if session_id.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(
            session_id.to_string(),
            ProgressSnapshot {
                stage: stage.to_string(),
                message: message.to_string(),
                progress,
                total,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, session_id: &str) -> Option<ProgressSnapshot> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(session_id).cloned()
    }

    pub fn clear(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.remove(session_id);
    }
}

/// Records progress for one operation and forwards it to the client when the
/// call authorized notifications with a progress token.
pub struct ProgressReporter {
    tracker: Arc<ProgressTracker>,
    session_id: String,
    stage: String,
    peer: Option<Peer<RoleServer>>,
    token: Option<ProgressToken>,
    last: f64,
}

impl ProgressReporter {
    pub fn new(
        tracker: Arc<ProgressTracker>,
        session_id: &str,
        stage: &str,
        peer: Option<Peer<RoleServer>>,
        token: Option<ProgressToken>,
    ) -> Self {
        Self {
            tracker,
            session_id: session_id.to_string(),
            stage: stage.to_string(),
            peer,
            token,
            last: 0.0,
        }
    }

    /// A reporter that only records snapshots, never notifies.
    pub fn detached(tracker: Arc<ProgressTracker>, session_id: &str, stage: &str) -> Self {
        Self::new(tracker, session_id, stage, None, None)
    }

    /// Notified progress never goes backwards, even if the underlying
    /// operation reports a smaller value.
    fn clamped(&mut self, progress: f64) -> f64 {
        if progress < self.last {
            self.last
        } else {
            self.last = progress;
            progress
        }
    }

    /// Record the snapshot and, when authorized, push a progress
    /// notification. An empty `stage` keeps the previous one.
    pub async fn emit(&mut self, stage: &str, message: &str, progress: f64, total: f64) {
        if !stage.is_empty() {
            self.stage = stage.to_string();
        }
        self.tracker
            .record(&self.session_id, &self.stage, message, progress, total);

        let (Some(peer), Some(token)) = (self.peer.clone(), self.token.clone()) else {
            return;
        };
        let progress = self.clamped(progress);
        let param = ProgressNotificationParam {
            progress_token: token.clone(),
            progress,
            total: (total > 0.0).then_some(total),
            message: (!message.is_empty()).then(|| message.to_string()),
        };
        if let Err(e) = peer.notify_progress(param).await {
            warn!(session_id = %self.session_id, "failed to send progress notification: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_get_last_writer_wins() {
        let tracker = ProgressTracker::new();
        tracker.record("s1", "open_binary", "Session created", 0.0, 5.0);
        tracker.record("s1", "open_binary", "Starting worker", 1.0, 5.0);

        let snap = tracker.get("s1").expect("snapshot");
        assert_eq!(snap.stage, "open_binary");
        assert_eq!(snap.message, "Starting worker");
        assert_eq!(snap.progress, 1.0);
        assert_eq!(snap.total, 5.0);
    }

    #[test]
    fn clear_removes_snapshot() {
        let tracker = ProgressTracker::new();
        tracker.record("s1", "ready", "Session ready", 5.0, 5.0);
        tracker.clear("s1");
        assert!(tracker.get("s1").is_none());
    }

    #[test]
    fn empty_session_id_is_ignored() {
        let tracker = ProgressTracker::new();
        tracker.record("", "stage", "msg", 1.0, 1.0);
        assert!(tracker.get("").is_none());
    }

    #[tokio::test]
    async fn emitted_progress_is_clamped_monotonic() {
        let tracker = Arc::new(ProgressTracker::new());
        let mut reporter = ProgressReporter::detached(tracker.clone(), "s1", "auto_analysis");

        assert_eq!(reporter.clamped(2.0), 2.0);
        assert_eq!(reporter.clamped(5.0), 5.0);
        // A regression clamps upward to the last emitted value.
        assert_eq!(reporter.clamped(3.0), 5.0);
        assert_eq!(reporter.clamped(6.0), 6.0);
    }

    #[tokio::test]
    async fn emit_keeps_stage_when_empty() {
        let tracker = Arc::new(ProgressTracker::new());
        let mut reporter = ProgressReporter::detached(tracker.clone(), "s1", "get_strings");

        reporter.emit("", "Enumerated 100 strings", 100.0, 0.0).await;
        let snap = tracker.get("s1").expect("snapshot");
        assert_eq!(snap.stage, "get_strings");

        reporter.emit("ready", "done", 1.0, 1.0).await;
        let snap = tracker.get("s1").expect("snapshot");
        assert_eq!(snap.stage, "ready");
    }
}
