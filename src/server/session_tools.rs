//! Session lifecycle tools and persistence hooks.

use super::{GatewayServer, OpenBinaryParams, SessionParams, ToolContext, ToolOutput,
    WatchAutoAnalysisParams};
use crate::error::{log_and_sanitize, GatewayError};
use crate::progress::ProgressReporter;
use crate::session::Session;
use crate::worker::proto::{
    GetSessionInfoRequest, OpenBinaryRequest, PlanAndWaitRequest, SaveDatabaseRequest,
};
use crate::worker::WorkerClient;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const OPEN_BINARY_STEPS: f64 = 5.0;
const AUTO_ANALYSIS_POLL: Duration = Duration::from_secs(1);
const WATCH_MIN_INTERVAL: Duration = Duration::from_millis(200);

impl GatewayServer {
    /// Rehydrate persisted sessions at startup, restarting one worker per
    /// snapshot. Sessions whose worker cannot come back are dropped.
    pub async fn restore_sessions(&self) {
        let Some(store) = &self.store else { return };
        let metas = match store.load() {
            Ok(metas) => metas,
            Err(e) => {
                warn!("failed to load persisted sessions: {e}");
                return;
            }
        };
        if metas.is_empty() {
            return;
        }

        info!(count = metas.len(), "restoring sessions from disk");
        for meta in metas {
            let session = match self.registry.restore(&meta) {
                Ok(session) => session,
                Err(e) => {
                    warn!(session_id = %meta.id, "skipping session: {e}");
                    continue;
                }
            };
            if let Err(e) = self.workers.start(&session, &meta.binary_path).await {
                warn!(session_id = %session.id, "failed to restart worker: {e}");
                self.registry.delete(&session.id);
                self.delete_session_state(&session.id);
                self.cache.invalidate(&session.id);
                continue;
            }
            info!(session_id = %session.id, binary = %meta.binary_path.display(), "session restored");
        }
    }

    pub(crate) fn persist_session(&self, session: &Session) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save(&session.metadata()) {
            warn!(session_id = %session.id, "failed to persist session: {e}");
        }
    }

    pub(crate) fn delete_session_state(&self, session_id: &str) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.delete(session_id) {
            warn!(session_id, "failed to delete session state: {e}");
        }
    }

    /// Full teardown of a session and everything allocated for it. Used by
    /// the watchdog and by `open_binary` failure paths; worker-stop errors
    /// are logged, not propagated.
    pub async fn evict_session(&self, session_id: &str) {
        if let Err(e) = self.workers.stop(session_id).await {
            warn!(session_id, "worker stop during eviction: {e}");
        }
        self.registry.delete(session_id);
        self.delete_session_state(session_id);
        self.cache.invalidate(session_id);
        self.progress.clear(session_id);
    }

    pub(crate) async fn open_binary(
        &self,
        params: OpenBinaryParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("open_binary", "", json!({"path": params.path}));
        if params.path.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("path is required".to_string()));
        }

        // One live session per binary: a second open echoes the first.
        if let Some(existing) = self.registry.find_by_binary_path(Path::new(&params.path)) {
            self.progress
                .record(&existing.id, "open_binary", "Session reused", 1.0, 1.0);
            return Ok(ToolOutput::Json(json!({
                "session_id": existing.id,
                "binary_path": existing.binary_path,
                "has_decompiler": existing.has_decompiler(),
                "created_at": existing.created_at.timestamp(),
                "reused": true,
            })));
        }

        let session = self
            .registry
            .create(Path::new(&params.path), self.session_timeout)?;
        let mut progress = self.reporter(&session.id, "open_binary", ctx);

        let mut step = 0.0;
        progress
            .emit("open_binary", "Session created", step, OPEN_BINARY_STEPS)
            .await;
        step += 1.0;
        progress
            .emit("open_binary", "Starting worker", step, OPEN_BINARY_STEPS)
            .await;

        if let Err(e) = self
            .workers
            .start(&session, Path::new(&params.path))
            .await
        {
            error!(session_id = %session.id, "open_binary worker start: {e}");
            self.registry.delete(&session.id);
            self.cache.invalidate(&session.id);
            self.progress.clear(&session.id);
            return Err(GatewayError::WorkerStartFailed(
                "worker start failed".to_string(),
            ));
        }
        step += 1.0;
        progress
            .emit("open_binary", "Connecting to worker", step, OPEN_BINARY_STEPS)
            .await;

        let client = match self.client_for(&session).await {
            Ok(client) => client,
            Err(e) => {
                error!(session_id = %session.id, "open_binary worker client: {e}");
                self.evict_session(&session.id).await;
                return Err(GatewayError::WorkerStartFailed(
                    "worker start failed".to_string(),
                ));
            }
        };
        step += 1.0;
        progress
            .emit("open_binary", "Opening binary in IDA", step, OPEN_BINARY_STEPS)
            .await;

        let resp = match client
            .session_ctrl
            .open_binary(&OpenBinaryRequest {
                binary_path: params.path.clone(),
                auto_analyze: false,
            })
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(session_id = %session.id, "open_binary RPC call: {e}");
                self.evict_session(&session.id).await;
                return Err(GatewayError::WorkerStartFailed(
                    "open_binary RPC call failed".to_string(),
                ));
            }
        };
        if !resp.success {
            error!(session_id = %session.id, "open_binary IDA analysis: {}", resp.error);
            self.evict_session(&session.id).await;
            return Err(GatewayError::WorkerStartFailed(
                "open_binary IDA analysis failed".to_string(),
            ));
        }
        session.set_has_decompiler(resp.has_decompiler);

        let mut auto_state = String::new();
        let mut auto_running = false;
        if let Ok(info) = client
            .session_ctrl
            .get_session_info(&GetSessionInfoRequest {})
            .await
        {
            auto_state = info.auto_state;
            auto_running = info.auto_running;
        }

        self.persist_session(&session);
        progress
            .emit("ready", "Session ready", OPEN_BINARY_STEPS, OPEN_BINARY_STEPS)
            .await;

        let analysis_tip = if auto_running {
            "Auto-analysis is still running. Call run_auto_analysis to block until completion."
        } else {
            "Auto-analysis is disabled. You can now import_il2cpp, set_name, set_function_type, \
             or make other changes, then call run_auto_analysis to refresh the database."
        };

        Ok(ToolOutput::Json(json!({
            "session_id": session.id,
            "binary_path": params.path,
            "has_decompiler": resp.has_decompiler,
            "created_at": session.created_at.timestamp(),
            "auto_state": auto_state,
            "auto_running": auto_running,
            "analysis_tip": analysis_tip,
        })))
    }

    pub(crate) async fn close_binary(
        &self,
        params: SessionParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("close_binary", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;

        // A stop failure leaves the session registered so the client can
        // retry; eviction paths are more forgiving.
        self.workers
            .stop(&session.id)
            .await
            .map_err(|e| log_and_sanitize("close_binary worker stop", e))?;

        self.registry.delete(&session.id);
        self.delete_session_state(&session.id);
        self.cache.invalidate(&session.id);
        self.progress.clear(&session.id);

        Ok(ToolOutput::Json(json!({"success": true})))
    }

    pub(crate) async fn list_sessions(&self) -> Result<ToolOutput, GatewayError> {
        let now = Utc::now();
        let sessions: Vec<Value> = self
            .registry
            .list()
            .into_iter()
            .map(|s| {
                json!({
                    "session_id": s.id,
                    "binary_path": s.binary_path,
                    "created_at": s.created_at.timestamp(),
                    "last_activity": s.last_activity().timestamp(),
                    "age_seconds": (now - s.created_at).num_milliseconds() as f64 / 1000.0,
                    "idle_seconds": (now - s.last_activity()).num_milliseconds() as f64 / 1000.0,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({
            "count": sessions.len(),
            "sessions": sessions,
        })))
    }

    pub(crate) async fn save_database(
        &self,
        params: SessionParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("save_database", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;
        session.touch();

        let client = self.client_for(&session).await?;
        let resp = client
            .session_ctrl
            .save_database(&SaveDatabaseRequest {})
            .await
            .map_err(|e| log_and_sanitize("save_database RPC call", e))?;

        Ok(ToolOutput::Json(json!({
            "success": resp.success,
            "timestamp": resp.timestamp,
            "dirty": resp.dirty,
        })))
    }

    pub(crate) async fn get_session_progress(
        &self,
        params: SessionParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("get_session_progress", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;
        session.touch();

        let snapshot = self.progress.get(&session.id);
        let has_progress = snapshot.is_some();
        let (stage, message, progress_value, total_value, updated_at) = match snapshot {
            Some(s) => (s.stage, s.message, s.progress, s.total, Some(s.updated_at)),
            None => (
                "idle".to_string(),
                "No active operation".to_string(),
                0.0,
                0.0,
                None,
            ),
        };

        let percent = if total_value > 0.0 {
            progress_value / total_value * 100.0
        } else {
            0.0
        };

        // Auto-analysis state is fetched on demand; a dead worker degrades
        // to "unknown" rather than failing the progress probe.
        let mut auto_state = "unknown".to_string();
        let mut auto_running = false;
        if let Ok(client) = self.client_for(&session).await {
            if let Ok(info) = client
                .session_ctrl
                .get_session_info(&GetSessionInfoRequest {})
                .await
            {
                auto_state = info.auto_state;
                auto_running = info.auto_running;
            }
        }

        let now = Utc::now();
        let (last_updated_at, last_updated_ago) = match updated_at {
            Some(at) => (
                at.timestamp(),
                (now - at).num_milliseconds() as f64 / 1000.0,
            ),
            None => (0, -1.0),
        };

        Ok(ToolOutput::Json(json!({
            "session_id": session.id,
            "stage": stage,
            "message": message,
            "progress": progress_value,
            "total": total_value,
            "percent": percent,
            "has_progress": has_progress,
            "auto_state": auto_state,
            "auto_running": auto_running,
            "ready": stage == "ready" && !auto_running,
            "last_updated_at": last_updated_at,
            "last_updated_ago": last_updated_ago,
            "server_timestamp": now.timestamp(),
            "server_time_iso": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "analysis_required": auto_running,
        })))
    }

    pub(crate) async fn run_auto_analysis(
        &self,
        params: SessionParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("run_auto_analysis", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut progress = self.reporter(&session.id, "auto_analysis", ctx);
        progress
            .emit("auto_analysis", "Running plan_and_wait", 0.0, 0.0)
            .await;

        // plan_and_wait blocks inside the worker; poll session info beside
        // it so the client sees state transitions while it runs.
        let plan_client = client.clone();
        let mut plan = tokio::spawn(async move {
            plan_client
                .session_ctrl
                .plan_and_wait(&PlanAndWaitRequest {})
                .await
        });

        let start = Instant::now();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + AUTO_ANALYSIS_POLL,
            AUTO_ANALYSIS_POLL,
        );
        let mut updates: Vec<Value> = Vec::new();
        let mut last_state = String::new();
        let mut last_running = false;

        let plan_resp = loop {
            tokio::select! {
                res = &mut plan => {
                    let resp = match res {
                        Ok(Ok(resp)) => resp,
                        Ok(Err(e)) => {
                            progress
                                .emit("auto_analysis", &format!("plan_and_wait failed: {e}"), 0.0, 0.0)
                                .await;
                            return Err(log_and_sanitize("run_auto_analysis plan_and_wait", e));
                        }
                        Err(e) => {
                            return Err(log_and_sanitize("run_auto_analysis plan_and_wait", e));
                        }
                    };
                    poll_auto_state(
                        &client, &session.id, start, &mut updates,
                        &mut progress, &mut last_state, &mut last_running,
                    )
                    .await;
                    break resp;
                }
                _ = ticker.tick() => {
                    poll_auto_state(
                        &client, &session.id, start, &mut updates,
                        &mut progress, &mut last_state, &mut last_running,
                    )
                    .await;
                }
            }
        };

        progress
            .emit("auto_analysis", "Auto-analysis complete", 1.0, 1.0)
            .await;

        // Auto-analysis redefines functions, strings, everything.
        self.cache.invalidate(&session.id);

        let mut result = json!({
            "session_id": session.id,
            "duration_seconds": plan_resp.duration_seconds,
            "updates": updates,
            "update_count": updates.len(),
            "success": plan_resp.success,
            "auto_state": last_state,
            "auto_running": last_running,
        });
        if !plan_resp.error.is_empty() {
            result["error"] = json!(plan_resp.error);
        }
        Ok(ToolOutput::Json(result))
    }

    pub(crate) async fn watch_auto_analysis(
        &self,
        params: WatchAutoAnalysisParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "watch_auto_analysis",
            &params.session_id,
            json!({"interval_ms": params.interval_ms, "timeout_seconds": params.timeout_seconds}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut interval = Duration::from_millis(params.interval_ms);
        if interval.is_zero() {
            interval = AUTO_ANALYSIS_POLL;
        }
        if interval < WATCH_MIN_INTERVAL {
            interval = WATCH_MIN_INTERVAL;
        }
        let deadline = (params.timeout_seconds > 0)
            .then(|| Instant::now() + Duration::from_secs(params.timeout_seconds));

        let mut progress = self.reporter(&session.id, "auto_analysis", ctx);
        let start = Instant::now();
        let mut updates: Vec<Value> = Vec::new();
        let mut last_state = String::new();
        let mut last_running = false;

        loop {
            let info = client
                .session_ctrl
                .get_session_info(&GetSessionInfoRequest {})
                .await
                .map_err(|e| log_and_sanitize("watch_auto_analysis GetSessionInfo", e))?;
            last_state = info.auto_state;
            last_running = info.auto_running;
            updates.push(json!({
                "timestamp": Utc::now().timestamp(),
                "auto_state": last_state,
                "auto_running": last_running,
                "session_id": session.id,
                "elapsed_seconds": start.elapsed().as_secs_f64(),
            }));
            progress
                .emit(
                    "auto_analysis",
                    &format!("auto_state={last_state} running={last_running}"),
                    0.0,
                    0.0,
                )
                .await;

            if !last_running {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(ToolOutput::Json(json!({
                        "auto_running": true,
                        "auto_state": last_state,
                        "updates": updates,
                        "update_count": updates.len(),
                        "message": format!(
                            "Stopped waiting after {} seconds",
                            params.timeout_seconds
                        ),
                    })));
                }
            }
            tokio::time::sleep(interval).await;
        }

        progress
            .emit("auto_analysis", "Auto-analysis complete", 1.0, 1.0)
            .await;

        Ok(ToolOutput::Json(json!({
            "auto_running": false,
            "auto_state": last_state,
            "updates": updates,
            "update_count": updates.len(),
            "duration_seconds": start.elapsed().as_secs_f64(),
        })))
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_auto_state(
    client: &Arc<WorkerClient>,
    session_id: &str,
    start: Instant,
    updates: &mut Vec<Value>,
    progress: &mut ProgressReporter,
    last_state: &mut String,
    last_running: &mut bool,
) {
    let Ok(info) = client
        .session_ctrl
        .get_session_info(&GetSessionInfoRequest {})
        .await
    else {
        return;
    };
    *last_state = info.auto_state;
    *last_running = info.auto_running;
    updates.push(json!({
        "timestamp": Utc::now().timestamp(),
        "auto_state": *last_state,
        "auto_running": *last_running,
        "session_id": session_id,
        "elapsed_seconds": start.elapsed().as_secs_f64(),
    }));
    progress
        .emit(
            "auto_analysis",
            &format!("auto_state={last_state} running={last_running}"),
            0.0,
            0.0,
        )
        .await;
}
