//! Dispatcher, transport, and helper tests.
//!
//! The end-to-end scenarios run against a fake worker controller that binds
//! each session's unix socket and serves the Connect routes in-process, so
//! the gateway's real RPC client stack is exercised while the worker's
//! behavior stays scripted. The WebSocket scenarios run over a live
//! listener.

use super::http::build_router;
use super::{
    compile_regex, match_module, normalize_pagination, page, GatewayServer, ToolContext,
    ToolOutput,
};
use crate::error::GatewayError;
use crate::session::{Registry, Session, Store};
use crate::watchdog;
use crate::worker::{Manager, WorkerClient, WorkerController};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

// --- helpers --------------------------------------------------------------

#[test]
fn pagination_defaults_and_caps() {
    assert_eq!(normalize_pagination(None, None).expect("ok"), (0, 1000));
    assert_eq!(normalize_pagination(Some(5), Some(50)).expect("ok"), (5, 50));
    assert_eq!(
        normalize_pagination(Some(0), Some(0)).expect("zero limit -> default"),
        (0, 1000)
    );
    assert!(normalize_pagination(Some(-1), None).is_err());
    assert!(normalize_pagination(None, Some(10001)).is_err());
}

#[test]
fn pagination_law_holds_on_slices() {
    let items: Vec<u32> = (0..10).collect();
    // E(offset=o, limit=L) returns items o..min(o+L, N) in order.
    assert_eq!(page(&items, 0, 4), &[0, 1, 2, 3]);
    assert_eq!(page(&items, 8, 4), &[8, 9]);
    assert_eq!(page(&items, 10, 4), &[] as &[u32]);
    assert_eq!(page(&items, 99, 4), &[] as &[u32]);
    let full = page(&items, 0, 1000);
    assert_eq!(full.len(), 10);
}

#[test]
fn regex_case_sensitivity() {
    let re = compile_regex("alpha", false).expect("ok").expect("some");
    assert!(re.is_match("ALPHA_http"));
    let re = compile_regex("alpha", true).expect("ok").expect("some");
    assert!(!re.is_match("ALPHA_http"));
    assert!(re.is_match("alpha_http"));
    assert!(compile_regex("", false).expect("ok").is_none());
    assert!(compile_regex("(unclosed", false).is_err());
}

#[test]
fn module_filter_matches_substrings() {
    assert!(match_module("libalpha", "alpha", false));
    assert!(match_module("LibAlpha", "alpha", false));
    assert!(!match_module("LibAlpha", "alpha", true));
    assert!(match_module("anything", "", true));
}

#[test]
fn tool_table_has_unique_names_and_schemas() {
    let server_tools = GatewayServer::new(
        Arc::new(Registry::new(1)),
        Arc::new(Manager::new(Path::new("/bin/true"))),
        None,
        Duration::from_secs(60),
        false,
    )
    .tools();

    let mut names: Vec<_> = server_tools.iter().map(|t| t.name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), server_tools.len(), "duplicate tool name");

    for tool in &server_tools {
        assert!(!tool.input_schema.contains_key("$schema"));
        assert!(tool.description.is_some());
    }
}

// --- fake worker ----------------------------------------------------------

/// Mutable state shared between a fake worker's RPC handlers and the test.
#[derive(Default)]
struct FakeWorkerState {
    analyzed: AtomicBool,
    closed: AtomicBool,
    get_functions_calls: AtomicUsize,
    binary_path: Mutex<String>,
}

async fn fake_rpc(state: Arc<FakeWorkerState>, method: &str, body: Value) -> Value {
    match method {
        "ida.worker.v1.SessionControl/OpenBinary" => {
            let path = body["binary_path"].as_str().unwrap_or("").to_string();
            *state.binary_path.lock().expect("lock") = path.clone();
            json!({"success": true, "has_decompiler": true, "binary_path": path, "error": ""})
        }
        "ida.worker.v1.SessionControl/CloseSession" => {
            state.closed.store(true, Ordering::SeqCst);
            json!({"success": true, "error": ""})
        }
        "ida.worker.v1.SessionControl/PlanAndWait" => {
            state.analyzed.store(true, Ordering::SeqCst);
            json!({"success": true, "duration_seconds": 0.1, "error": ""})
        }
        "ida.worker.v1.SessionControl/SaveDatabase" => {
            json!({"success": true, "timestamp": 1700000000, "dirty": false, "error": ""})
        }
        "ida.worker.v1.SessionControl/GetSessionInfo" => {
            json!({
                "binary_path": *state.binary_path.lock().expect("lock"),
                "auto_state": "idle",
                "auto_running": false,
                "has_decompiler": true,
                "error": "",
            })
        }
        "ida.worker.v1.Healthcheck/Ping" => json!({"alive": true}),
        "ida.worker.v1.AnalysisTools/GetFunctions" => {
            state.get_functions_calls.fetch_add(1, Ordering::SeqCst);
            let mut functions = vec![
                json!({"address": 0x1000, "name": "start"}),
                json!({"address": 0x2000, "name": "helper"}),
            ];
            if state.analyzed.load(Ordering::SeqCst) {
                functions.push(json!({"address": 0x3000, "name": "alpha"}));
                functions.push(json!({"address": 0x4000, "name": "beta"}));
            }
            json!({"functions": functions, "error": ""})
        }
        "ida.worker.v1.AnalysisTools/GetImports" => {
            json!({
                "imports": [
                    {"module": "libalpha", "address": 0x4010, "name": "AlphaInit", "ordinal": 1},
                    {"module": "libbeta", "address": 0x4020, "name": "BetaLoop", "ordinal": 2},
                    {"module": "libalpha", "address": 0x4030, "name": "AlphaHelper", "ordinal": 3},
                ],
                "error": "",
            })
        }
        "ida.worker.v1.AnalysisTools/GetExports" => {
            json!({
                "exports": [
                    {"index": 1, "ordinal": 10, "address": 0x5000, "name": "ExportAlpha"},
                    {"index": 2, "ordinal": 11, "address": 0x6000, "name": "ExportBeta"},
                ],
                "error": "",
            })
        }
        "ida.worker.v1.AnalysisTools/GetStrings" => {
            let data = [
                json!({"address": 0x100, "value": "alpha_http"}),
                json!({"address": 0x200, "value": "beta"}),
                json!({"address": 0x300, "value": "gamma"}),
            ];
            let offset = (body["offset"].as_i64().unwrap_or(0).max(0) as usize).min(data.len());
            let limit = body["limit"].as_i64().unwrap_or(0).max(0) as usize;
            let end = if limit == 0 {
                data.len()
            } else {
                (offset + limit).min(data.len())
            };
            let selection = &data[offset..end];
            json!({
                "strings": selection,
                "total": data.len(),
                "offset": offset,
                "count": selection.len(),
                "error": "",
            })
        }
        "ida.worker.v1.AnalysisTools/MakeFunction" => json!({"success": true, "error": ""}),
        "ida.worker.v1.AnalysisTools/SetName" => json!({"success": true, "error": ""}),
        "ida.worker.v1.AnalysisTools/GetXRefsTo" => {
            json!({
                "xrefs": [{"from": 0x1000, "to": body["address"], "type": 1}],
                "error": "",
            })
        }
        "ida.worker.v1.AnalysisTools/GetEntryPoint" => {
            json!({"address": 0x100000, "error": ""})
        }
        "ida.worker.v1.AnalysisTools/GetSegments" => {
            json!({
                "segments": [
                    {"start": 0x100000, "end": 0x101000, "name": ".text", "seg_class": "CODE",
                     "permissions": 5, "bitness": 64},
                    {"start": 0x101000, "end": 0x102000, "name": ".data", "seg_class": "DATA",
                     "permissions": 6, "bitness": 64},
                ],
                "error": "",
            })
        }
        "ida.worker.v1.AnalysisTools/GetDisasm" => {
            json!({"disasm": "mov x0, x0", "error": ""})
        }
        "ida.worker.v1.AnalysisTools/DataReadByte" => json!({"value": 42, "error": ""}),
        _ => json!({"error": format!("unimplemented: {method}")}),
    }
}

struct FakeWorker {
    client: Arc<WorkerClient>,
    state: Arc<FakeWorkerState>,
    server: JoinHandle<()>,
}

/// Worker controller that serves the RPC set in-process over the session's
/// unix socket instead of spawning an external worker.
#[derive(Default)]
struct FakeWorkerManager {
    sessions: Mutex<HashMap<String, Arc<FakeWorker>>>,
    starts: Mutex<HashMap<String, usize>>,
    fail_next_start: AtomicBool,
}

impl FakeWorkerManager {
    fn start_count(&self, binary_path: &str) -> usize {
        *self
            .starts
            .lock()
            .expect("lock")
            .get(binary_path)
            .unwrap_or(&0)
    }

    fn worker_state(&self, session_id: &str) -> Option<Arc<FakeWorkerState>> {
        self.sessions
            .lock()
            .expect("lock")
            .get(session_id)
            .map(|w| w.state.clone())
    }

    /// Drop the worker without going through Stop, simulating a crash.
    fn kill(&self, session_id: &str) {
        if let Some(worker) = self.sessions.lock().expect("lock").remove(session_id) {
            worker.server.abort();
        }
    }
}

#[async_trait]
impl WorkerController for FakeWorkerManager {
    async fn start(
        &self,
        session: &Arc<Session>,
        binary_path: &Path,
    ) -> Result<(), GatewayError> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::WorkerStartFailed("scripted failure".to_string()));
        }

        let _ = std::fs::remove_file(&session.socket_path);
        let listener = tokio::net::UnixListener::bind(&session.socket_path)
            .map_err(|e| GatewayError::WorkerStartFailed(e.to_string()))?;

        let state = Arc::new(FakeWorkerState::default());
        let serve_state = state.clone();
        let server = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = serve_state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move {
                            let method = req.uri().path().trim_start_matches('/').to_string();
                            let body = req
                                .into_body()
                                .collect()
                                .await
                                .map(|b| b.to_bytes())
                                .unwrap_or_default();
                            let body: Value =
                                serde_json::from_slice(&body).unwrap_or(Value::Null);
                            let reply = fake_rpc(state, &method, body).await;
                            let bytes = serde_json::to_vec(&reply).expect("encode reply");
                            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(bytes))))
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        let client = Arc::new(WorkerClient::connect(&session.socket_path));
        session.set_worker_pid(std::process::id());

        let worker = Arc::new(FakeWorker {
            client,
            state,
            server,
        });
        self.sessions
            .lock()
            .expect("lock")
            .insert(session.id.clone(), worker);
        *self
            .starts
            .lock()
            .expect("lock")
            .entry(binary_path.display().to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn stop(&self, session_id: &str) -> Result<(), GatewayError> {
        let worker = self
            .sessions
            .lock()
            .expect("lock")
            .remove(session_id)
            .ok_or_else(|| GatewayError::WorkerGone(session_id.to_string()))?;
        worker.server.abort();
        Ok(())
    }

    async fn get_client(&self, session_id: &str) -> Result<Arc<WorkerClient>, GatewayError> {
        self.sessions
            .lock()
            .expect("lock")
            .get(session_id)
            .map(|w| w.client.clone())
            .ok_or_else(|| GatewayError::WorkerGone(session_id.to_string()))
    }
}

struct Harness {
    server: GatewayServer,
    workers: Arc<FakeWorkerManager>,
    store_dir: tempfile::TempDir,
}

fn harness_with(max_sessions: usize, timeout: Duration) -> Harness {
    let workers = Arc::new(FakeWorkerManager::default());
    let store_dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::new(store_dir.path()).expect("store"));
    let server = GatewayServer::new(
        Arc::new(Registry::new(max_sessions)),
        workers.clone(),
        Some(store),
        timeout,
        false,
    );
    Harness {
        server,
        workers,
        store_dir,
    }
}

fn harness() -> Harness {
    harness_with(10, Duration::from_secs(3600))
}

async fn call(server: &GatewayServer, tool: &str, args: Value) -> Result<Value, GatewayError> {
    let output = server
        .dispatch_tool(tool, args, ToolContext::default())
        .await?;
    Ok(match output {
        ToolOutput::Json(v) => v,
        ToolOutput::Text(t) => Value::String(t),
    })
}

async fn open_session(h: &Harness, path: &str) -> String {
    let resp = call(&h.server, "open_binary", json!({"path": path}))
        .await
        .expect("open_binary");
    resp["session_id"].as_str().expect("session_id").to_string()
}

// --- dispatcher scenarios -------------------------------------------------

#[tokio::test]
async fn open_binary_reuses_active_session() {
    let h = harness();

    let first = call(&h.server, "open_binary", json!({"path": "/tmp/x"}))
        .await
        .expect("first open");
    assert_eq!(first["has_decompiler"], json!(true));
    assert!(first.get("reused").is_none());
    let session_id = first["session_id"].as_str().expect("id");

    let second = call(&h.server, "open_binary", json!({"path": "/tmp/x"}))
        .await
        .expect("second open");
    assert_eq!(second["reused"], json!(true));
    assert_eq!(second["session_id"], json!(session_id));

    // Exactly one worker ever started for this binary.
    assert_eq!(h.workers.start_count("/tmp/x"), 1);

    let listed = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list");
    assert_eq!(listed["count"], json!(1));
}

#[tokio::test]
async fn capacity_limit_rejects_open() {
    let h = harness_with(1, Duration::from_secs(3600));
    open_session(&h, "/tmp/a").await;

    let err = call(&h.server, "open_binary", json!({"path": "/tmp/b"}))
        .await
        .expect_err("registry full");
    assert!(matches!(err, GatewayError::CapacityExceeded(1)));
}

#[tokio::test]
async fn get_functions_paginates_in_order() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let resp = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "limit": 1}),
    )
    .await
    .expect("get_functions");

    assert_eq!(
        resp["functions"],
        json!([{"address": 4096, "name": "start"}])
    );
    assert_eq!(resp["total"], json!(2));
    assert_eq!(resp["offset"], json!(0));
    assert_eq!(resp["count"], json!(1));
    assert_eq!(resp["limit"], json!(1));

    let page2 = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "offset": 1, "limit": 1}),
    )
    .await
    .expect("page 2");
    assert_eq!(
        page2["functions"],
        json!([{"address": 8192, "name": "helper"}])
    );
    assert_eq!(page2["total"], json!(2));
}

#[tokio::test]
async fn get_strings_regex_filters_case_insensitively() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let resp = call(
        &h.server,
        "get_strings",
        json!({"session_id": session_id, "regex": "ALPHA", "case_sensitive": false}),
    )
    .await
    .expect("get_strings");

    assert_eq!(
        resp["strings"],
        json!([{"address": 256, "value": "alpha_http"}])
    );
    assert_eq!(resp["total"], json!(1));
    assert_eq!(resp["count"], json!(1));

    let strict = call(
        &h.server,
        "get_strings",
        json!({"session_id": session_id, "regex": "ALPHA", "case_sensitive": true}),
    )
    .await
    .expect("case sensitive");
    assert_eq!(strict["total"], json!(0));
}

#[tokio::test]
async fn get_imports_filters_by_module_and_regex() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let by_module = call(
        &h.server,
        "get_imports",
        json!({"session_id": session_id, "module": "libalpha"}),
    )
    .await
    .expect("module filter");
    assert_eq!(by_module["total"], json!(2));

    let by_both = call(
        &h.server,
        "get_imports",
        json!({"session_id": session_id, "module": "libalpha", "regex": "Helper"}),
    )
    .await
    .expect("module+regex");
    assert_eq!(by_both["total"], json!(1));
    assert_eq!(by_both["imports"][0]["name"], json!("AlphaHelper"));
}

#[tokio::test]
async fn enumeration_cache_hits_until_invalidated() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;
    let state = h.workers.worker_state(&session_id).expect("state");

    call(&h.server, "get_functions", json!({"session_id": session_id}))
        .await
        .expect("first read");
    call(&h.server, "get_functions", json!({"session_id": session_id}))
        .await
        .expect("cached read");
    assert_eq!(state.get_functions_calls.load(Ordering::SeqCst), 1);

    let made = call(
        &h.server,
        "make_function",
        json!({"session_id": session_id, "address": 0x5000}),
    )
    .await
    .expect("make_function");
    assert_eq!(made["success"], json!(true));

    call(&h.server, "get_functions", json!({"session_id": session_id}))
        .await
        .expect("post-mutation read");
    assert_eq!(
        state.get_functions_calls.load(Ordering::SeqCst),
        2,
        "make_function must force a cache miss"
    );
}

#[tokio::test]
async fn run_auto_analysis_invalidates_every_cache() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let before = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "limit": 10}),
    )
    .await
    .expect("pre-analysis");
    assert_eq!(before["total"], json!(2));

    let analysis = call(
        &h.server,
        "run_auto_analysis",
        json!({"session_id": session_id}),
    )
    .await
    .expect("run_auto_analysis");
    assert_eq!(analysis["success"], json!(true));
    assert!(analysis["update_count"].as_u64().expect("count") >= 1);

    let after = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "limit": 10}),
    )
    .await
    .expect("post-analysis");
    assert_eq!(after["total"], json!(4), "cache must be refetched");
}

#[tokio::test]
async fn watch_auto_analysis_returns_update_log() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let resp = call(
        &h.server,
        "watch_auto_analysis",
        json!({"session_id": session_id, "interval_ms": 50}),
    )
    .await
    .expect("watch");
    assert_eq!(resp["auto_running"], json!(false));
    assert!(resp["update_count"].as_u64().expect("count") >= 1);
}

#[tokio::test]
async fn close_binary_is_idempotent_and_cleans_up() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;
    let meta_path = h.store_dir.path().join(format!("{session_id}.json"));
    assert!(meta_path.exists(), "metadata persisted on open");

    let closed = call(
        &h.server,
        "close_binary",
        json!({"session_id": session_id}),
    )
    .await
    .expect("first close");
    assert_eq!(closed["success"], json!(true));
    assert!(!meta_path.exists(), "metadata removed on close");

    let err = call(
        &h.server,
        "close_binary",
        json!({"session_id": session_id}),
    )
    .await
    .expect_err("second close");
    assert!(matches!(err, GatewayError::SessionNotFound(_)));

    let listed = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list");
    assert_eq!(listed["count"], json!(0));
}

#[tokio::test]
async fn dead_worker_surfaces_sanitized_error() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    h.workers.kill(&session_id);

    let err = call(
        &h.server,
        "get_entry_point",
        json!({"session_id": session_id}),
    )
    .await
    .expect_err("worker is gone");
    assert!(matches!(err, GatewayError::WorkerGone(_)));
}

#[tokio::test]
async fn watchdog_evicts_expired_sessions() {
    let h = harness_with(10, Duration::from_millis(50));
    let session_id = open_session(&h, "/tmp/x").await;
    let meta_path = h.store_dir.path().join(format!("{session_id}.json"));

    let sweeper = watchdog::spawn_with_interval(h.server.clone(), Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(400)).await;
    sweeper.abort();

    let listed = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list");
    assert_eq!(listed["count"], json!(0), "expired session evicted");
    assert!(!meta_path.exists(), "metadata removed by watchdog");
    assert!(
        h.workers.worker_state(&session_id).is_none(),
        "worker stopped by watchdog"
    );
}

#[tokio::test]
async fn open_binary_failure_leaves_no_state() {
    let h = harness();
    h.workers.fail_next_start.store(true, Ordering::SeqCst);

    let err = call(&h.server, "open_binary", json!({"path": "/tmp/broken"}))
        .await
        .expect_err("start fails");
    assert!(matches!(err, GatewayError::WorkerStartFailed(_)));

    let listed = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list");
    assert_eq!(listed["count"], json!(0));

    // A retry after the failure works from a clean slate.
    let resp = call(&h.server, "open_binary", json!({"path": "/tmp/broken"}))
        .await
        .expect("retry succeeds");
    assert!(resp.get("reused").is_none());
}

#[tokio::test]
async fn touch_updates_last_activity() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let before = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list")["sessions"][0]["last_activity"]
        .as_i64()
        .expect("last_activity");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    call(&h.server, "get_segments", json!({"session_id": session_id}))
        .await
        .expect("touching call");

    let after = call(&h.server, "list_sessions", json!({}))
        .await
        .expect("list")["sessions"][0]["last_activity"]
        .as_i64()
        .expect("last_activity");
    assert!(after > before, "tool calls must touch the session");
}

#[tokio::test]
async fn unary_tools_round_trip() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let xrefs = call(
        &h.server,
        "get_xrefs_to",
        json!({"session_id": session_id, "address": 0x2000}),
    )
    .await
    .expect("xrefs");
    assert_eq!(xrefs["count"], json!(1));
    assert_eq!(xrefs["xrefs"][0]["to"], json!(0x2000));

    let segments = call(&h.server, "get_segments", json!({"session_id": session_id}))
        .await
        .expect("segments");
    assert_eq!(segments["count"], json!(2));
    assert_eq!(segments["segments"][0]["class"], json!("CODE"));

    let disasm = call(
        &h.server,
        "get_disasm",
        json!({"session_id": session_id, "address": 0x1000}),
    )
    .await
    .expect("disasm");
    assert_eq!(disasm, json!("mov x0, x0"));

    let byte = call(
        &h.server,
        "data_read_byte",
        json!({"session_id": session_id, "address": 0x100}),
    )
    .await
    .expect("byte");
    assert_eq!(byte["value"], json!(42));

    let named = call(
        &h.server,
        "set_name",
        json!({"session_id": session_id, "address": 0x1000, "name": "entry"}),
    )
    .await
    .expect("set_name");
    assert_eq!(named["success"], json!(true));

    let saved = call(&h.server, "save_database", json!({"session_id": session_id}))
        .await
        .expect("save");
    assert_eq!(saved["success"], json!(true));
}

#[tokio::test]
async fn invalid_arguments_are_rejected() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let err = call(&h.server, "get_functions", json!({"session_id": ""}))
        .await
        .expect_err("empty session id");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));

    let err = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "offset": -1}),
    )
    .await
    .expect_err("negative offset");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));

    let err = call(
        &h.server,
        "get_functions",
        json!({"session_id": session_id, "limit": 20000}),
    )
    .await
    .expect_err("limit over cap");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));

    let err = call(
        &h.server,
        "get_strings",
        json!({"session_id": session_id, "regex": "(unclosed"}),
    )
    .await
    .expect_err("bad regex");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));

    let err = call(
        &h.server,
        "find_binary",
        json!({"session_id": session_id, "pattern": "  "}),
    )
    .await
    .expect_err("blank pattern");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));

    let err = call(&h.server, "no_such_tool", json!({}))
        .await
        .expect_err("unknown tool");
    assert!(matches!(err, GatewayError::InvalidArgument(_)));
}

#[tokio::test]
async fn get_session_progress_reports_ready_state() {
    let h = harness();
    let session_id = open_session(&h, "/tmp/x").await;

    let progress = call(
        &h.server,
        "get_session_progress",
        json!({"session_id": session_id}),
    )
    .await
    .expect("progress");
    assert_eq!(progress["stage"], json!("ready"));
    assert_eq!(progress["auto_running"], json!(false));
    assert_eq!(progress["ready"], json!(true));
    assert_eq!(progress["percent"], json!(100.0));
}

// --- websocket transport --------------------------------------------------

async fn start_ws_server() -> SocketAddr {
    let server = GatewayServer::new(
        Arc::new(Registry::new(4)),
        Arc::new(Manager::new(Path::new("/bin/true"))),
        None,
        Duration::from_secs(3600),
        false,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let router = build_router(server, addr, CancellationToken::new());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

async fn read_text(
    socket: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("frame ok");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("json frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn ws_tools_list_round_trip_with_correlation_id() {
    let addr = start_ws_server().await;
    let (mut socket, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    let envelope = json!({
        "type": "request",
        "id": "t1",
        "request": {"method": "tools/list", "params": {}},
    });
    socket
        .send(Message::Text(envelope.to_string().into()))
        .await
        .expect("send");

    let reply = read_text(&mut socket).await;
    assert_eq!(reply["type"], json!("response"));
    assert_eq!(reply["id"], json!("t1"));
    let tools = reply["response"]["result"]["tools"]
        .as_array()
        .expect("tools array");
    assert!(!tools.is_empty(), "tool list must be non-empty");
}

#[tokio::test]
async fn ws_malformed_json_yields_error_envelope() {
    let addr = start_ws_server().await;
    let (mut socket, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    socket
        .send(Message::Text("{not json".to_string().into()))
        .await
        .expect("send");

    let reply = read_text(&mut socket).await;
    assert_eq!(reply["type"], json!("error"));
    let message = reply["error"]["message"].as_str().expect("message");
    assert!(
        message.starts_with("Failed to parse message JSON"),
        "unexpected error message: {message}"
    );
}

#[tokio::test]
async fn ws_non_request_envelopes_are_ignored() {
    let addr = start_ws_server().await;
    let (mut socket, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    // A response-typed envelope gets no reply; the next request does.
    socket
        .send(Message::Text(
            json!({"type": "response", "id": "stray", "response": {}})
                .to_string()
                .into(),
        ))
        .await
        .expect("send stray");
    socket
        .send(Message::Text(
            json!({
                "type": "request",
                "id": "after",
                "request": {"method": "ping", "params": {}},
            })
            .to_string()
            .into(),
        ))
        .await
        .expect("send ping");

    let reply = read_text(&mut socket).await;
    assert_eq!(reply["id"], json!("after"));
    assert_eq!(reply["type"], json!("response"));
}

#[tokio::test]
async fn ws_tool_errors_come_back_as_tool_results() {
    let addr = start_ws_server().await;
    let (mut socket, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    let envelope = json!({
        "type": "request",
        "id": "t2",
        "request": {
            "method": "tools/call",
            "params": {"name": "get_functions", "arguments": {"session_id": "missing"}},
        },
    });
    socket
        .send(Message::Text(envelope.to_string().into()))
        .await
        .expect("send");

    let reply = read_text(&mut socket).await;
    assert_eq!(reply["type"], json!("response"));
    assert_eq!(reply["id"], json!("t2"));
    assert_eq!(reply["response"]["result"]["isError"], json!(true));
}
