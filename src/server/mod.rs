//! MCP tool dispatcher.
//!
//! Every tool follows the same template: log the invocation, validate the
//! required arguments, resolve the session, touch it, obtain the worker
//! client, and translate the call into a worker RPC. List tools read through
//! the session cache and paginate/filter on the gateway side; mutating tools
//! invalidate the cache on success.

pub mod http;
mod import_tools;
mod params;
mod read_tools;
mod search_tools;
mod session_tools;
#[cfg(test)]
mod tests;
pub mod websocket;
mod wire;
mod write_tools;

pub use params::*;

use crate::cache::CacheMap;
use crate::error::GatewayError;
use crate::progress::{ProgressReporter, ProgressTracker};
use crate::session::{Registry, Session, Store};
use crate::worker::{WorkerClient, WorkerController};
use regex::Regex;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam,
    ProgressToken, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::schemars::{schema_for, JsonSchema};
use rmcp::service::{Peer, RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) const DEFAULT_PAGE_LIMIT: usize = 1000;
pub(crate) const MAX_PAGE_LIMIT: usize = 10000;

/// The gateway's MCP server: session registry, worker controller, cache,
/// progress tracker, and persistence wired behind one tool surface.
#[derive(Clone)]
pub struct GatewayServer {
    pub(crate) registry: Arc<Registry>,
    pub(crate) workers: Arc<dyn WorkerController>,
    pub(crate) store: Option<Arc<Store>>,
    pub(crate) cache: Arc<CacheMap>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) session_timeout: Duration,
    pub debug: bool,
}

/// Per-call channel back to the client, for progress notifications.
#[derive(Default)]
pub struct ToolContext {
    pub peer: Option<Peer<RoleServer>>,
    pub progress_token: Option<ProgressToken>,
}

/// A tool's payload: either a JSON document or raw text (disassembly,
/// pseudocode, comments).
pub enum ToolOutput {
    Json(Value),
    Text(String),
}

impl ToolOutput {
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ToolOutput::Text(text) => text.clone(),
        }
    }
}

impl GatewayServer {
    pub fn new(
        registry: Arc<Registry>,
        workers: Arc<dyn WorkerController>,
        store: Option<Arc<Store>>,
        session_timeout: Duration,
        debug: bool,
    ) -> Self {
        Self {
            registry,
            workers,
            store,
            cache: Arc::new(CacheMap::new()),
            progress: Arc::new(ProgressTracker::new()),
            session_timeout,
            debug,
        }
    }

    fn instructions(&self) -> String {
        "Multi-session gateway for headless IDA binary analysis.\n\n\
         Workflow:\n\
         1. open_binary: Open a binary for analysis. Each binary gets its own worker\n\
            process; reopening the same path reuses the existing session.\n\
         2. Pass the returned session_id to every other tool.\n\
         3. run_auto_analysis / watch_auto_analysis: Finish IDA auto-analysis before\n\
            relying on xrefs or decompilation.\n\
         4. close_binary: Close the session when done (the database is saved).\n\n\
         Enumerations (get_functions, get_imports, get_exports, get_strings) are\n\
         cached per session and support offset/limit pagination plus regex filters.\n\
         Sessions idle past their timeout are evicted automatically."
            .to_string()
    }

    /// Resolve a session id argument, rejecting empty ids before the lookup.
    pub(crate) fn session(&self, session_id: &str) -> Result<Arc<Session>, GatewayError> {
        if session_id.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "session_id is required".to_string(),
            ));
        }
        self.registry
            .get(session_id)
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }

    pub(crate) async fn client_for(
        &self,
        session: &Session,
    ) -> Result<Arc<WorkerClient>, GatewayError> {
        self.workers.get_client(&session.id).await
    }

    pub(crate) fn reporter(
        &self,
        session_id: &str,
        stage: &str,
        ctx: &ToolContext,
    ) -> ProgressReporter {
        ProgressReporter::new(
            self.progress.clone(),
            session_id,
            stage,
            ctx.peer.clone(),
            ctx.progress_token.clone(),
        )
    }

    pub(crate) fn log_tool(&self, tool: &str, session_id: &str, details: Value) {
        if session_id.is_empty() {
            info!(tool, args = %details, "tool call");
        } else {
            info!(tool, session_id, args = %details, "tool call");
        }
    }

    /// Route one tool invocation. `args` is the raw JSON argument object.
    pub async fn dispatch_tool(
        &self,
        name: &str,
        args: Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        match name {
            "open_binary" => self.open_binary(parse(args)?, &ctx).await,
            "close_binary" => self.close_binary(parse(args)?).await,
            "list_sessions" => self.list_sessions().await,
            "save_database" => self.save_database(parse(args)?).await,
            "get_session_progress" => self.get_session_progress(parse(args)?).await,
            "run_auto_analysis" => self.run_auto_analysis(parse(args)?, &ctx).await,
            "watch_auto_analysis" => self.watch_auto_analysis(parse(args)?, &ctx).await,

            "get_functions" => self.get_functions(parse(args)?, &ctx).await,
            "get_imports" => self.get_imports(parse(args)?, &ctx).await,
            "get_exports" => self.get_exports(parse(args)?, &ctx).await,
            "get_strings" => self.get_strings(parse(args)?, &ctx).await,

            "get_bytes" => self.get_bytes(parse(args)?).await,
            "get_disasm" => self.get_disasm(parse(args)?).await,
            "get_function_disasm" => self.get_function_disasm(parse(args)?).await,
            "get_decompiled_func" => self.get_decompiled_func(parse(args)?).await,
            "get_comment" => self.get_comment(parse(args)?).await,
            "get_func_comment" => self.get_func_comment(parse(args)?).await,
            "get_name" => self.get_name(parse(args)?).await,
            "get_function_name" => self.get_function_name(parse(args)?).await,
            "get_function_info" => self.get_function_info(parse(args)?).await,
            "get_segments" => self.get_segments(parse(args)?).await,
            "get_entry_point" => self.get_entry_point(parse(args)?).await,
            "get_dword_at" => self.get_dword_at(parse(args)?).await,
            "get_qword_at" => self.get_qword_at(parse(args)?).await,
            "get_instruction_length" => self.get_instruction_length(parse(args)?).await,
            "get_globals" => self.get_globals(parse(args)?).await,
            "get_type_at" => self.get_type_at(parse(args)?).await,
            "list_structs" => self.list_structs(parse(args)?).await,
            "get_struct" => self.get_struct(parse(args)?).await,
            "list_enums" => self.list_enums(parse(args)?).await,
            "get_enum" => self.get_enum(parse(args)?).await,

            "get_xrefs_to" => self.get_xrefs_to(parse(args)?).await,
            "get_xrefs_from" => self.get_xrefs_from(parse(args)?).await,
            "get_data_refs" => self.get_data_refs(parse(args)?).await,
            "get_string_xrefs" => self.get_string_xrefs(parse(args)?).await,

            "set_comment" => self.set_comment(parse(args)?).await,
            "set_func_comment" => self.set_func_comment(parse(args)?).await,
            "set_decompiler_comment" => self.set_decompiler_comment(parse(args)?).await,
            "set_name" => self.set_name(parse(args)?).await,
            "delete_name" => self.delete_name(parse(args)?).await,
            "set_function_type" => self.set_function_type(parse(args)?).await,
            "set_lvar_type" => self.set_lvar_type(parse(args)?).await,
            "rename_lvar" => self.rename_lvar(parse(args)?).await,
            "set_global_type" => self.set_global_type(parse(args)?).await,
            "rename_global" => self.rename_global(parse(args)?).await,
            "make_function" => self.make_function(parse(args)?).await,

            "data_read_string" => self.data_read_string(parse(args)?).await,
            "data_read_byte" => self.data_read_byte(parse(args)?).await,
            "find_binary" => self.find_binary(parse(args)?).await,
            "find_text" => self.find_text(parse(args)?).await,

            "import_il2cpp" => self.import_il2cpp(parse(args)?).await,
            "import_flutter" => self.import_flutter(parse(args)?).await,

            _ => Err(GatewayError::InvalidArgument(format!(
                "unknown tool: {name}"
            ))),
        }
    }

    /// The full tool table, schemas derived from the parameter structs.
    pub fn tools(&self) -> Vec<Tool> {
        vec![
            make_tool::<OpenBinaryParams>("open_binary", "Open binary file for analysis"),
            make_tool::<SessionParams>("close_binary", "Close analysis session"),
            make_tool::<EmptyParams>("list_sessions", "List active analysis sessions"),
            make_tool::<SessionParams>("save_database", "Save IDA database"),
            make_tool::<SessionParams>(
                "get_session_progress",
                "Fetch latest server-side progress snapshot for a session",
            ),
            make_tool::<SessionParams>(
                "run_auto_analysis",
                "Force IDA auto-analysis to finish (plan_and_wait)",
            ),
            make_tool::<WatchAutoAnalysisParams>(
                "watch_auto_analysis",
                "Poll IDA auto-analysis state until completion",
            ),
            make_tool::<ListParams>("get_functions", "List all functions"),
            make_tool::<GetImportsParams>("get_imports", "Get import table"),
            make_tool::<ListParams>("get_exports", "Get export table"),
            make_tool::<ListParams>("get_strings", "Get all strings"),
            make_tool::<GetBytesParams>("get_bytes", "Read bytes at address"),
            make_tool::<AddressParams>("get_disasm", "Get disassembly at address"),
            make_tool::<AddressParams>(
                "get_function_disasm",
                "Get full disassembly for a function",
            ),
            make_tool::<AddressParams>("get_decompiled_func", "Get decompiled pseudocode"),
            make_tool::<GetCommentParams>("get_comment", "Get comment at address"),
            make_tool::<AddressParams>("get_func_comment", "Get function comment"),
            make_tool::<AddressParams>("get_name", "Get name at address"),
            make_tool::<AddressParams>("get_function_name", "Get function name at address"),
            make_tool::<AddressParams>(
                "get_function_info",
                "Get comprehensive function metadata including bounds, flags, and calling convention",
            ),
            make_tool::<SessionParams>(
                "get_segments",
                "Get all memory segments with permissions and metadata",
            ),
            make_tool::<SessionParams>("get_entry_point", "Get binary entry point address"),
            make_tool::<AddressParams>("get_dword_at", "Read 32-bit value at address"),
            make_tool::<AddressParams>("get_qword_at", "Read 64-bit value at address"),
            make_tool::<AddressParams>(
                "get_instruction_length",
                "Get instruction size at address",
            ),
            make_tool::<FilterParams>("get_globals", "List global variables"),
            make_tool::<AddressParams>("get_type_at", "Get type information at address"),
            make_tool::<FilterParams>("list_structs", "Enumerate structure definitions"),
            make_tool::<NameParams>("get_struct", "Fetch metadata for a structure"),
            make_tool::<FilterParams>("list_enums", "Enumerate enumeration definitions"),
            make_tool::<NameParams>("get_enum", "Fetch metadata for an enumeration"),
            make_tool::<AddressParams>("get_xrefs_to", "List cross references to an address"),
            make_tool::<AddressParams>(
                "get_xrefs_from",
                "List cross references originating from an address",
            ),
            make_tool::<AddressParams>("get_data_refs", "List data references to an address"),
            make_tool::<AddressParams>(
                "get_string_xrefs",
                "List functions referencing a string address",
            ),
            make_tool::<SetCommentParams>("set_comment", "Set comment at address"),
            make_tool::<SetFuncCommentParams>("set_func_comment", "Set function comment"),
            make_tool::<SetDecompilerCommentParams>(
                "set_decompiler_comment",
                "Attach a Hex-Rays pseudocode comment",
            ),
            make_tool::<SetNameParams>("set_name", "Set name at address"),
            make_tool::<AddressParams>("delete_name", "Delete name at address"),
            make_tool::<SetFunctionTypeParams>(
                "set_function_type",
                "Apply a function prototype at an address",
            ),
            make_tool::<SetLvarTypeParams>(
                "set_lvar_type",
                "Apply a Hex-Rays local variable type",
            ),
            make_tool::<RenameLvarParams>("rename_lvar", "Rename a Hex-Rays local variable"),
            make_tool::<SetGlobalTypeParams>(
                "set_global_type",
                "Apply a type to a global variable",
            ),
            make_tool::<RenameGlobalParams>("rename_global", "Rename a global variable"),
            make_tool::<AddressParams>("make_function", "Create function at address"),
            make_tool::<DataReadStringParams>(
                "data_read_string",
                "Read an ASCII string from memory",
            ),
            make_tool::<AddressParams>("data_read_byte", "Read a byte from memory"),
            make_tool::<FindBinaryParams>("find_binary", "Search for a binary pattern"),
            make_tool::<FindTextParams>("find_text", "Search for ASCII/UTF-8 text"),
            make_tool::<ImportIl2cppParams>(
                "import_il2cpp",
                "Import Il2CppDumper metadata into the current session",
            ),
            make_tool::<ImportFlutterParams>(
                "import_flutter",
                "Import Blutter/Dart metadata into the current session",
            ),
        ]
    }
}

fn make_tool<P: JsonSchema>(name: &'static str, description: &'static str) -> Tool {
    let mut schema: Map<String, Value> = serde_json::to_value(schema_for!(P))
        .ok()
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    schema.remove("$schema");
    Tool {
        name: Cow::Borrowed(name),
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(schema),
        annotations: None,
        icons: None,
        meta: None,
        output_schema: None,
        title: None,
    }
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, GatewayError> {
    serde_json::from_value(args)
        .map_err(|e| GatewayError::InvalidArgument(format!("invalid arguments: {e}")))
}

/// Clamp pagination arguments: negative offsets and oversized limits are
/// rejected, a missing limit defaults to 1000.
pub(crate) fn normalize_pagination(
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<(usize, usize), GatewayError> {
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err(GatewayError::InvalidArgument(
            "offset must be >= 0".to_string(),
        ));
    }
    let limit = match limit {
        None => DEFAULT_PAGE_LIMIT as i64,
        Some(l) if l <= 0 => DEFAULT_PAGE_LIMIT as i64,
        Some(l) => l,
    };
    if limit > MAX_PAGE_LIMIT as i64 {
        return Err(GatewayError::InvalidArgument(format!(
            "limit must be <= {MAX_PAGE_LIMIT}"
        )));
    }
    Ok((offset as usize, limit as usize))
}

pub(crate) fn compile_regex(
    expr: &str,
    case_sensitive: bool,
) -> Result<Option<Regex>, GatewayError> {
    if expr.is_empty() {
        return Ok(None);
    }
    let pattern = if case_sensitive {
        expr.to_string()
    } else {
        format!("(?i){expr}")
    };
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| GatewayError::InvalidArgument(format!("invalid regex: {e}")))
}

/// Slice one page out of a filtered enumeration, in underlying order.
pub(crate) fn page<T>(items: &[T], offset: usize, limit: usize) -> &[T] {
    let offset = offset.min(items.len());
    let end = (offset + limit).min(items.len());
    &items[offset..end]
}

pub(crate) fn match_module(module: &str, filter: &str, case_sensitive: bool) -> bool {
    if filter.is_empty() {
        return true;
    }
    if case_sensitive {
        module.contains(filter)
    } else {
        module.to_lowercase().contains(&filter.to_lowercase())
    }
}

impl ServerHandler for GatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = params
            .arguments
            .map(Value::Object)
            .unwrap_or(Value::Object(Map::new()));
        let tool_ctx = ToolContext {
            peer: Some(ctx.peer.clone()),
            progress_token: ctx.meta.get_progress_token(),
        };

        match self.dispatch_tool(&params.name, args, tool_ctx).await {
            Ok(output) => Ok(CallToolResult::success(vec![Content::text(
                output.render(),
            )])),
            Err(e) => Ok(e.to_tool_result()),
        }
    }
}

