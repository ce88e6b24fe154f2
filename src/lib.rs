//! Multi-session MCP gateway for headless IDA analysis workers.
//!
//! The gateway fronts a single-tenant native analysis backend: every opened
//! binary gets its own long-lived worker process holding the database, and
//! the gateway routes MCP tool calls to the right worker over a unix-domain
//! socket.
//!
//! # Architecture
//!
//! - **Session registry** (`session`): thread-safe map of active sessions,
//!   indexed by id and by normalized binary path. At most one live session
//!   per binary.
//!
//! - **Worker manager** (`worker`): spawns one worker process per session,
//!   waits for its socket to come up, and exposes typed RPC clients. Worker
//!   lifetimes are owned by the manager, never by an inbound request.
//!
//! - **Session cache** (`cache`): per-session memoization of the expensive
//!   enumerations (functions, imports, exports, strings), invalidated
//!   coarsely whenever a mutation can change them.
//!
//! - **Progress tracker** (`progress`): latest-progress snapshot per session
//!   plus MCP progress notifications on the active tool call.
//!
//! - **Tool dispatcher** (`server`): translates MCP tool invocations into
//!   worker RPCs, normalizes pagination and regex filtering, and sanitizes
//!   errors before they reach the client.
//!
//! - **Transport front door** (`server::http`): one listener serving
//!   streamable HTTP at `/`, legacy SSE at `/sse`, and a WebSocket envelope
//!   protocol at `/ws`.
//!
//! - **Watchdog** (`watchdog`): periodic sweep that tears down idle
//!   sessions, their workers, and their persisted metadata.
//!
//! # Tools
//!
//! Session lifecycle: `open_binary`, `close_binary`, `list_sessions`,
//! `save_database`, `get_session_progress`, `run_auto_analysis`,
//! `watch_auto_analysis`.
//!
//! Enumerations (cached, paginated, regex-filterable): `get_functions`,
//! `get_imports`, `get_exports`, `get_strings`.
//!
//! Reads: `get_bytes`, `get_disasm`, `get_function_disasm`,
//! `get_decompiled_func`, `get_comment`, `get_func_comment`, `get_name`,
//! `get_function_name`, `get_function_info`, `get_segments`,
//! `get_entry_point`, `get_dword_at`, `get_qword_at`,
//! `get_instruction_length`, `get_globals`, `get_type_at`, `list_structs`,
//! `get_struct`, `list_enums`, `get_enum`.
//!
//! Writes: `set_comment`, `set_func_comment`, `set_decompiler_comment`,
//! `set_name`, `delete_name`, `set_function_type`, `set_lvar_type`,
//! `rename_lvar`, `set_global_type`, `rename_global`, `make_function`.
//!
//! Cross-references: `get_xrefs_to`, `get_xrefs_from`, `get_data_refs`,
//! `get_string_xrefs`.
//!
//! Search: `find_binary`, `find_text`, `data_read_string`,
//! `data_read_byte`.
//!
//! Metadata imports: `import_il2cpp`, `import_flutter`.

pub mod cache;
pub mod config;
pub mod error;
pub mod progress;
pub mod server;
pub mod session;
pub mod watchdog;
pub mod worker;

pub use config::Config;
pub use error::GatewayError;
pub use server::GatewayServer;
