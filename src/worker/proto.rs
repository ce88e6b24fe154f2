//! Wire messages for the `ida.worker.v1` RPC services.
//!
//! The worker speaks Connect-style unary JSON over its unix socket. These
//! structs mirror the worker's protobuf schema field-for-field; protobuf
//! codegen itself is out of scope, and proto field names are valid JSON keys
//! on this wire. Every response carries an `error` string - non-empty means
//! the backend rejected the operation.

use serde::{Deserialize, Serialize};

// --- SessionControl -------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenBinaryRequest {
    pub binary_path: String,
    pub auto_analyze: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenBinaryResponse {
    pub success: bool,
    pub has_decompiler: bool,
    pub binary_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    pub save: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseSessionResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanAndWaitRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanAndWaitResponse {
    pub success: bool,
    pub duration_seconds: f64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveDatabaseRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveDatabaseResponse {
    pub success: bool,
    pub timestamp: i64,
    pub dirty: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSessionInfoRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetSessionInfoResponse {
    pub binary_path: String,
    pub opened_at: i64,
    pub last_activity: i64,
    pub has_decompiler: bool,
    pub auto_state: String,
    pub auto_running: bool,
    pub error: String,
}

// --- Healthcheck ----------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PingResponse {
    pub alive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusStreamRequest {}

/// One element of the worker's status stream. The gateway itself only pings;
/// the stream shape is part of the worker contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerStatus {
    pub timestamp: i64,
    pub memory_bytes: u64,
    pub dirty: bool,
    pub last_activity: i64,
    pub pending_requests: u32,
}

// --- AnalysisTools: enumerations ------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionItem {
    pub address: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportItem {
    pub module: String,
    pub address: u64,
    pub name: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportItem {
    pub index: u32,
    pub ordinal: u32,
    pub address: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StringItem {
    pub address: u64,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFunctionsRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFunctionsResponse {
    pub functions: Vec<FunctionItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetImportsRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetImportsResponse {
    pub imports: Vec<ImportItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetExportsRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetExportsResponse {
    pub exports: Vec<ExportItem>,
    pub error: String,
}

/// Strings are the one enumeration the worker pages itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStringsRequest {
    pub offset: i32,
    pub limit: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetStringsResponse {
    pub strings: Vec<StringItem>,
    pub total: i32,
    pub offset: i32,
    pub count: i32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetGlobalsRequest {
    pub regex: String,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalItem {
    pub address: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub type_decl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetGlobalsResponse {
    pub globals: Vec<GlobalItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSegmentsRequest {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentItem {
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub seg_class: String,
    pub permissions: u32,
    pub bitness: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetSegmentsResponse {
    pub segments: Vec<SegmentItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListStructsRequest {
    pub regex: String,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructSummary {
    pub name: String,
    pub id: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListStructsResponse {
    pub structs: Vec<StructSummary>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStructRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructMember {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub type_decl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetStructResponse {
    pub name: String,
    pub id: u64,
    pub size: u64,
    pub members: Vec<StructMember>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEnumsRequest {
    pub regex: String,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumSummary {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListEnumsResponse {
    pub enums: Vec<EnumSummary>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetEnumRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetEnumResponse {
    pub name: String,
    pub id: u64,
    pub members: Vec<EnumMember>,
    pub error: String,
}

// --- AnalysisTools: reads -------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetBytesRequest {
    pub address: u64,
    pub size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetBytesResponse {
    /// Base64-encoded byte contents.
    pub data: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDisasmRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetDisasmResponse {
    pub disasm: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFunctionDisasmRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFunctionDisasmResponse {
    pub disassembly: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDecompiledRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetDecompiledResponse {
    pub code: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCommentRequest {
    pub address: u64,
    pub repeatable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetCommentResponse {
    pub comment: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFuncCommentRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFuncCommentResponse {
    pub comment: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetNameRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetNameResponse {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFunctionNameRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFunctionNameResponse {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetFunctionInfoRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionFlags {
    pub is_library: bool,
    pub is_thunk: bool,
    pub no_return: bool,
    pub has_farseg: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFunctionInfoResponse {
    pub address: u64,
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub frame_size: u64,
    pub flags: FunctionFlags,
    pub calling_convention: String,
    pub return_type: String,
    pub num_args: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTypeAtRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetTypeAtResponse {
    pub address: u64,
    #[serde(rename = "type")]
    pub type_decl: String,
    pub size: u64,
    pub is_ptr: bool,
    pub is_func: bool,
    pub is_array: bool,
    pub is_struct: bool,
    pub is_union: bool,
    pub is_enum: bool,
    pub has_type: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetEntryPointRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetEntryPointResponse {
    pub address: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDwordAtRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetDwordAtResponse {
    pub value: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetQwordAtRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetQwordAtResponse {
    pub value: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetInstructionLengthRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetInstructionLengthResponse {
    pub length: u32,
    pub error: String,
}

// --- AnalysisTools: cross-references --------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetXRefsToRequest {
    pub address: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefItem {
    pub from: u64,
    pub to: u64,
    #[serde(rename = "type")]
    pub kind: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetXRefsToResponse {
    pub xrefs: Vec<XrefItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetXRefsFromRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetXRefsFromResponse {
    pub xrefs: Vec<XrefItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDataRefsRequest {
    pub address: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataRefItem {
    pub from: u64,
    #[serde(rename = "type")]
    pub kind: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetDataRefsResponse {
    pub refs: Vec<DataRefItem>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetStringXRefsRequest {
    pub address: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StringXrefItem {
    pub address: u64,
    pub function_address: u64,
    pub function_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetStringXRefsResponse {
    pub refs: Vec<StringXrefItem>,
    pub error: String,
}

// --- AnalysisTools: writes ------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetCommentRequest {
    pub address: u64,
    pub comment: String,
    pub repeatable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetCommentResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetFuncCommentRequest {
    pub address: u64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetFuncCommentResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetDecompilerCommentRequest {
    pub function_address: u64,
    pub address: u64,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetDecompilerCommentResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetNameRequest {
    pub address: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetNameResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteNameRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteNameResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetFunctionTypeRequest {
    pub address: u64,
    pub prototype: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetFunctionTypeResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetLvarTypeRequest {
    pub function_address: u64,
    pub lvar_name: String,
    pub lvar_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetLvarTypeResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameLvarRequest {
    pub function_address: u64,
    pub lvar_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameLvarResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetGlobalTypeRequest {
    pub address: u64,
    #[serde(rename = "type")]
    pub type_decl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetGlobalTypeResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameGlobalRequest {
    pub address: u64,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameGlobalResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MakeFunctionRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MakeFunctionResponse {
    pub success: bool,
    pub error: String,
}

// --- AnalysisTools: search and raw data -----------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataReadStringRequest {
    pub address: u64,
    pub max_length: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataReadStringResponse {
    pub value: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataReadByteRequest {
    pub address: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataReadByteResponse {
    pub value: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindBinaryRequest {
    pub start: u64,
    pub end: u64,
    pub pattern: String,
    pub search_up: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindBinaryResponse {
    pub addresses: Vec<u64>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindTextRequest {
    pub start: u64,
    pub end: u64,
    pub needle: String,
    pub case_sensitive: bool,
    pub unicode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindTextResponse {
    pub addresses: Vec<u64>,
    pub error: String,
}

// --- AnalysisTools: metadata imports --------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportIl2CppRequest {
    pub script_path: String,
    pub il2cpp_path: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportIl2CppResponse {
    pub success: bool,
    pub duration_seconds: f64,
    pub functions_defined: u64,
    pub functions_named: u64,
    pub strings_named: u64,
    pub metadata_named: u64,
    pub metadata_methods: u64,
    pub signatures_applied: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFlutterRequest {
    pub meta_json_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportFlutterResponse {
    pub success: bool,
    pub duration_seconds: f64,
    pub functions_created: u64,
    pub functions_named: u64,
    pub structs_created: u64,
    pub signatures_applied: u64,
    pub comments_set: u64,
    pub error: String,
}
