//! Tool parameter types.
//!
//! All fields are defaulted so sparse argument objects deserialize; required
//! strings are validated explicitly in the handlers.

use rmcp::schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EmptyParams {}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OpenBinaryParams {
    #[schemars(description = "Path to the binary file to analyze")]
    pub path: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionParams {
    #[schemars(description = "Session identifier returned by open_binary")]
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WatchAutoAnalysisParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Poll interval in milliseconds (default 1000, floor 200)")]
    pub interval_ms: u64,
    #[schemars(description = "Optional timeout in seconds (0 = wait forever)")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AddressParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Memory address")]
    pub address: u64,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetBytesParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Memory address")]
    pub address: u64,
    #[schemars(description = "Number of bytes to read")]
    pub size: u32,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Result offset (default 0)")]
    pub offset: Option<i64>,
    #[schemars(description = "Page size (default 1000, max 10000)")]
    pub limit: Option<i64>,
    #[schemars(description = "Regular expression filter")]
    pub regex: String,
    #[schemars(description = "Case sensitive regex (default false)")]
    pub case_sensitive: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetImportsParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Result offset (default 0)")]
    pub offset: Option<i64>,
    #[schemars(description = "Page size (default 1000, max 10000)")]
    pub limit: Option<i64>,
    #[schemars(description = "Substring filter on the import's module")]
    pub module: String,
    #[schemars(description = "Regular expression filter on the import's name")]
    pub regex: String,
    #[schemars(description = "Case sensitive filters (default false)")]
    pub case_sensitive: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FilterParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Optional regex filter")]
    pub regex: String,
    #[schemars(description = "Case sensitive regex (default false)")]
    pub case_sensitive: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NameParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Structure or enumeration name")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetCommentParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Address")]
    pub address: u64,
    #[schemars(description = "Get the repeatable comment (default false)")]
    pub repeatable: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetCommentParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Address")]
    pub address: u64,
    #[schemars(description = "Comment text")]
    pub comment: String,
    #[schemars(description = "Repeatable comment (default false)")]
    pub repeatable: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetFuncCommentParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Function address")]
    pub address: u64,
    #[schemars(description = "Function comment text")]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetDecompilerCommentParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Function address")]
    pub function_address: u64,
    #[schemars(description = "Pseudocode address")]
    pub address: u64,
    #[schemars(description = "Comment text")]
    pub comment: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetNameParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Address")]
    pub address: u64,
    #[schemars(description = "New name")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetFunctionTypeParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Function address")]
    pub address: u64,
    #[schemars(description = "C-style function prototype")]
    pub prototype: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetLvarTypeParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Function address")]
    pub function_address: u64,
    #[schemars(description = "Local variable name")]
    pub lvar_name: String,
    #[schemars(description = "C-style type declaration")]
    pub lvar_type: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenameLvarParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Function address")]
    pub function_address: u64,
    #[schemars(description = "Current local variable name")]
    pub lvar_name: String,
    #[schemars(description = "New local variable name")]
    pub new_name: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SetGlobalTypeParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Global address")]
    pub address: u64,
    #[schemars(description = "C-style type declaration")]
    #[serde(rename = "type")]
    pub type_decl: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenameGlobalParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Global address")]
    pub address: u64,
    #[schemars(description = "New global name")]
    pub new_name: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DataReadStringParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Memory address")]
    pub address: u64,
    #[schemars(description = "Optional max length (default 256)")]
    pub max_length: u32,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FindBinaryParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Start address (0 for image base)")]
    pub start: u64,
    #[schemars(description = "End address (0 for end of image)")]
    pub end: u64,
    #[schemars(description = "IDA-style binary pattern")]
    pub pattern: String,
    #[schemars(description = "Search upward (default false)")]
    pub search_up: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FindTextParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Start address (0 for image base)")]
    pub start: u64,
    #[schemars(description = "End address (0 for end of image)")]
    pub end: u64,
    #[schemars(description = "Text to search")]
    pub needle: String,
    #[schemars(description = "Case sensitive search (default false)")]
    pub case_sensitive: bool,
    #[schemars(description = "Search UTF-16 strings (default false)")]
    pub unicode: bool,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ImportIl2cppParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Path to Il2CppDumper script.json")]
    pub script_path: String,
    #[schemars(description = "Path to il2cpp.h")]
    pub il2cpp_path: String,
    #[schemars(description = "Optional list of sections to import (default: all)")]
    pub fields: Vec<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ImportFlutterParams {
    #[schemars(description = "Session identifier")]
    pub session_id: String,
    #[schemars(description = "Path to flutter_meta.json produced by unflutter")]
    pub meta_json_path: String,
}
