//! Read-only tools: cached enumerations and point reads.

use super::{
    compile_regex, match_module, normalize_pagination, page, AddressParams, FilterParams,
    GatewayServer, GetBytesParams, GetCommentParams, GetImportsParams, ListParams, NameParams,
    SessionParams, ToolContext, ToolOutput, DEFAULT_PAGE_LIMIT,
};
use crate::error::{log_and_sanitize, GatewayError};
use crate::progress::ProgressReporter;
use crate::worker::proto::*;
use crate::worker::WorkerClient;
use serde_json::{json, Value};

/// Fail on a non-empty in-response error string.
fn check_backend(context: &str, error: &str) -> Result<(), GatewayError> {
    if error.is_empty() {
        Ok(())
    } else {
        Err(log_and_sanitize(context, error))
    }
}

/// The worker pages strings itself; drain it chunk by chunk and materialize
/// one full slice for the cache.
async fn fetch_all_strings(
    client: &WorkerClient,
    progress: &mut ProgressReporter,
) -> Result<Vec<StringItem>, GatewayError> {
    let chunk_limit = DEFAULT_PAGE_LIMIT as i32;
    let mut all: Vec<StringItem> = Vec::new();
    let mut offset = 0i32;
    let mut total = 0.0;
    loop {
        let resp = client
            .analysis
            .get_strings(&GetStringsRequest {
                offset,
                limit: chunk_limit,
            })
            .await
            .map_err(|e| log_and_sanitize("get_strings RPC call", e))?;
        check_backend("get_strings IDA operation", &resp.error)?;

        let chunk_len = resp.strings.len();
        all.extend(resp.strings);
        if total == 0.0 && resp.total > 0 {
            total = resp.total as f64;
        }
        progress
            .emit(
                "get_strings",
                &format!("Enumerated {} strings", all.len()),
                all.len() as f64,
                total,
            )
            .await;
        if chunk_len < chunk_limit as usize {
            break;
        }
        offset += chunk_len as i32;
    }
    progress
        .emit(
            "get_strings",
            "String enumeration complete",
            all.len() as f64,
            total,
        )
        .await;
    Ok(all)
}

async fn fetch_all_functions(
    client: &WorkerClient,
    progress: &mut ProgressReporter,
) -> Result<Vec<FunctionItem>, GatewayError> {
    progress
        .emit("get_functions", "Fetching functions from IDA", 0.0, 0.0)
        .await;
    let resp = client
        .analysis
        .get_functions(&GetFunctionsRequest {})
        .await
        .map_err(|e| log_and_sanitize("get_functions RPC call", e))?;
    check_backend("get_functions IDA operation", &resp.error)?;
    let count = resp.functions.len() as f64;
    progress
        .emit(
            "get_functions",
            &format!("Fetched {} functions", resp.functions.len()),
            count,
            count,
        )
        .await;
    Ok(resp.functions)
}

async fn fetch_all_imports(
    client: &WorkerClient,
    progress: &mut ProgressReporter,
) -> Result<Vec<ImportItem>, GatewayError> {
    progress
        .emit("get_imports", "Fetching imports from IDA", 0.0, 0.0)
        .await;
    let resp = client
        .analysis
        .get_imports(&GetImportsRequest {})
        .await
        .map_err(|e| log_and_sanitize("get_imports RPC call", e))?;
    check_backend("get_imports IDA operation", &resp.error)?;
    let count = resp.imports.len() as f64;
    progress
        .emit(
            "get_imports",
            &format!("Fetched {} imports", resp.imports.len()),
            count,
            count,
        )
        .await;
    Ok(resp.imports)
}

async fn fetch_all_exports(
    client: &WorkerClient,
    progress: &mut ProgressReporter,
) -> Result<Vec<ExportItem>, GatewayError> {
    progress
        .emit("get_exports", "Fetching exports from IDA", 0.0, 0.0)
        .await;
    let resp = client
        .analysis
        .get_exports(&GetExportsRequest {})
        .await
        .map_err(|e| log_and_sanitize("get_exports RPC call", e))?;
    check_backend("get_exports IDA operation", &resp.error)?;
    let count = resp.exports.len() as f64;
    progress
        .emit(
            "get_exports",
            &format!("Fetched {} exports", resp.exports.len()),
            count,
            count,
        )
        .await;
    Ok(resp.exports)
}

impl GatewayServer {
    pub(crate) async fn get_functions(
        &self,
        params: ListParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_functions",
            &params.session_id,
            json!({"offset": params.offset, "limit": params.limit, "regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut progress = self.reporter(&session.id, "get_functions", ctx);
        let cache = self.cache.for_session(&session.id);
        let (data, hit) = cache
            .load_functions(&session.id, fetch_all_functions(&client, &mut progress))
            .await?;
        if hit {
            progress
                .emit("get_functions", "Functions served from cache", 1.0, 1.0)
                .await;
        }

        let regex = compile_regex(&params.regex, params.case_sensitive)?;
        let filtered: Vec<&FunctionItem> = data
            .iter()
            .filter(|f| regex.as_ref().map_or(true, |re| re.is_match(&f.name)))
            .collect();

        let total = filtered.len();
        let (offset, limit) = normalize_pagination(params.offset, params.limit)?;
        let selection: Vec<Value> = page(&filtered, offset, limit)
            .iter()
            .map(|f| json!({"address": f.address, "name": f.name}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "functions": selection,
            "total": total,
            "offset": offset.min(total),
            "count": selection.len(),
            "limit": limit,
            "regex": params.regex,
        })))
    }

    pub(crate) async fn get_imports(
        &self,
        params: GetImportsParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_imports",
            &params.session_id,
            json!({
                "offset": params.offset, "limit": params.limit,
                "module": params.module, "regex": params.regex,
            }),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut progress = self.reporter(&session.id, "get_imports", ctx);
        let cache = self.cache.for_session(&session.id);
        let (data, hit) = cache
            .load_imports(&session.id, fetch_all_imports(&client, &mut progress))
            .await?;
        if hit {
            progress
                .emit("get_imports", "Imports served from cache", 1.0, 1.0)
                .await;
        }

        let regex = compile_regex(&params.regex, params.case_sensitive)?;
        let filtered: Vec<&ImportItem> = data
            .iter()
            .filter(|i| match_module(&i.module, &params.module, params.case_sensitive))
            .filter(|i| regex.as_ref().map_or(true, |re| re.is_match(&i.name)))
            .collect();

        let total = filtered.len();
        let (offset, limit) = normalize_pagination(params.offset, params.limit)?;
        let selection: Vec<Value> = page(&filtered, offset, limit)
            .iter()
            .map(|i| {
                json!({
                    "module": i.module,
                    "address": i.address,
                    "name": i.name,
                    "ordinal": i.ordinal,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({
            "imports": selection,
            "total": total,
            "offset": offset.min(total),
            "count": selection.len(),
            "limit": limit,
            "module": params.module,
            "regex": params.regex,
        })))
    }

    pub(crate) async fn get_exports(
        &self,
        params: ListParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_exports",
            &params.session_id,
            json!({"offset": params.offset, "limit": params.limit, "regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut progress = self.reporter(&session.id, "get_exports", ctx);
        let cache = self.cache.for_session(&session.id);
        let (data, hit) = cache
            .load_exports(&session.id, fetch_all_exports(&client, &mut progress))
            .await?;
        if hit {
            progress
                .emit("get_exports", "Exports served from cache", 1.0, 1.0)
                .await;
        }

        let regex = compile_regex(&params.regex, params.case_sensitive)?;
        let filtered: Vec<&ExportItem> = data
            .iter()
            .filter(|e| regex.as_ref().map_or(true, |re| re.is_match(&e.name)))
            .collect();

        let total = filtered.len();
        let (offset, limit) = normalize_pagination(params.offset, params.limit)?;
        let selection: Vec<Value> = page(&filtered, offset, limit)
            .iter()
            .map(|e| {
                json!({
                    "index": e.index,
                    "ordinal": e.ordinal,
                    "address": e.address,
                    "name": e.name,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({
            "exports": selection,
            "total": total,
            "offset": offset.min(total),
            "count": selection.len(),
            "limit": limit,
            "regex": params.regex,
        })))
    }

    pub(crate) async fn get_strings(
        &self,
        params: ListParams,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_strings",
            &params.session_id,
            json!({"offset": params.offset, "limit": params.limit, "regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let mut progress = self.reporter(&session.id, "get_strings", ctx);
        let cache = self.cache.for_session(&session.id);
        let (data, hit) = cache
            .load_strings(&session.id, fetch_all_strings(&client, &mut progress))
            .await?;
        if hit {
            progress
                .emit("get_strings", "Strings served from cache", 1.0, 1.0)
                .await;
        }

        let regex = compile_regex(&params.regex, params.case_sensitive)?;
        let filtered: Vec<&StringItem> = data
            .iter()
            .filter(|s| regex.as_ref().map_or(true, |re| re.is_match(&s.value)))
            .collect();

        let total = filtered.len();
        let (offset, limit) = normalize_pagination(params.offset, params.limit)?;
        let selection: Vec<Value> = page(&filtered, offset, limit)
            .iter()
            .map(|s| json!({"address": s.address, "value": s.value}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "strings": selection,
            "total": total,
            "offset": offset.min(total),
            "count": selection.len(),
            "limit": limit,
            "regex": params.regex,
        })))
    }

    pub(crate) async fn get_bytes(
        &self,
        params: GetBytesParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_bytes",
            &params.session_id,
            json!({"address": params.address, "size": params.size}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_bytes(&GetBytesRequest {
                address: params.address,
                size: params.size,
            })
            .await
            .map_err(|e| log_and_sanitize("get_bytes RPC call", e))?;
        check_backend("get_bytes IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"data": resp.data})))
    }

    pub(crate) async fn get_disasm(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_disasm",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_disasm(&GetDisasmRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_disasm RPC call", e))?;
        check_backend("get_disasm IDA operation", &resp.error)?;

        Ok(ToolOutput::Text(resp.disasm))
    }

    pub(crate) async fn get_function_disasm(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_function_disasm",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_function_disasm(&GetFunctionDisasmRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_function_disasm RPC call", e))?;
        check_backend("get_function_disasm IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"disassembly": resp.disassembly})))
    }

    pub(crate) async fn get_decompiled_func(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_decompiled_func",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_decompiled(&GetDecompiledRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_decompiled RPC call", e))?;
        check_backend("get_decompiled IDA operation", &resp.error)?;

        Ok(ToolOutput::Text(resp.code))
    }

    pub(crate) async fn get_comment(
        &self,
        params: GetCommentParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_comment",
            &params.session_id,
            json!({"address": params.address, "repeatable": params.repeatable}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_comment(&GetCommentRequest {
                address: params.address,
                repeatable: params.repeatable,
            })
            .await
            .map_err(|e| log_and_sanitize("get_comment RPC call", e))?;
        check_backend("get_comment IDA operation", &resp.error)?;

        Ok(ToolOutput::Text(resp.comment))
    }

    pub(crate) async fn get_func_comment(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_func_comment",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_func_comment(&GetFuncCommentRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_func_comment RPC call", e))?;
        check_backend("get_func_comment IDA operation", &resp.error)?;

        Ok(ToolOutput::Text(resp.comment))
    }

    pub(crate) async fn get_name(&self, params: AddressParams) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_name",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_name(&GetNameRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_name RPC call", e))?;
        check_backend("get_name IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"name": resp.name})))
    }

    pub(crate) async fn get_function_name(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_function_name",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_function_name(&GetFunctionNameRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_function_name RPC call", e))?;
        check_backend("get_function_name IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"name": resp.name})))
    }

    pub(crate) async fn get_function_info(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_function_info",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_function_info(&GetFunctionInfoRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_function_info RPC call", e))?;
        check_backend("get_function_info IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({
            "address": resp.address,
            "name": resp.name,
            "start": resp.start,
            "end": resp.end,
            "size": resp.size,
            "frame_size": resp.frame_size,
            "flags": {
                "is_library": resp.flags.is_library,
                "is_thunk": resp.flags.is_thunk,
                "no_return": resp.flags.no_return,
                "has_farseg": resp.flags.has_farseg,
                "is_static": resp.flags.is_static,
            },
            "calling_convention": resp.calling_convention,
            "return_type": resp.return_type,
            "num_args": resp.num_args,
        })))
    }

    pub(crate) async fn get_segments(
        &self,
        params: SessionParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("get_segments", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_segments(&GetSegmentsRequest {})
            .await
            .map_err(|e| log_and_sanitize("get_segments RPC call", e))?;
        check_backend("get_segments IDA operation", &resp.error)?;

        let segments: Vec<Value> = resp
            .segments
            .iter()
            .map(|s| {
                json!({
                    "start": s.start,
                    "end": s.end,
                    "name": s.name,
                    "class": s.seg_class,
                    "permissions": s.permissions,
                    "bitness": s.bitness,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({
            "segments": segments,
            "count": segments.len(),
        })))
    }

    pub(crate) async fn get_entry_point(
        &self,
        params: SessionParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool("get_entry_point", &params.session_id, json!({}));
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_entry_point(&GetEntryPointRequest {})
            .await
            .map_err(|e| log_and_sanitize("get_entry_point RPC call", e))?;
        check_backend("get_entry_point IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"address": resp.address})))
    }

    pub(crate) async fn get_dword_at(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_dword_at",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_dword_at(&GetDwordAtRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_dword_at RPC call", e))?;
        check_backend("get_dword_at IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"value": resp.value})))
    }

    pub(crate) async fn get_qword_at(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_qword_at",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_qword_at(&GetQwordAtRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_qword_at RPC call", e))?;
        check_backend("get_qword_at IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"value": resp.value})))
    }

    pub(crate) async fn get_instruction_length(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_instruction_length",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_instruction_length(&GetInstructionLengthRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_instruction_length RPC call", e))?;
        check_backend("get_instruction_length IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"length": resp.length})))
    }

    pub(crate) async fn get_globals(
        &self,
        params: FilterParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_globals",
            &params.session_id,
            json!({"regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_globals(&GetGlobalsRequest {
                regex: params.regex,
                case_sensitive: params.case_sensitive,
            })
            .await
            .map_err(|e| log_and_sanitize("get_globals RPC call", e))?;
        check_backend("get_globals IDA operation", &resp.error)?;

        let globals: Vec<Value> = resp
            .globals
            .iter()
            .map(|g| json!({"address": g.address, "name": g.name, "type": g.type_decl}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "count": globals.len(),
            "globals": globals,
        })))
    }

    pub(crate) async fn get_type_at(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_type_at",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_type_at(&GetTypeAtRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_type_at RPC call", e))?;
        check_backend("get_type_at IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({
            "address": resp.address,
            "type": resp.type_decl,
            "size": resp.size,
            "is_ptr": resp.is_ptr,
            "is_func": resp.is_func,
            "is_array": resp.is_array,
            "is_struct": resp.is_struct,
            "is_union": resp.is_union,
            "is_enum": resp.is_enum,
            "has_type": resp.has_type,
        })))
    }

    pub(crate) async fn list_structs(
        &self,
        params: FilterParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "list_structs",
            &params.session_id,
            json!({"regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .list_structs(&ListStructsRequest {
                regex: params.regex,
                case_sensitive: params.case_sensitive,
            })
            .await
            .map_err(|e| log_and_sanitize("list_structs RPC call", e))?;
        check_backend("list_structs IDA operation", &resp.error)?;

        let structs: Vec<Value> = resp
            .structs
            .iter()
            .map(|s| json!({"name": s.name, "id": s.id, "size": s.size}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "count": structs.len(),
            "structs": structs,
        })))
    }

    pub(crate) async fn get_struct(&self, params: NameParams) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_struct",
            &params.session_id,
            json!({"name": params.name}),
        );
        if params.name.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("name is required".to_string()));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_struct(&GetStructRequest { name: params.name })
            .await
            .map_err(|e| log_and_sanitize("get_struct RPC call", e))?;
        check_backend("get_struct IDA operation", &resp.error)?;

        let members: Vec<Value> = resp
            .members
            .iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "offset": m.offset,
                    "size": m.size,
                    "type": m.type_decl,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({
            "name": resp.name,
            "id": resp.id,
            "size": resp.size,
            "members": members,
        })))
    }

    pub(crate) async fn list_enums(
        &self,
        params: FilterParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "list_enums",
            &params.session_id,
            json!({"regex": params.regex}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .list_enums(&ListEnumsRequest {
                regex: params.regex,
                case_sensitive: params.case_sensitive,
            })
            .await
            .map_err(|e| log_and_sanitize("list_enums RPC call", e))?;
        check_backend("list_enums IDA operation", &resp.error)?;

        let enums: Vec<Value> = resp
            .enums
            .iter()
            .map(|e| json!({"name": e.name, "id": e.id}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "count": enums.len(),
            "enums": enums,
        })))
    }

    pub(crate) async fn get_enum(&self, params: NameParams) -> Result<ToolOutput, GatewayError> {
        self.log_tool("get_enum", &params.session_id, json!({"name": params.name}));
        if params.name.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("name is required".to_string()));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_enum(&GetEnumRequest { name: params.name })
            .await
            .map_err(|e| log_and_sanitize("get_enum RPC call", e))?;
        check_backend("get_enum IDA operation", &resp.error)?;

        let members: Vec<Value> = resp
            .members
            .iter()
            .map(|m| json!({"name": m.name, "value": m.value}))
            .collect();

        Ok(ToolOutput::Json(json!({
            "name": resp.name,
            "id": resp.id,
            "members": members,
        })))
    }

    pub(crate) async fn get_xrefs_to(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_xrefs_to",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_xrefs_to(&GetXRefsToRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_xrefs_to RPC call", e))?;
        check_backend("get_xrefs_to IDA operation", &resp.error)?;

        let xrefs: Vec<Value> = resp
            .xrefs
            .iter()
            .map(|x| json!({"from": x.from, "to": x.to, "type": x.kind}))
            .collect();

        Ok(ToolOutput::Json(json!({"xrefs": xrefs, "count": xrefs.len()})))
    }

    pub(crate) async fn get_xrefs_from(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_xrefs_from",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_xrefs_from(&GetXRefsFromRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_xrefs_from RPC call", e))?;
        check_backend("get_xrefs_from IDA operation", &resp.error)?;

        let xrefs: Vec<Value> = resp
            .xrefs
            .iter()
            .map(|x| json!({"from": x.from, "to": x.to, "type": x.kind}))
            .collect();

        Ok(ToolOutput::Json(json!({"xrefs": xrefs, "count": xrefs.len()})))
    }

    pub(crate) async fn get_data_refs(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_data_refs",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_data_refs(&GetDataRefsRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_data_refs RPC call", e))?;
        check_backend("get_data_refs IDA operation", &resp.error)?;

        let refs: Vec<Value> = resp
            .refs
            .iter()
            .map(|r| json!({"from": r.from, "type": r.kind}))
            .collect();

        Ok(ToolOutput::Json(json!({"refs": refs, "count": refs.len()})))
    }

    pub(crate) async fn get_string_xrefs(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "get_string_xrefs",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .get_string_xrefs(&GetStringXRefsRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("get_string_xrefs RPC call", e))?;
        check_backend("get_string_xrefs IDA operation", &resp.error)?;

        let refs: Vec<Value> = resp
            .refs
            .iter()
            .map(|r| {
                json!({
                    "address": r.address,
                    "function_address": r.function_address,
                    "function_name": r.function_name,
                })
            })
            .collect();

        Ok(ToolOutput::Json(json!({"refs": refs, "count": refs.len()})))
    }
}
