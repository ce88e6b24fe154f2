//! Typed RPC client facades for the worker services.

use super::proto::*;
use super::rpc::{RpcChannel, RpcError};
use std::path::Path;
use std::sync::Arc;

const SESSION_CONTROL: &str = "ida.worker.v1.SessionControl";
const ANALYSIS_TOOLS: &str = "ida.worker.v1.AnalysisTools";
const HEALTHCHECK: &str = "ida.worker.v1.Healthcheck";

/// The three service clients for one worker, sharing a single socket dialer.
pub struct WorkerClient {
    pub session_ctrl: SessionControlClient,
    pub analysis: AnalysisToolsClient,
    pub health: HealthcheckClient,
}

impl WorkerClient {
    pub fn connect(socket_path: &Path) -> Self {
        let channel = Arc::new(RpcChannel::new(socket_path));
        Self {
            session_ctrl: SessionControlClient {
                channel: channel.clone(),
            },
            analysis: AnalysisToolsClient {
                channel: channel.clone(),
            },
            health: HealthcheckClient { channel },
        }
    }
}

pub struct SessionControlClient {
    channel: Arc<RpcChannel>,
}

impl SessionControlClient {
    pub async fn open_binary(
        &self,
        req: &OpenBinaryRequest,
    ) -> Result<OpenBinaryResponse, RpcError> {
        self.channel.unary(SESSION_CONTROL, "OpenBinary", req).await
    }

    pub async fn close_session(
        &self,
        req: &CloseSessionRequest,
    ) -> Result<CloseSessionResponse, RpcError> {
        self.channel
            .unary(SESSION_CONTROL, "CloseSession", req)
            .await
    }

    /// Blocking auto-analysis: returns once the worker's analysis queue is
    /// empty. Long-running; callers poll `get_session_info` alongside it.
    pub async fn plan_and_wait(
        &self,
        req: &PlanAndWaitRequest,
    ) -> Result<PlanAndWaitResponse, RpcError> {
        self.channel
            .unary(SESSION_CONTROL, "PlanAndWait", req)
            .await
    }

    pub async fn save_database(
        &self,
        req: &SaveDatabaseRequest,
    ) -> Result<SaveDatabaseResponse, RpcError> {
        self.channel
            .unary(SESSION_CONTROL, "SaveDatabase", req)
            .await
    }

    pub async fn get_session_info(
        &self,
        req: &GetSessionInfoRequest,
    ) -> Result<GetSessionInfoResponse, RpcError> {
        self.channel
            .unary(SESSION_CONTROL, "GetSessionInfo", req)
            .await
    }
}

pub struct HealthcheckClient {
    channel: Arc<RpcChannel>,
}

impl HealthcheckClient {
    pub async fn ping(&self, req: &PingRequest) -> Result<PingResponse, RpcError> {
        self.channel.unary(HEALTHCHECK, "Ping", req).await
    }
}

pub struct AnalysisToolsClient {
    channel: Arc<RpcChannel>,
}

impl AnalysisToolsClient {
    pub async fn get_functions(
        &self,
        req: &GetFunctionsRequest,
    ) -> Result<GetFunctionsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetFunctions", req).await
    }

    pub async fn get_imports(
        &self,
        req: &GetImportsRequest,
    ) -> Result<GetImportsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetImports", req).await
    }

    pub async fn get_exports(
        &self,
        req: &GetExportsRequest,
    ) -> Result<GetExportsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetExports", req).await
    }

    pub async fn get_strings(
        &self,
        req: &GetStringsRequest,
    ) -> Result<GetStringsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetStrings", req).await
    }

    pub async fn get_globals(
        &self,
        req: &GetGlobalsRequest,
    ) -> Result<GetGlobalsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetGlobals", req).await
    }

    pub async fn get_segments(
        &self,
        req: &GetSegmentsRequest,
    ) -> Result<GetSegmentsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetSegments", req).await
    }

    pub async fn list_structs(
        &self,
        req: &ListStructsRequest,
    ) -> Result<ListStructsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "ListStructs", req).await
    }

    pub async fn get_struct(&self, req: &GetStructRequest) -> Result<GetStructResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetStruct", req).await
    }

    pub async fn list_enums(&self, req: &ListEnumsRequest) -> Result<ListEnumsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "ListEnums", req).await
    }

    pub async fn get_enum(&self, req: &GetEnumRequest) -> Result<GetEnumResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetEnum", req).await
    }

    pub async fn get_bytes(&self, req: &GetBytesRequest) -> Result<GetBytesResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetBytes", req).await
    }

    pub async fn get_disasm(&self, req: &GetDisasmRequest) -> Result<GetDisasmResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetDisasm", req).await
    }

    pub async fn get_function_disasm(
        &self,
        req: &GetFunctionDisasmRequest,
    ) -> Result<GetFunctionDisasmResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetFunctionDisasm", req)
            .await
    }

    pub async fn get_decompiled(
        &self,
        req: &GetDecompiledRequest,
    ) -> Result<GetDecompiledResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetDecompiled", req)
            .await
    }

    pub async fn get_comment(
        &self,
        req: &GetCommentRequest,
    ) -> Result<GetCommentResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetComment", req).await
    }

    pub async fn get_func_comment(
        &self,
        req: &GetFuncCommentRequest,
    ) -> Result<GetFuncCommentResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetFuncComment", req)
            .await
    }

    pub async fn get_name(&self, req: &GetNameRequest) -> Result<GetNameResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetName", req).await
    }

    pub async fn get_function_name(
        &self,
        req: &GetFunctionNameRequest,
    ) -> Result<GetFunctionNameResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetFunctionName", req)
            .await
    }

    pub async fn get_function_info(
        &self,
        req: &GetFunctionInfoRequest,
    ) -> Result<GetFunctionInfoResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetFunctionInfo", req)
            .await
    }

    pub async fn get_type_at(&self, req: &GetTypeAtRequest) -> Result<GetTypeAtResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetTypeAt", req).await
    }

    pub async fn get_entry_point(
        &self,
        req: &GetEntryPointRequest,
    ) -> Result<GetEntryPointResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetEntryPoint", req)
            .await
    }

    pub async fn get_dword_at(
        &self,
        req: &GetDwordAtRequest,
    ) -> Result<GetDwordAtResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetDwordAt", req).await
    }

    pub async fn get_qword_at(
        &self,
        req: &GetQwordAtRequest,
    ) -> Result<GetQwordAtResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetQwordAt", req).await
    }

    pub async fn get_instruction_length(
        &self,
        req: &GetInstructionLengthRequest,
    ) -> Result<GetInstructionLengthResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetInstructionLength", req)
            .await
    }

    pub async fn get_xrefs_to(
        &self,
        req: &GetXRefsToRequest,
    ) -> Result<GetXRefsToResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetXRefsTo", req).await
    }

    pub async fn get_xrefs_from(
        &self,
        req: &GetXRefsFromRequest,
    ) -> Result<GetXRefsFromResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetXRefsFrom", req)
            .await
    }

    pub async fn get_data_refs(
        &self,
        req: &GetDataRefsRequest,
    ) -> Result<GetDataRefsResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "GetDataRefs", req).await
    }

    pub async fn get_string_xrefs(
        &self,
        req: &GetStringXRefsRequest,
    ) -> Result<GetStringXRefsResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "GetStringXRefs", req)
            .await
    }

    pub async fn set_comment(
        &self,
        req: &SetCommentRequest,
    ) -> Result<SetCommentResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "SetComment", req).await
    }

    pub async fn set_func_comment(
        &self,
        req: &SetFuncCommentRequest,
    ) -> Result<SetFuncCommentResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "SetFuncComment", req)
            .await
    }

    pub async fn set_decompiler_comment(
        &self,
        req: &SetDecompilerCommentRequest,
    ) -> Result<SetDecompilerCommentResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "SetDecompilerComment", req)
            .await
    }

    pub async fn set_name(&self, req: &SetNameRequest) -> Result<SetNameResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "SetName", req).await
    }

    pub async fn delete_name(
        &self,
        req: &DeleteNameRequest,
    ) -> Result<DeleteNameResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "DeleteName", req).await
    }

    pub async fn set_function_type(
        &self,
        req: &SetFunctionTypeRequest,
    ) -> Result<SetFunctionTypeResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "SetFunctionType", req)
            .await
    }

    pub async fn set_lvar_type(
        &self,
        req: &SetLvarTypeRequest,
    ) -> Result<SetLvarTypeResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "SetLvarType", req).await
    }

    pub async fn rename_lvar(
        &self,
        req: &RenameLvarRequest,
    ) -> Result<RenameLvarResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "RenameLvar", req).await
    }

    pub async fn set_global_type(
        &self,
        req: &SetGlobalTypeRequest,
    ) -> Result<SetGlobalTypeResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "SetGlobalType", req)
            .await
    }

    pub async fn rename_global(
        &self,
        req: &RenameGlobalRequest,
    ) -> Result<RenameGlobalResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "RenameGlobal", req)
            .await
    }

    pub async fn make_function(
        &self,
        req: &MakeFunctionRequest,
    ) -> Result<MakeFunctionResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "MakeFunction", req)
            .await
    }

    pub async fn data_read_string(
        &self,
        req: &DataReadStringRequest,
    ) -> Result<DataReadStringResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "DataReadString", req)
            .await
    }

    pub async fn data_read_byte(
        &self,
        req: &DataReadByteRequest,
    ) -> Result<DataReadByteResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "DataReadByte", req)
            .await
    }

    pub async fn find_binary(
        &self,
        req: &FindBinaryRequest,
    ) -> Result<FindBinaryResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "FindBinary", req).await
    }

    pub async fn find_text(&self, req: &FindTextRequest) -> Result<FindTextResponse, RpcError> {
        self.channel.unary(ANALYSIS_TOOLS, "FindText", req).await
    }

    pub async fn import_il2cpp(
        &self,
        req: &ImportIl2CppRequest,
    ) -> Result<ImportIl2CppResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "ImportIl2Cpp", req)
            .await
    }

    pub async fn import_flutter(
        &self,
        req: &ImportFlutterRequest,
    ) -> Result<ImportFlutterResponse, RpcError> {
        self.channel
            .unary(ANALYSIS_TOOLS, "ImportFlutter", req)
            .await
    }
}
