//! Mutating tools.
//!
//! Any successful mutation that can change enumeration results invalidates
//! the whole session cache; the next list read refetches from the worker.

use super::{
    AddressParams, GatewayServer, RenameGlobalParams, RenameLvarParams, SetCommentParams,
    SetDecompilerCommentParams, SetFuncCommentParams, SetFunctionTypeParams, SetGlobalTypeParams,
    SetLvarTypeParams, SetNameParams, ToolOutput,
};
use crate::error::{log_and_sanitize, GatewayError};
use crate::worker::proto::*;
use serde_json::json;

fn check_backend(context: &str, error: &str) -> Result<(), GatewayError> {
    if error.is_empty() {
        Ok(())
    } else {
        Err(log_and_sanitize(context, error))
    }
}

fn require(value: &str, what: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        Err(GatewayError::InvalidArgument(format!("{what} is required")))
    } else {
        Ok(())
    }
}

impl GatewayServer {
    pub(crate) async fn set_comment(
        &self,
        params: SetCommentParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_comment",
            &params.session_id,
            json!({"address": params.address, "repeatable": params.repeatable}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_comment(&SetCommentRequest {
                address: params.address,
                comment: params.comment,
                repeatable: params.repeatable,
            })
            .await
            .map_err(|e| log_and_sanitize("set_comment RPC call", e))?;
        check_backend("set_comment IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_func_comment(
        &self,
        params: SetFuncCommentParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_func_comment",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_func_comment(&SetFuncCommentRequest {
                address: params.address,
                comment: params.comment,
            })
            .await
            .map_err(|e| log_and_sanitize("set_func_comment RPC call", e))?;
        check_backend("set_func_comment IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_decompiler_comment(
        &self,
        params: SetDecompilerCommentParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_decompiler_comment",
            &params.session_id,
            json!({"function_address": params.function_address, "address": params.address}),
        );
        require(&params.comment, "comment")?;
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_decompiler_comment(&SetDecompilerCommentRequest {
                function_address: params.function_address,
                address: params.address,
                comment: params.comment,
            })
            .await
            .map_err(|e| log_and_sanitize("set_decompiler_comment RPC call", e))?;
        check_backend("set_decompiler_comment IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_name(
        &self,
        params: SetNameParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_name",
            &params.session_id,
            json!({"address": params.address, "name": params.name}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_name(&SetNameRequest {
                address: params.address,
                name: params.name,
            })
            .await
            .map_err(|e| log_and_sanitize("set_name RPC call", e))?;
        check_backend("set_name IDA operation", &resp.error)?;

        // Enumeration caches embed names; drop them so renames show up.
        if resp.success {
            self.cache.invalidate(&session.id);
        }
        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn delete_name(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "delete_name",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .delete_name(&DeleteNameRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("delete_name RPC call", e))?;
        check_backend("delete_name IDA operation", &resp.error)?;

        if resp.success {
            self.cache.invalidate(&session.id);
        }
        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_function_type(
        &self,
        params: SetFunctionTypeParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_function_type",
            &params.session_id,
            json!({"address": params.address}),
        );
        require(&params.prototype, "prototype")?;
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_function_type(&SetFunctionTypeRequest {
                address: params.address,
                prototype: params.prototype,
            })
            .await
            .map_err(|e| log_and_sanitize("set_function_type RPC call", e))?;
        check_backend("set_function_type IDA operation", &resp.error)?;

        if resp.success {
            self.cache.invalidate(&session.id);
        }
        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_lvar_type(
        &self,
        params: SetLvarTypeParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_lvar_type",
            &params.session_id,
            json!({"function_address": params.function_address, "lvar": params.lvar_name}),
        );
        require(&params.lvar_type, "lvar_type")?;
        if params.function_address == 0 {
            return Err(GatewayError::InvalidArgument(
                "function_address is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_lvar_type(&SetLvarTypeRequest {
                function_address: params.function_address,
                lvar_name: params.lvar_name,
                lvar_type: params.lvar_type,
            })
            .await
            .map_err(|e| log_and_sanitize("set_lvar_type RPC call", e))?;
        check_backend("set_lvar_type IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn rename_lvar(
        &self,
        params: RenameLvarParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "rename_lvar",
            &params.session_id,
            json!({"function_address": params.function_address, "lvar": params.lvar_name}),
        );
        require(&params.new_name, "new_name")?;
        if params.function_address == 0 {
            return Err(GatewayError::InvalidArgument(
                "function_address is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .rename_lvar(&RenameLvarRequest {
                function_address: params.function_address,
                lvar_name: params.lvar_name,
                new_name: params.new_name,
            })
            .await
            .map_err(|e| log_and_sanitize("rename_lvar RPC call", e))?;
        check_backend("rename_lvar IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn set_global_type(
        &self,
        params: SetGlobalTypeParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "set_global_type",
            &params.session_id,
            json!({"address": params.address}),
        );
        require(&params.type_decl, "type")?;
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .set_global_type(&SetGlobalTypeRequest {
                address: params.address,
                type_decl: params.type_decl,
            })
            .await
            .map_err(|e| log_and_sanitize("set_global_type RPC call", e))?;
        check_backend("set_global_type IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn rename_global(
        &self,
        params: RenameGlobalParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "rename_global",
            &params.session_id,
            json!({"address": params.address}),
        );
        require(&params.new_name, "new_name")?;
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .rename_global(&RenameGlobalRequest {
                address: params.address,
                new_name: params.new_name,
            })
            .await
            .map_err(|e| log_and_sanitize("rename_global RPC call", e))?;
        check_backend("rename_global IDA operation", &resp.error)?;

        if resp.success {
            self.cache.invalidate(&session.id);
        }
        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }

    pub(crate) async fn make_function(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "make_function",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .make_function(&MakeFunctionRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("make_function RPC call", e))?;
        check_backend("make_function IDA operation", &resp.error)?;

        if resp.success {
            self.cache.invalidate(&session.id);
        }
        Ok(ToolOutput::Json(json!({"success": resp.success})))
    }
}
