//! Il2Cpp and Flutter metadata imports.
//!
//! Imports define and rename functions wholesale, so a successful import
//! invalidates the session cache the same way `make_function` does. A
//! worker-reported error with `success: true` is surfaced as a non-fatal
//! `warning`.

use super::{GatewayServer, ImportFlutterParams, ImportIl2cppParams, ToolOutput};
use crate::error::{log_and_sanitize, GatewayError};
use crate::worker::proto::{ImportFlutterRequest, ImportIl2CppRequest};
use serde_json::json;

const IMPORT_TIP: &str =
    "Run run_auto_analysis after import to refresh cross references and caches.";

impl GatewayServer {
    pub(crate) async fn import_il2cpp(
        &self,
        params: ImportIl2cppParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "import_il2cpp",
            &params.session_id,
            json!({"fields": params.fields.len()}),
        );
        if params.script_path.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "script_path is required".to_string(),
            ));
        }
        if params.il2cpp_path.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "il2cpp_path is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .import_il2cpp(&ImportIl2CppRequest {
                script_path: params.script_path,
                il2cpp_path: params.il2cpp_path,
                fields: params.fields,
            })
            .await
            .map_err(|e| log_and_sanitize("import_il2cpp RPC call", e))?;
        if !resp.error.is_empty() && !resp.success {
            return Err(log_and_sanitize("import_il2cpp IDA operation", &resp.error));
        }

        if resp.success {
            self.cache.invalidate(&session.id);
        }

        let mut result = json!({
            "success": resp.success,
            "duration_seconds": resp.duration_seconds,
            "functions_defined": resp.functions_defined,
            "functions_named": resp.functions_named,
            "strings_named": resp.strings_named,
            "metadata_named": resp.metadata_named,
            "metadata_methods": resp.metadata_methods,
            "signatures_applied": resp.signatures_applied,
            "analysis_tip": IMPORT_TIP,
        });
        if !resp.error.is_empty() {
            result["warning"] = json!(resp.error);
        }
        Ok(ToolOutput::Json(result))
    }

    pub(crate) async fn import_flutter(
        &self,
        params: ImportFlutterParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "import_flutter",
            &params.session_id,
            json!({"meta_json_path": params.meta_json_path}),
        );
        if params.meta_json_path.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "meta_json_path is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .import_flutter(&ImportFlutterRequest {
                meta_json_path: params.meta_json_path,
            })
            .await
            .map_err(|e| log_and_sanitize("import_flutter RPC call", e))?;
        if !resp.error.is_empty() && !resp.success {
            return Err(log_and_sanitize("import_flutter IDA operation", &resp.error));
        }

        if resp.success {
            self.cache.invalidate(&session.id);
        }

        let mut result = json!({
            "success": resp.success,
            "duration_seconds": resp.duration_seconds,
            "functions_created": resp.functions_created,
            "functions_named": resp.functions_named,
            "structs_created": resp.structs_created,
            "signatures_applied": resp.signatures_applied,
            "comments_set": resp.comments_set,
            "analysis_tip": IMPORT_TIP,
        });
        if !resp.error.is_empty() {
            result["warning"] = json!(resp.error);
        }
        Ok(ToolOutput::Json(result))
    }
}
