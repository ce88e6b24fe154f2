//! Raw data reads and byte/text searches.

use super::{
    AddressParams, DataReadStringParams, FindBinaryParams, FindTextParams, GatewayServer,
    ToolOutput,
};
use crate::error::{log_and_sanitize, GatewayError};
use crate::worker::proto::*;
use serde_json::json;

const DEFAULT_READ_STRING_MAX: u32 = 256;

fn check_backend(context: &str, error: &str) -> Result<(), GatewayError> {
    if error.is_empty() {
        Ok(())
    } else {
        Err(log_and_sanitize(context, error))
    }
}

impl GatewayServer {
    pub(crate) async fn data_read_string(
        &self,
        params: DataReadStringParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "data_read_string",
            &params.session_id,
            json!({"address": params.address, "max_length": params.max_length}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let max_length = if params.max_length == 0 {
            DEFAULT_READ_STRING_MAX
        } else {
            params.max_length
        };
        let resp = client
            .analysis
            .data_read_string(&DataReadStringRequest {
                address: params.address,
                max_length,
            })
            .await
            .map_err(|e| log_and_sanitize("data_read_string RPC call", e))?;
        check_backend("data_read_string IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"value": resp.value})))
    }

    pub(crate) async fn data_read_byte(
        &self,
        params: AddressParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "data_read_byte",
            &params.session_id,
            json!({"address": params.address}),
        );
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .data_read_byte(&DataReadByteRequest {
                address: params.address,
            })
            .await
            .map_err(|e| log_and_sanitize("data_read_byte RPC call", e))?;
        check_backend("data_read_byte IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"value": resp.value})))
    }

    pub(crate) async fn find_binary(
        &self,
        params: FindBinaryParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "find_binary",
            &params.session_id,
            json!({"pattern": params.pattern}),
        );
        if params.pattern.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "pattern is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .find_binary(&FindBinaryRequest {
                start: params.start,
                end: params.end,
                pattern: params.pattern,
                search_up: params.search_up,
            })
            .await
            .map_err(|e| log_and_sanitize("find_binary RPC call", e))?;
        check_backend("find_binary IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"addresses": resp.addresses})))
    }

    pub(crate) async fn find_text(
        &self,
        params: FindTextParams,
    ) -> Result<ToolOutput, GatewayError> {
        self.log_tool(
            "find_text",
            &params.session_id,
            json!({"needle": params.needle}),
        );
        if params.needle.trim().is_empty() {
            return Err(GatewayError::InvalidArgument(
                "needle is required".to_string(),
            ));
        }
        let session = self.session(&params.session_id)?;
        session.touch();
        let client = self.client_for(&session).await?;

        let resp = client
            .analysis
            .find_text(&FindTextRequest {
                start: params.start,
                end: params.end,
                needle: params.needle,
                case_sensitive: params.case_sensitive,
                unicode: params.unicode,
            })
            .await
            .map_err(|e| log_and_sanitize("find_text RPC call", e))?;
        check_backend("find_text IDA operation", &resp.error)?;

        Ok(ToolOutput::Json(json!({"addresses": resp.addresses})))
    }
}
