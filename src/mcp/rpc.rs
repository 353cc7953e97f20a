//! JSON-RPC envelopes and error mapping
//!
//! Argument problems surface as JSON-RPC errors. Upstream failures of a tool
//! are not protocol errors; they are returned as tool results with `isError`.

use rust_mcp_sdk::schema::{
    CallToolResult, ContentBlock, JsonrpcErrorResponse, JsonrpcResultResponse, RequestId,
    Result as McpResult, RpcError, TextContent,
};
use serde_json::{json, Map, Value};

use crate::errors::AppError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const UNAUTHORIZED: i32 = -32001;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(json!({ "code": code, "message": message, "details": {} })),
        ),
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            UNAUTHORIZED,
            "Unauthorized",
            Some(json!({ "code": code, "message": message, "details": {} })),
        ),
        err @ (AppError::Upstream { .. } | AppError::Unexpected { .. }) => {
            json_rpc_result(id, tool_error_result(&err.to_string()))
        }
        AppError::Internal { message, .. } => {
            tracing::error!(error = %message, "mcp request failed with internal error");
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    let Some(request_id) = id.as_ref().and_then(value_to_request_id) else {
        return json!({ "jsonrpc": "2.0", "id": id, "result": result });
    };

    let response = JsonrpcResultResponse::new(
        request_id,
        McpResult {
            meta: None,
            extra: result.as_object().cloned(),
        },
    );
    serde_json::to_value(response).expect("jsonrpc result response serialization")
}

/// Wraps a tool payload: the JSON text for the model, plus the same data as
/// structured content. Lists are placed under `items`.
pub fn tool_success_result(payload: &Value) -> Value {
    let structured = match payload {
        Value::Object(map) => map.clone(),
        other => Map::from_iter([("items".to_string(), other.clone())]),
    };

    serde_json::to_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(
            payload.to_string(),
            None,
            None,
        ))],
        is_error: None,
        meta: None,
        structured_content: Some(structured),
    })
    .expect("tool result serialization")
}

pub fn tool_error_result(message: &str) -> Value {
    serde_json::to_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(
            message.to_string(),
            None,
            None,
        ))],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    })
    .expect("tool error result serialization")
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(id) => Some(RequestId::String(id.clone())),
        other => other.as_i64().map(RequestId::Integer),
    }
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::wca_client::ApiError;

    #[test]
    fn bad_request_maps_to_invalid_params() {
        let response = app_error_to_json_rpc(
            Some(json!(7)),
            AppError::bad_request("invalid_wca_id", "wca_id must look like 2003SEAR02"),
        );

        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["data"]["code"], "invalid_wca_id");
        assert_eq!(response["id"], 7);
    }

    #[test]
    fn upstream_failure_becomes_tool_error_result() {
        let response = app_error_to_json_rpc(
            Some(json!("req-1")),
            AppError::from_api(
                "get competition WC1900",
                ApiError::NotFound {
                    endpoint: "competitions/WC1900.json".to_string(),
                    status: 404,
                },
            ),
        );

        assert!(!is_json_rpc_error(&response));
        assert_eq!(response["result"]["isError"], true);
        let text = response["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        assert!(text.starts_with("failed to get competition WC1900"));
        assert!(text.contains("404"));
    }

    #[test]
    fn list_payload_is_wrapped_in_items() {
        let result = tool_success_result(&json!([{ "id": "333" }]));

        assert_eq!(result["structuredContent"]["items"][0]["id"], "333");
        assert_eq!(result["content"][0]["text"], r#"[{"id":"333"}]"#);
    }

    #[test]
    fn result_without_id_keeps_null_id() {
        let response = json_rpc_result(None, json!({}));
        assert!(response["id"].is_null());
        assert_eq!(response["jsonrpc"], "2.0");
    }
}
