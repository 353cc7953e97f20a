//! MCP method dispatch
//!
//! Decodes JSON-RPC messages, validates the params of known methods against
//! the MCP schema, and routes to the tool and resource handlers.

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListResourcesRequest, ListResourcesResult, ListToolsRequest, ListToolsResult,
    PingRequest, ReadResourceRequest, ServerCapabilities, ServerCapabilitiesResources,
    ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::{
    resources::{build_resources_list, handle_resources_read},
    tools::{build_tools_list, handle_tools_call},
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    request_id_to_value, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use crate::{errors::AppError, AppState};

/// Oldest first; the last entry is offered when a client asks for an
/// unknown revision.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

const SERVER_INSTRUCTIONS: &str = "Read-only access to World Cube Association data: events, \
countries, continents, competitions, championships, competitors, rankings and results. \
Times are in centiseconds.";

pub async fn handle_json_rpc_value(state: &AppState, payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let raw_id = payload.get("id").cloned();
    let message: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(raw_id, INVALID_REQUEST, "Invalid Request")),
    };

    match message {
        JsonrpcMessage::Request(request) => {
            let id = Some(request_id_to_value(request.id.clone()));
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(id, INVALID_REQUEST, "Invalid Request"));
            }
            if !has_valid_params(&request) {
                return Some(json_rpc_error(id, INVALID_PARAMS, "Invalid params"));
            }

            Some(dispatch(state, id, &request.method, request.params.map(Value::Object)).await)
        }
        JsonrpcMessage::Notification(notification) => {
            // Notifications such as `notifications/initialized` need no reply.
            info!(method = %notification.method, "mcp notification received");
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(raw_id, INVALID_REQUEST, "Invalid Request"))
        }
    }
}

fn has_valid_params(request: &JsonrpcRequest) -> bool {
    let payload = serde_json::to_value(request).expect("jsonrpc request serialization");

    match request.method.as_str() {
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        _ => true,
    }
}

async fn dispatch(state: &AppState, id: Option<Value>, method: &str, params: Option<Value>) -> Value {
    let tool_name = params
        .as_ref()
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let response = match method {
        "initialize" => match negotiate_protocol_version(params.as_ref()) {
            Ok(version) => json_rpc_result(id, initialize_result(state, version)),
            Err(err) => app_error_to_json_rpc(id, err),
        },
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => json_rpc_result(
            id,
            serde_json::to_value(ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: build_tools_list(),
            })
            .expect("tools list result serialization"),
        ),
        "tools/call" => handle_tools_call(state, id, params).await,
        "resources/list" => json_rpc_result(
            id,
            serde_json::to_value(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: build_resources_list(),
            })
            .expect("resources list result serialization"),
        ),
        "resources/read" => handle_resources_read(state, id, params).await,
        _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    let outcome = if is_json_rpc_error(&response) {
        "failure"
    } else if response["result"]["isError"] == json!(true) {
        "tool_error"
    } else {
        "success"
    };
    info!(
        method = %method,
        tool = tool_name.as_deref().unwrap_or("-"),
        outcome,
        "mcp request handled"
    );

    response
}

fn initialize_result(state: &AppState, protocol_version: &str) -> Value {
    let result = InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some(state.server_name.to_string()),
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: Some(ServerCapabilitiesResources {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: None,
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        meta: None,
    };

    serde_json::to_value(result).expect("initialize result serialization")
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    let latest = SUPPORTED_PROTOCOL_VERSIONS[SUPPORTED_PROTOCOL_VERSIONS.len() - 1];
    Ok(SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|version| *version == offered)
        .unwrap_or(latest))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{negotiate_protocol_version, SUPPORTED_PROTOCOL_VERSIONS};

    #[test]
    fn echoes_supported_version() {
        let params = json!({ "protocolVersion": "2024-11-05" });
        assert_eq!(
            negotiate_protocol_version(Some(&params)).expect("supported version"),
            "2024-11-05"
        );
    }

    #[test]
    fn offers_latest_for_unknown_version() {
        let params = json!({ "protocolVersion": "2030-01-01" });
        assert_eq!(
            negotiate_protocol_version(Some(&params)).expect("fallback version"),
            SUPPORTED_PROTOCOL_VERSIONS[2]
        );
    }

    #[test]
    fn missing_version_is_bad_request() {
        let error = negotiate_protocol_version(Some(&json!({}))).expect_err("must fail");
        assert!(error.to_string().contains("bad request"));
    }
}
