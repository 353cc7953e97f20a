//! Axum HTTP handlers for the web server
//!
//! Provides the Model Context Protocol endpoint and metadata endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::domain::tools::build_tools_list;
use crate::mcp::rpc::{json_rpc_error, INVALID_REQUEST, PARSE_ERROR};
use crate::mcp::server::handle_json_rpc_value;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub title: String,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub tools: Vec<String>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        title: state.server_name.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
        tools: build_tools_list()
            .into_iter()
            .map(|tool| tool.name)
            .collect(),
    })
}

pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return Json(json_rpc_error(None, PARSE_ERROR, "Parse error")).into_response(),
    };

    let Value::Array(batch) = payload else {
        return match handle_json_rpc_value(&state, payload).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        };
    };

    if batch.is_empty() {
        return Json(vec![json_rpc_error(None, INVALID_REQUEST, "Invalid Request")])
            .into_response();
    }

    let mut responses = Vec::with_capacity(batch.len());
    for item in batch {
        if let Some(response) = handle_json_rpc_value(&state, item).await {
            responses.push(response);
        }
    }

    if responses.is_empty() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(Value::Array(responses)).into_response()
    }
}
