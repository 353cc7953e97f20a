//! Reference data exposed as MCP resources
//!
//! Events, countries and continents change rarely and are small, so they are
//! also offered as readable documents under `resource://wca/`.

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::{json, Value};

use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};
use crate::{errors::AppError, wca_client::ApiError, AppState};

pub const EVENTS_RESOURCE_URI: &str = "resource://wca/events";
pub const COUNTRIES_RESOURCE_URI: &str = "resource://wca/countries";
pub const CONTINENTS_RESOURCE_URI: &str = "resource://wca/continents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceList {
    Events,
    Countries,
    Continents,
}

impl ReferenceList {
    const ALL: [Self; 3] = [Self::Events, Self::Countries, Self::Continents];

    fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.uri() == uri)
    }

    fn uri(self) -> &'static str {
        match self {
            Self::Events => EVENTS_RESOURCE_URI,
            Self::Countries => COUNTRIES_RESOURCE_URI,
            Self::Continents => CONTINENTS_RESOURCE_URI,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Countries => "countries",
            Self::Continents => "continents",
        }
    }

    fn resource(self) -> Resource {
        let (name, description) = match self {
            Self::Events => ("WCA Events", "Official WCA events with IDs, names and formats"),
            Self::Countries => ("WCA Countries", "Countries with names and ISO2 codes"),
            Self::Continents => ("WCA Continents", "Continents with names and identifiers"),
        };

        Resource {
            annotations: None,
            description: Some(description.to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some("application/json".to_string()),
            name: name.to_string(),
            size: None,
            title: None,
            uri: self.uri().to_string(),
        }
    }
}

pub fn build_resources_list() -> Vec<Resource> {
    ReferenceList::ALL
        .into_iter()
        .map(ReferenceList::resource)
        .collect()
}

async fn fetch_list(state: &AppState, list: ReferenceList) -> Result<Vec<Value>, ApiError> {
    let session = state.wca.session()?;
    match list {
        ReferenceList::Events => session.get_events().await,
        ReferenceList::Countries => session.get_countries().await,
        ReferenceList::Continents => session.get_continents().await,
    }
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let Some(list) = ReferenceList::from_uri(&resource_read.uri) else {
        return json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({
                "code": "resource_not_found",
                "message": "unknown resource uri",
                "details": { "uri": resource_read.uri },
            })),
        );
    };

    match fetch_list(state, list).await {
        Ok(items) => {
            let result = serde_json::to_value(ReadResourceResult {
                contents: vec![ReadResourceContent::from(TextResourceContents {
                    meta: None,
                    mime_type: Some("application/json".to_string()),
                    text: json!({ list.key(): items }).to_string(),
                    uri: list.uri().to_string(),
                })],
                meta: None,
            })
            .expect("read resource result serialization");

            json_rpc_result(id, result)
        }
        Err(err) => {
            let err = AppError::from_api(format!("read {}", list.uri()), err);
            tracing::warn!(uri = list.uri(), error = %err, "resource read failed");
            json_rpc_error_with_data(
                id,
                INTERNAL_ERROR,
                "Internal error",
                Some(json!({
                    "code": "upstream_error",
                    "message": err.to_string(),
                    "details": { "uri": list.uri() },
                })),
            )
        }
    }
}
