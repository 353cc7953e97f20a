//! WCA tools exposed via Model Context Protocol
//!
//! Each tool validates its arguments, opens a client session for the
//! duration of the call, and reshapes the upstream payload where the raw
//! file would be too large to be useful to a model.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::models::{EventResult, Person};
use crate::domain::utils::{
    normalize_page, normalize_path_segment, normalize_rank_type, normalize_region,
    normalize_wca_id, parse_competition_date, shape_person, summarize_event_results, PersonView,
    DEFAULT_MAX_RECENT_COMPETITIONS, DEFAULT_ROUND,
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_error_with_data, json_rpc_result,
    tool_success_result, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::wca_client::{WcaSession, CHAMPIONSHIPS_PER_PAGE};
use crate::{errors::AppError, AppState};

#[macros::mcp_tool(
    name = "get_wca_events",
    description = "List all official WCA events with their IDs, names and formats"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetWcaEventsTool {}

#[macros::mcp_tool(
    name = "get_wca_countries",
    description = "List all countries recognized by the WCA with names and ISO2 codes used for regional filtering"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetWcaCountriesTool {}

#[macros::mcp_tool(
    name = "get_wca_continents",
    description = "List all continents recognized by the WCA with names and identifiers used for regional filtering"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetWcaContinentsTool {}

#[macros::mcp_tool(
    name = "get_person_by_wca_id",
    description = "Get a competitor by WCA ID. Returns identity, personal records, rankings and medals by default; competition results only on request"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPersonByWcaIdTool {
    /// WCA ID of the person, e.g. 2003SEAR02
    pub wca_id: String,
    /// Only return results from this competition, e.g. WC2023
    pub competition_id: Option<String>,
    /// Include detailed competition results (default false)
    pub include_competition_results: Option<bool>,
    /// Include personal records (default true)
    pub include_personal_records: Option<bool>,
    /// Include world, continental and national rankings (default true)
    pub include_rankings: Option<bool>,
    /// Include medal counts (default true)
    pub include_medals: Option<bool>,
    /// With results included, keep only the N most recent competitions; 0 keeps all (default 5)
    pub max_recent_competitions: Option<u32>,
}

#[macros::mcp_tool(
    name = "get_rankings",
    description = "Get current rankings for an event in the world, a continent or a country"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetRankingsTool {
    /// WCA event ID, e.g. 333 or 222
    pub event_id: String,
    /// "world", a continent ID or a country ISO2 code (default "world")
    pub region: Option<String>,
    /// "single" or "average" (default "single")
    pub ranking_type: Option<String>,
}

#[macros::mcp_tool(
    name = "search_competitions_by_date",
    description = "List the competitions held on one calendar date"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchCompetitionsByDateTool {
    pub year: i32,
    /// 1-12
    pub month: u32,
    /// 1-31
    pub day: u32,
}

#[macros::mcp_tool(
    name = "search_competitions_by_event",
    description = "List competitions featuring an event, one page at a time"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchCompetitionsByEventTool {
    /// WCA event ID, e.g. 333bf
    pub event_id: String,
    /// Page number starting at 1 (default 1)
    pub page: Option<u32>,
}

#[macros::mcp_tool(
    name = "get_competition_by_id",
    description = "Get details of a competition: dates, venue, events, delegates and organisers"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetCompetitionByIdTool {
    /// WCA competition ID, e.g. WC2023
    pub competition_id: String,
}

#[macros::mcp_tool(
    name = "search_championships",
    description = "List world, continental and national championships, 25 per page"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchChampionshipsTool {
    /// Page number starting at 1 (default 1)
    pub page: Option<u32>,
    /// "world", a continent ID or a country ISO2 code; omit for all championships
    pub championship_type: Option<String>,
}

#[macros::mcp_tool(
    name = "get_championship_details",
    description = "Get details of a championship by ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetChampionshipDetailsTool {
    /// Championship ID, e.g. WC2023
    pub championship_id: String,
}

#[macros::mcp_tool(
    name = "get_competition_results",
    description = "Get all results of a competition across every event and round"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetCompetitionResultsTool {
    /// WCA competition ID
    pub competition_id: String,
}

#[macros::mcp_tool(
    name = "get_competition_event_results",
    description = "Get compact results of one event in a competition, Final round by default"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetCompetitionEventResultsTool {
    /// WCA competition ID
    pub competition_id: String,
    /// WCA event ID, e.g. 333
    pub event_id: String,
    /// Round name such as "Final" or "First round", or "all" (default "Final")
    pub round: Option<String>,
    /// Maximum number of rows to return
    pub limit: Option<u32>,
    /// Include individual attempt times (default false)
    pub include_solves: Option<bool>,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        GetWcaEventsTool::tool(),
        GetWcaCountriesTool::tool(),
        GetWcaContinentsTool::tool(),
        GetPersonByWcaIdTool::tool(),
        GetRankingsTool::tool(),
        SearchCompetitionsByDateTool::tool(),
        SearchCompetitionsByEventTool::tool(),
        GetCompetitionByIdTool::tool(),
        SearchChampionshipsTool::tool(),
        GetChampionshipDetailsTool::tool(),
        GetCompetitionResultsTool::tool(),
        GetCompetitionEventResultsTool::tool(),
    ]
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };
    let arguments = Value::Object(tool_call.arguments.unwrap_or_default());

    let outcome = match tool_call.name.as_str() {
        "get_wca_events" => get_wca_events(state).await,
        "get_wca_countries" => get_wca_countries(state).await,
        "get_wca_continents" => get_wca_continents(state).await,
        "get_person_by_wca_id" => get_person_by_wca_id(state, arguments).await,
        "get_rankings" => get_rankings(state, arguments).await,
        "search_competitions_by_date" => search_competitions_by_date(state, arguments).await,
        "search_competitions_by_event" => search_competitions_by_event(state, arguments).await,
        "get_competition_by_id" => get_competition_by_id(state, arguments).await,
        "search_championships" => search_championships(state, arguments).await,
        "get_championship_details" => get_championship_details(state, arguments).await,
        "get_competition_results" => get_competition_results(state, arguments).await,
        "get_competition_event_results" => get_competition_event_results(state, arguments).await,
        _ => {
            return json_rpc_error_with_data(
                id,
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({
                    "code": "tool_not_found",
                    "message": "unknown tool name",
                    "details": { "name": tool_call.name },
                })),
            )
        }
    };

    match outcome {
        Ok(payload) => json_rpc_result(id, tool_success_result(&payload)),
        Err(err) => {
            if err.is_tool_failure() {
                warn!(tool = %tool_call.name, error = %err, "tool call failed");
            }
            app_error_to_json_rpc(id, err)
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, AppError> {
    serde_json::from_value(arguments)
        .map_err(|err| AppError::bad_request("invalid_arguments", err.to_string()))
}

fn open_session(state: &AppState, action: &str) -> Result<WcaSession, AppError> {
    state
        .wca
        .session()
        .map_err(|err| AppError::internal(format!("{action}: {err}")))
}

async fn get_wca_events(state: &AppState) -> Result<Value, AppError> {
    let action = "fetch WCA events";
    let session = open_session(state, action)?;
    let events = session
        .get_events()
        .await
        .map_err(|err| AppError::from_api(action, err))?;
    Ok(Value::Array(events))
}

async fn get_wca_countries(state: &AppState) -> Result<Value, AppError> {
    let action = "fetch WCA countries";
    let session = open_session(state, action)?;
    let countries = session
        .get_countries()
        .await
        .map_err(|err| AppError::from_api(action, err))?;
    Ok(Value::Array(countries))
}

async fn get_wca_continents(state: &AppState) -> Result<Value, AppError> {
    let action = "fetch WCA continents";
    let session = open_session(state, action)?;
    let continents = session
        .get_continents()
        .await
        .map_err(|err| AppError::from_api(action, err))?;
    Ok(Value::Array(continents))
}

async fn get_person_by_wca_id(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetPersonByWcaIdTool = parse_arguments(arguments)?;
    let wca_id = normalize_wca_id(&args.wca_id)?;
    let view = PersonView {
        competition_id: args
            .competition_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        include_competition_results: args.include_competition_results.unwrap_or(false),
        include_personal_records: args.include_personal_records.unwrap_or(true),
        include_rankings: args.include_rankings.unwrap_or(true),
        include_medals: args.include_medals.unwrap_or(true),
        max_recent_competitions: args
            .max_recent_competitions
            .unwrap_or(DEFAULT_MAX_RECENT_COMPETITIONS),
    };

    let action = format!("get person {wca_id}");
    let session = open_session(state, &action)?;
    let body = session
        .get_person(&wca_id)
        .await
        .map_err(|err| AppError::from_api(&action, err))?;
    let person: Person =
        serde_json::from_value(body).map_err(|err| AppError::unexpected(&action, err))?;

    Ok(Value::Object(shape_person(person, &view)))
}

async fn get_rankings(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetRankingsTool = parse_arguments(arguments)?;
    let event_id = normalize_path_segment("invalid_event_id", "event_id", &args.event_id)?;
    let region = normalize_region(args.region)?;
    let rank_type = normalize_rank_type(args.ranking_type)?;

    let action = format!("get rankings for {event_id}");
    let session = open_session(state, &action)?;
    session
        .get_rankings(&event_id, &region, rank_type)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn search_competitions_by_date(
    state: &AppState,
    arguments: Value,
) -> Result<Value, AppError> {
    let args: SearchCompetitionsByDateTool = parse_arguments(arguments)?;
    let date = parse_competition_date(args.year, args.month, args.day)?;

    let action = format!("search competitions on {date}");
    let session = open_session(state, &action)?;
    session
        .get_competitions_by_date(date)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn search_competitions_by_event(
    state: &AppState,
    arguments: Value,
) -> Result<Value, AppError> {
    let args: SearchCompetitionsByEventTool = parse_arguments(arguments)?;
    let event_id = normalize_path_segment("invalid_event_id", "event_id", &args.event_id)?;
    let page = normalize_page(args.page)?;

    let action = format!("search competitions by event {event_id}");
    let session = open_session(state, &action)?;
    session
        .get_competitions_by_event(&event_id, page)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn get_competition_by_id(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetCompetitionByIdTool = parse_arguments(arguments)?;
    let competition_id = normalize_path_segment(
        "invalid_competition_id",
        "competition_id",
        &args.competition_id,
    )?;

    let action = format!("get competition {competition_id}");
    let session = open_session(state, &action)?;
    session
        .get_competition(&competition_id)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn search_championships(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: SearchChampionshipsTool = parse_arguments(arguments)?;
    let page = normalize_page(args.page)?;
    let championship_type = args
        .championship_type
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    let action = "search championships";
    let session = open_session(state, action)?;
    let championships = session
        .get_championships(page, CHAMPIONSHIPS_PER_PAGE, championship_type.as_deref())
        .await
        .map_err(|err| AppError::from_api(action, err))?;

    serde_json::to_value(championships).map_err(|err| AppError::unexpected(action, err))
}

async fn get_championship_details(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetChampionshipDetailsTool = parse_arguments(arguments)?;
    let championship_id = normalize_path_segment(
        "invalid_championship_id",
        "championship_id",
        &args.championship_id,
    )?;

    let action = format!("get championship {championship_id}");
    let session = open_session(state, &action)?;
    session
        .get_championship(&championship_id)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn get_competition_results(state: &AppState, arguments: Value) -> Result<Value, AppError> {
    let args: GetCompetitionResultsTool = parse_arguments(arguments)?;
    let competition_id = normalize_path_segment(
        "invalid_competition_id",
        "competition_id",
        &args.competition_id,
    )?;

    let action = format!("get results for competition {competition_id}");
    let session = open_session(state, &action)?;
    session
        .get_competition_results(&competition_id)
        .await
        .map_err(|err| AppError::from_api(&action, err))
}

async fn get_competition_event_results(
    state: &AppState,
    arguments: Value,
) -> Result<Value, AppError> {
    let args: GetCompetitionEventResultsTool = parse_arguments(arguments)?;
    let competition_id = normalize_path_segment(
        "invalid_competition_id",
        "competition_id",
        &args.competition_id,
    )?;
    let event_id = normalize_path_segment("invalid_event_id", "event_id", &args.event_id)?;
    let round = args.round.unwrap_or_else(|| DEFAULT_ROUND.to_string());
    let include_solves = args.include_solves.unwrap_or(false);

    let action = format!("get {event_id} results for competition {competition_id}");
    let session = open_session(state, &action)?;
    let mut body = session
        .get_competition_event_results(&competition_id, &event_id)
        .await
        .map_err(|err| AppError::from_api(&action, err))?;

    // Payloads without an item list are returned as served.
    if !body.get("items").is_some_and(Value::is_array) {
        return Ok(body);
    }

    let results: Vec<EventResult> = serde_json::from_value(body["items"].take())
        .map_err(|err| AppError::unexpected(&action, err))?;
    let page = summarize_event_results(results, &round, args.limit, include_solves);

    serde_json::to_value(page).map_err(|err| AppError::unexpected(&action, err))
}
