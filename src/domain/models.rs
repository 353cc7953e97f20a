//! Typed views of the WCA REST API payloads
//!
//! Upstream JSON is passed through untouched wherever a tool does not reshape
//! it. The types here cover the pieces that are filtered, projected or
//! re-paginated locally. Fields are optional because the static API omits
//! keys rather than sending nulls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ranking flavour: best single solve or best average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankType {
    Single,
    Average,
}

impl RankType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Average => "average",
        }
    }
}

impl fmt::Display for RankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
}

/// One page of championships, sliced locally from `championships.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionshipPage {
    pub items: Vec<Value>,
    pub total: usize,
    pub page: u32,
    pub per_page: usize,
    pub pagination: Pagination,
}

/// Competitor record from `persons/{id}.json`.
///
/// `competition_ids` is listed oldest first by the upstream API; the
/// "most recent competitions" selection relies on that ordering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub country: Option<String>,
    pub number_of_competitions: Option<u64>,
    pub number_of_championships: Option<u64>,
    pub competition_ids: Option<Vec<String>>,
    pub championship_ids: Option<Vec<String>>,
    pub records: Option<Value>,
    pub rank: Option<Value>,
    pub medals: Option<Value>,
    /// Results keyed by competition ID, then event ID.
    pub results: Option<Map<String, Value>>,
}

/// Single row of `results/{competitionId}/{eventId}.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    pub person_id: Option<String>,
    pub round: Option<String>,
    pub position: Option<i64>,
    pub best: Option<i64>,
    pub average: Option<i64>,
    /// Attempt values in centiseconds; `-1` is DNF and `-2` DNS.
    pub solves: Option<Vec<i64>>,
}

/// Compact projection of an [`EventResult`] returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub person_id: Option<String>,
    pub round: Option<String>,
    pub position: Option<i64>,
    pub best: Option<i64>,
    pub average: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solves: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultFilter {
    pub round: String,
    pub limit: Option<u32>,
    pub include_solves: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventResultsPage {
    pub pagination: Pagination,
    pub total: usize,
    pub filter: ResultFilter,
    pub items: Vec<ResultSummary>,
}
