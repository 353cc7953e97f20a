//! Argument normalization and response reshaping shared by the tools

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::domain::models::{
    EventResult, EventResultsPage, Pagination, Person, RankType, ResultFilter, ResultSummary,
};
use crate::errors::AppError;

pub const DEFAULT_REGION: &str = "world";
pub const DEFAULT_ROUND: &str = "Final";
pub const ALL_ROUNDS: &str = "all";
pub const DEFAULT_MAX_RECENT_COMPETITIONS: u32 = 5;
pub const RESULTS_NOTE_KEY: &str = "_results_note";

static WCA_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[A-Z]{4}\d{2}$").expect("valid WCA ID pattern"));

/// Accepts an identifier that is interpolated into a file path upstream.
pub fn normalize_path_segment(
    code: &'static str,
    field: &str,
    value: &str,
) -> Result<String, AppError> {
    let normalized = value.trim();
    let invalid = normalized.is_empty()
        || normalized == "."
        || normalized == ".."
        || normalized
            .chars()
            .any(|character| matches!(character, '/' | '\\' | '?' | '#') || character.is_control());

    if invalid {
        return Err(AppError::bad_request(
            code,
            format!("{field} must be a non-empty identifier without path separators"),
        ));
    }

    Ok(normalized.to_string())
}

pub fn normalize_wca_id(value: &str) -> Result<String, AppError> {
    let normalized = value.trim().to_ascii_uppercase();
    if !WCA_ID_PATTERN.is_match(&normalized) {
        return Err(AppError::bad_request(
            "invalid_wca_id",
            "wca_id must be four digits, four letters and two digits, e.g. 2003SEAR02",
        ));
    }
    Ok(normalized)
}

pub fn normalize_rank_type(value: Option<String>) -> Result<RankType, AppError> {
    let Some(value) = value else {
        return Ok(RankType::Single);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "single" => Ok(RankType::Single),
        "average" => Ok(RankType::Average),
        _ => Err(AppError::bad_request(
            "invalid_ranking_type",
            "ranking_type must be one of: single, average",
        )),
    }
}

pub fn normalize_region(value: Option<String>) -> Result<String, AppError> {
    match value {
        None => Ok(DEFAULT_REGION.to_string()),
        Some(region) => normalize_path_segment("invalid_region", "region", &region),
    }
}

pub fn normalize_page(page: Option<u32>) -> Result<u32, AppError> {
    match page.unwrap_or(1) {
        0 => Err(AppError::bad_request(
            "invalid_page",
            "page must be at least 1",
        )),
        page => Ok(page),
    }
}

pub fn parse_competition_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        AppError::bad_request(
            "invalid_date",
            format!("{year}-{month:02}-{day:02} is not a valid calendar date"),
        )
    })
}

#[derive(Debug, Clone)]
pub struct PersonView {
    pub competition_id: Option<String>,
    pub include_competition_results: bool,
    pub include_personal_records: bool,
    pub include_rankings: bool,
    pub include_medals: bool,
    /// Keeps the last N entries of `competitionIds`, which the API serves in
    /// chronological order. `0` keeps every competition.
    pub max_recent_competitions: u32,
}

impl Default for PersonView {
    fn default() -> Self {
        Self {
            competition_id: None,
            include_competition_results: false,
            include_personal_records: true,
            include_rankings: true,
            include_medals: true,
            max_recent_competitions: DEFAULT_MAX_RECENT_COMPETITIONS,
        }
    }
}

/// Trims a person record down to what `view` asks for.
///
/// A requested `competition_id` takes precedence over
/// `include_competition_results`. Without either, `results` is left out and
/// a note reports how many competitions exist.
pub fn shape_person(person: Person, view: &PersonView) -> Map<String, Value> {
    let mut shaped = Map::new();
    shaped.insert("id".to_string(), json!(person.id));
    shaped.insert("name".to_string(), json!(person.name));
    shaped.insert("slug".to_string(), json!(person.slug));
    shaped.insert("country".to_string(), json!(person.country));
    shaped.insert(
        "numberOfCompetitions".to_string(),
        json!(person.number_of_competitions),
    );
    shaped.insert(
        "numberOfChampionships".to_string(),
        json!(person.number_of_championships),
    );

    if let Some(ids) = &person.competition_ids {
        shaped.insert("competitionIds".to_string(), json!(ids));
    }
    if let Some(ids) = person.championship_ids {
        shaped.insert("championshipIds".to_string(), json!(ids));
    }

    let optional_sections = [
        ("records", view.include_personal_records, person.records),
        ("rank", view.include_rankings, person.rank),
        ("medals", view.include_medals, person.medals),
    ];
    for (key, wanted, section) in optional_sections {
        if let (true, Some(section)) = (wanted, section) {
            shaped.insert(key.to_string(), section);
        }
    }

    let competition_ids = person.competition_ids.unwrap_or_default();
    let requested = view
        .competition_id
        .as_deref()
        .filter(|competition_id| !competition_id.is_empty());

    let (results, note) = if let Some(competition_id) = requested {
        let mut all_results = person.results.unwrap_or_default();
        if !competition_ids.iter().any(|id| id == competition_id) {
            (
                Some(Map::new()),
                Some(format!(
                    "Person did not participate in competition: {competition_id}"
                )),
            )
        } else if let Some(slice) = all_results.remove(competition_id) {
            (
                Some(Map::from_iter([(competition_id.to_string(), slice)])),
                Some(format!("Showing results from competition: {competition_id}")),
            )
        } else {
            (
                Some(Map::new()),
                Some(format!(
                    "Person participated in {competition_id} but no results data available"
                )),
            )
        }
    } else if view.include_competition_results {
        match person.results {
            Some(mut all_results) if view.max_recent_competitions > 0 => {
                let total = all_results.len();
                let recent_start = competition_ids
                    .len()
                    .saturating_sub(view.max_recent_competitions as usize);
                let recent: Map<String, Value> = competition_ids[recent_start..]
                    .iter()
                    .filter_map(|id| all_results.remove(id).map(|slice| (id.clone(), slice)))
                    .collect();
                let note = format!(
                    "Showing results from {} most recent competitions out of {total} total",
                    recent.len()
                );
                (Some(recent), Some(note))
            }
            Some(all_results) => (Some(all_results), None),
            None => (None, None),
        }
    } else {
        (
            None,
            Some(format!(
                "Competition results excluded (set include_competition_results=true to include). Total competitions: {}",
                person.number_of_competitions.unwrap_or(0)
            )),
        )
    };

    if let Some(results) = results {
        shaped.insert("results".to_string(), Value::Object(results));
    }
    if let Some(note) = note {
        shaped.insert(RESULTS_NOTE_KEY.to_string(), Value::String(note));
    }

    shaped
}

/// Keeps rows of `round` (or every row for `"all"`), truncates to `limit`
/// and projects each row to its summary fields.
pub fn summarize_event_results(
    results: Vec<EventResult>,
    round: &str,
    limit: Option<u32>,
    include_solves: bool,
) -> EventResultsPage {
    let limit = limit.filter(|limit| *limit > 0);

    let items: Vec<ResultSummary> = results
        .into_iter()
        .filter(|result| round == ALL_ROUNDS || result.round.as_deref() == Some(round))
        .take(limit.map_or(usize::MAX, |limit| limit as usize))
        .map(|result| ResultSummary {
            person_id: result.person_id,
            round: result.round,
            position: result.position,
            best: result.best,
            average: result.average,
            solves: include_solves.then(|| result.solves.unwrap_or_default()),
        })
        .collect();

    EventResultsPage {
        pagination: Pagination {
            page: 1,
            size: items.len(),
            total_pages: None,
        },
        total: items.len(),
        filter: ResultFilter {
            round: round.to_string(),
            limit,
            include_solves,
        },
        items,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn person() -> Person {
        serde_json::from_value(json!({
            "id": "2003SEAR02",
            "name": "Test Person",
            "slug": "test-person",
            "country": "US",
            "numberOfCompetitions": 7,
            "numberOfChampionships": 1,
            "competitionIds": ["C1", "C2", "C3", "C4", "C5", "C6", "C7"],
            "championshipIds": ["C4"],
            "rank": { "singles": [], "averages": [] },
            "medals": { "gold": 1, "silver": 0, "bronze": 2 },
            "records": { "single": { "WR": 0, "CR": 0, "NR": 1 } },
            "results": {
                "C1": { "333": [] },
                "C2": { "333": [] },
                "C5": { "222": [] },
                "C6": { "333": [] },
                "C7": { "333": [{ "round": "Final" }] }
            }
        }))
        .expect("person fixture")
    }

    fn rows() -> Vec<EventResult> {
        (0..30)
            .map(|index| EventResult {
                person_id: Some(format!("2020TEST{index:02}")),
                round: Some(if index < 12 { "Final" } else { "First round" }.to_string()),
                position: Some(index),
                best: Some(500 + index),
                average: Some(600 + index),
                solves: Some(vec![600, 610, 620, 630, 640]),
            })
            .collect()
    }

    #[test]
    fn default_view_omits_results_and_reports_count() {
        let shaped = shape_person(person(), &PersonView::default());

        assert!(shaped.get("results").is_none());
        let note = shaped[RESULTS_NOTE_KEY].as_str().expect("note");
        assert!(note.contains("Total competitions: 7"));
        assert_eq!(shaped["competitionIds"].as_array().map(Vec::len), Some(7));
        assert!(shaped.contains_key("medals"));
        assert!(shaped.contains_key("rank"));
        assert!(shaped.contains_key("records"));
    }

    #[test]
    fn sections_can_be_switched_off() {
        let view = PersonView {
            include_personal_records: false,
            include_rankings: false,
            include_medals: false,
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        assert!(!shaped.contains_key("records"));
        assert!(!shaped.contains_key("rank"));
        assert!(!shaped.contains_key("medals"));
        assert_eq!(shaped["name"], "Test Person");
    }

    #[test]
    fn unknown_competition_reports_non_participation() {
        let view = PersonView {
            competition_id: Some("WC2099".to_string()),
            include_competition_results: true,
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        assert_eq!(shaped["results"], json!({}));
        assert_eq!(
            shaped[RESULTS_NOTE_KEY],
            "Person did not participate in competition: WC2099"
        );
    }

    #[test]
    fn competition_without_results_reports_missing_data() {
        let view = PersonView {
            competition_id: Some("C3".to_string()),
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        assert_eq!(shaped["results"], json!({}));
        assert_eq!(
            shaped[RESULTS_NOTE_KEY],
            "Person participated in C3 but no results data available"
        );
    }

    #[test]
    fn competition_with_results_returns_only_that_slice() {
        let view = PersonView {
            competition_id: Some("C7".to_string()),
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        assert_eq!(shaped["results"], json!({ "C7": { "333": [{ "round": "Final" }] } }));
        assert_eq!(shaped[RESULTS_NOTE_KEY], "Showing results from competition: C7");
    }

    #[test]
    fn recent_results_take_tail_of_competition_list() {
        let view = PersonView {
            include_competition_results: true,
            max_recent_competitions: 3,
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        let results = shaped["results"].as_object().expect("results object");
        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["C5", "C6", "C7"]);
        assert_eq!(
            shaped[RESULTS_NOTE_KEY],
            "Showing results from 3 most recent competitions out of 5 total"
        );
    }

    #[test]
    fn zero_recent_limit_returns_every_result() {
        let view = PersonView {
            include_competition_results: true,
            max_recent_competitions: 0,
            ..PersonView::default()
        };
        let shaped = shape_person(person(), &view);

        assert_eq!(shaped["results"].as_object().map(Map::len), Some(5));
        assert!(!shaped.contains_key(RESULTS_NOTE_KEY));
    }

    #[test]
    fn final_round_is_the_default_filter() {
        let page = summarize_event_results(rows(), DEFAULT_ROUND, None, false);

        assert_eq!(page.total, 12);
        assert!(page
            .items
            .iter()
            .all(|item| item.round.as_deref() == Some("Final")));
        assert!(page.items.iter().all(|item| item.solves.is_none()));
        assert_eq!(page.pagination.size, 12);
    }

    #[test]
    fn all_rounds_keeps_every_row() {
        let page = summarize_event_results(rows(), ALL_ROUNDS, None, false);
        assert_eq!(page.total, 30);
    }

    #[test]
    fn limit_applies_after_round_filter() {
        let page = summarize_event_results(rows(), DEFAULT_ROUND, Some(10), true);

        assert_eq!(page.items.len(), 10);
        assert_eq!(page.filter.limit, Some(10));
        assert!(page.items.iter().all(|item| item.solves.is_some()));

        let value = serde_json::to_value(&page).expect("page serialization");
        assert_eq!(value["filter"]["include_solves"], true);
        assert_eq!(value["items"][0]["solves"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn missing_solves_become_empty_list_when_requested() {
        let page = summarize_event_results(
            vec![EventResult {
                round: Some("Final".to_string()),
                ..EventResult::default()
            }],
            DEFAULT_ROUND,
            Some(0),
            true,
        );

        assert_eq!(page.items[0].solves, Some(vec![]));
        assert_eq!(page.filter.limit, None);
    }

    #[test]
    fn wca_id_is_uppercased_and_checked() {
        assert_eq!(normalize_wca_id(" 2003sear02 ").expect("valid id"), "2003SEAR02");
        assert!(normalize_wca_id("2003SEAR2").is_err());
        assert!(normalize_wca_id("../persons").is_err());
    }

    #[test]
    fn path_segments_reject_traversal() {
        assert!(normalize_path_segment("invalid_event_id", "event_id", "../x").is_err());
        assert!(normalize_path_segment("invalid_event_id", "event_id", "..").is_err());
        assert!(normalize_path_segment("invalid_event_id", "event_id", "  ").is_err());
        assert_eq!(
            normalize_path_segment("invalid_region", "region", " _North America ")
                .expect("spaces are allowed"),
            "_North America"
        );
    }

    #[test]
    fn rank_type_defaults_to_single() {
        assert_eq!(normalize_rank_type(None).expect("default"), RankType::Single);
        assert_eq!(
            normalize_rank_type(Some("Average".to_string())).expect("average"),
            RankType::Average
        );
        assert!(normalize_rank_type(Some("mean".to_string())).is_err());
    }

    #[test]
    fn rejects_impossible_dates_and_zero_page() {
        assert!(parse_competition_date(2023, 2, 29).is_err());
        assert!(parse_competition_date(2024, 2, 29).is_ok());
        assert!(normalize_page(Some(0)).is_err());
        assert_eq!(normalize_page(None).expect("default page"), 1);
    }
}
