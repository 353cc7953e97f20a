//! HTTP client for the static, file-served WCA REST API
//!
//! Every resource is a fixed JSON file below the configured base URL. Requests
//! are plain GETs; server errors and transport failures are retried with
//! exponential backoff, everything else fails fast.

use std::{sync::Arc, time::Duration};

use chrono::{Datelike, NaiveDate};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::Config,
    domain::models::{ChampionshipPage, Pagination, RankType},
};

pub const DEFAULT_RETRIES: u32 = 3;
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;
pub const CHAMPIONSHIPS_PER_PAGE: usize = 25;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found: {endpoint} (status {status})")]
    NotFound { endpoint: String, status: u16 },
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ApiError>,
    },
    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status_code(),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::Unexpected(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Pause before retrying after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// How a reference-data file wraps its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    /// `{"items": [...]}`
    Container,
    /// A top-level array.
    Bare,
    /// `{"<legacy_key>": [...]}`
    Legacy,
    Missing,
}

pub fn collection_shape(body: &Value, legacy_key: &str) -> CollectionShape {
    if body.get("items").is_some_and(Value::is_array) {
        CollectionShape::Container
    } else if body.is_array() {
        CollectionShape::Bare
    } else if body.get(legacy_key).is_some_and(Value::is_array) {
        CollectionShape::Legacy
    } else {
        CollectionShape::Missing
    }
}

pub fn unwrap_collection(body: Value, legacy_key: &str) -> Vec<Value> {
    let shape = collection_shape(&body, legacy_key);
    let list = match (shape, body) {
        (CollectionShape::Container, Value::Object(mut map)) => map.remove("items"),
        (CollectionShape::Bare, list) => Some(list),
        (CollectionShape::Legacy, Value::Object(mut map)) => map.remove(legacy_key),
        _ => None,
    };

    match list {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

pub fn competitions_by_event_endpoint(event_id: &str, page: u32) -> String {
    if page <= 1 {
        format!("competitions/{event_id}.json")
    } else {
        format!("competitions/{event_id}-page-{page}.json")
    }
}

/// Filters championships by region and cuts out one page.
///
/// `"world"` matches only items whose region is exactly `world`; any other
/// filter compares regions case-insensitively.
pub fn paginate_championships(
    items: Vec<Value>,
    region: Option<&str>,
    page: u32,
    per_page: usize,
) -> ChampionshipPage {
    let filtered: Vec<Value> = match region.map(str::to_lowercase) {
        None => items,
        Some(filter) if filter == "world" => items
            .into_iter()
            .filter(|item| item.get("region").and_then(Value::as_str) == Some("world"))
            .collect(),
        Some(filter) => items
            .into_iter()
            .filter(|item| {
                item.get("region")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase()
                    == filter
            })
            .collect(),
    };

    let total = filtered.len();
    let per_page = per_page.max(1);
    let start = (page.max(1) as usize - 1).saturating_mul(per_page);
    let items = filtered.into_iter().skip(start).take(per_page).collect();

    ChampionshipPage {
        items,
        total,
        page,
        per_page,
        pagination: Pagination {
            page,
            size: per_page,
            total_pages: Some(total.div_ceil(per_page)),
        },
    }
}

/// Connection settings shared by every session.
#[derive(Debug, Clone)]
pub struct WcaClient {
    base_url: Arc<str>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl WcaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: Arc::from(base_url.into()),
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.api_timeout_secs),
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Opens a connection pool for one unit of work. The pool is torn down
    /// when the returned session is dropped.
    pub fn session(&self) -> Result<WcaSession, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|err| ApiError::Unexpected(format!("failed to build HTTP client: {err}")))?;

        Ok(WcaSession {
            http,
            base_url: Arc::clone(&self.base_url),
            retry: self.retry,
        })
    }
}

pub struct WcaSession {
    http: Client,
    base_url: Arc<str>,
    retry: RetryPolicy,
}

impl Drop for WcaSession {
    fn drop(&mut self) {
        debug!(base_url = %self.base_url, "closing WCA API session");
    }
}

impl WcaSession {
    pub async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, Option<String>)],
    ) -> Result<Value, ApiError> {
        let url = join_url(&self.base_url, endpoint);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|value| (*key, value)))
            .collect();

        let mut attempt = 0u32;
        loop {
            debug!(url = %url, attempt = attempt + 1, "requesting WCA API");

            let failure = match self.http.get(&url).query(&query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        warn!(url = %url, "WCA API resource not found");
                        return Err(ApiError::NotFound {
                            endpoint: endpoint.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    if !status.is_success() {
                        let error = ApiError::Status {
                            status: status.as_u16(),
                            message: status
                                .canonical_reason()
                                .unwrap_or("unknown status")
                                .to_string(),
                        };
                        if !status.is_server_error() {
                            warn!(url = %url, status = status.as_u16(), "WCA API rejected request");
                            return Err(error);
                        }
                        error
                    } else {
                        match response.bytes().await {
                            Ok(body) => {
                                debug!(url = %url, bytes = body.len(), "WCA API request succeeded");
                                return serde_json::from_slice(&body).map_err(|err| {
                                    ApiError::Unexpected(format!(
                                        "invalid JSON from {endpoint}: {err}"
                                    ))
                                });
                            }
                            Err(err) => ApiError::Transport(err),
                        }
                    }
                }
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    ApiError::Transport(err)
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "WCA API request failed");
                    return Err(ApiError::Unexpected(err.to_string()));
                }
            };

            if attempt >= self.retry.retries {
                warn!(url = %url, error = %failure, "WCA API retries exhausted");
                return Err(ApiError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(failure),
                });
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                url = %url,
                error = %failure,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying WCA API request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, &[]).await
    }

    pub async fn get_competition(&self, competition_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("competitions/{competition_id}.json")).await
    }

    pub async fn get_competitions_by_date(&self, date: NaiveDate) -> Result<Value, ApiError> {
        self.get(&format!(
            "competitions/{}/{:02}/{:02}.json",
            date.year(),
            date.month(),
            date.day()
        ))
        .await
    }

    pub async fn get_competitions_by_event(
        &self,
        event_id: &str,
        page: u32,
    ) -> Result<Value, ApiError> {
        self.get(&competitions_by_event_endpoint(event_id, page))
            .await
    }

    pub async fn get_person(&self, wca_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("persons/{wca_id}.json")).await
    }

    pub async fn get_rankings(
        &self,
        event_id: &str,
        region: &str,
        rank_type: RankType,
    ) -> Result<Value, ApiError> {
        self.get(&format!("rank/{region}/{rank_type}/{event_id}.json"))
            .await
    }

    pub async fn get_competition_results(&self, competition_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("results/{competition_id}.json")).await
    }

    pub async fn get_competition_event_results(
        &self,
        competition_id: &str,
        event_id: &str,
    ) -> Result<Value, ApiError> {
        self.get(&format!("results/{competition_id}/{event_id}.json"))
            .await
    }

    pub async fn get_championships(
        &self,
        page: u32,
        per_page: usize,
        region: Option<&str>,
    ) -> Result<ChampionshipPage, ApiError> {
        let body = self.get("championships.json").await?;
        Ok(paginate_championships(
            unwrap_collection(body, "championships"),
            region,
            page,
            per_page,
        ))
    }

    pub async fn get_championship(&self, championship_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("championships/{championship_id}.json"))
            .await
    }

    pub async fn get_events(&self) -> Result<Vec<Value>, ApiError> {
        Ok(unwrap_collection(self.get("events.json").await?, "events"))
    }

    pub async fn get_countries(&self) -> Result<Vec<Value>, ApiError> {
        Ok(unwrap_collection(
            self.get("countries.json").await?,
            "countries",
        ))
    }

    pub async fn get_continents(&self) -> Result<Vec<Value>, ApiError> {
        Ok(unwrap_collection(
            self.get("continents.json").await?,
            "continents",
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn fast_client(server: &MockServer) -> WcaClient {
        WcaClient::new(server.uri(), Duration::from_secs(5)).with_retry_policy(RetryPolicy {
            retries: 3,
            base_delay: Duration::from_millis(1),
        })
    }

    async fn request_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .expect("request recording enabled")
            .len()
    }

    fn championships(regions: &[&str]) -> Vec<Value> {
        regions
            .iter()
            .enumerate()
            .map(|(index, region)| json!({ "id": format!("C{index}"), "region": region }))
            .collect()
    }

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = (0..policy.retries).map(|a| policy.delay_for(a)).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(delays.iter().sum::<Duration>(), Duration::from_secs(7));
    }

    #[test]
    fn join_url_uses_single_separator() {
        assert_eq!(join_url("http://h/api/", "events.json"), "http://h/api/events.json");
        assert_eq!(join_url("http://h/api", "/events.json"), "http://h/api/events.json");
        assert_eq!(join_url("http://h/api", "events.json"), "http://h/api/events.json");
    }

    #[test]
    fn event_listing_pages_use_suffix() {
        assert_eq!(competitions_by_event_endpoint("333bf", 1), "competitions/333bf.json");
        assert_eq!(
            competitions_by_event_endpoint("333bf", 3),
            "competitions/333bf-page-3.json"
        );
    }

    #[test]
    fn unwrap_collection_recognizes_every_shape() {
        let container = json!({ "pagination": { "page": 1, "size": 2 }, "items": [1, 2] });
        let bare = json!([1, 2, 3]);
        let legacy = json!({ "events": [1] });
        let other = json!({ "unexpected": true });

        assert_eq!(collection_shape(&container, "events"), CollectionShape::Container);
        assert_eq!(collection_shape(&bare, "events"), CollectionShape::Bare);
        assert_eq!(collection_shape(&legacy, "events"), CollectionShape::Legacy);
        assert_eq!(collection_shape(&other, "events"), CollectionShape::Missing);

        assert_eq!(unwrap_collection(container, "events").len(), 2);
        assert_eq!(unwrap_collection(bare, "events").len(), 3);
        assert_eq!(unwrap_collection(legacy, "events").len(), 1);
        assert!(unwrap_collection(other, "events").is_empty());
    }

    #[test]
    fn championship_world_filter_is_exact() {
        let page = paginate_championships(
            championships(&["world", "World", "us", "_Europe"]),
            Some("World"),
            1,
            25,
        );

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["region"], "world");
    }

    #[test]
    fn championship_region_filter_ignores_case() {
        let page = paginate_championships(
            championships(&["US", "us", "world", "CN"]),
            Some("US"),
            1,
            25,
        );

        assert_eq!(page.total, 2);
        assert!(page
            .items
            .iter()
            .all(|item| item["region"].as_str().map(str::to_lowercase).as_deref() == Some("us")));
    }

    #[test]
    fn championship_pages_are_sliced_locally() {
        let items = championships(&["us"; 30]);

        let first = paginate_championships(items.clone(), None, 1, 25);
        assert_eq!(first.items.len(), 25);
        assert_eq!(first.total, 30);
        assert_eq!(first.pagination.total_pages, Some(2));

        let second = paginate_championships(items.clone(), None, 2, 25);
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[0]["id"], "C25");

        let beyond = paginate_championships(items, None, 3, 25);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 30);
    }

    #[test]
    fn empty_championship_list_has_no_pages() {
        let page = paginate_championships(Vec::new(), Some("world"), 1, 25);
        assert_eq!(page.total, 0);
        assert_eq!(page.pagination.total_pages, Some(0));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/persons/2099NOPE01.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        let error = session
            .get_person("2099NOPE01")
            .await
            .expect_err("404 must fail");

        assert!(matches!(error, ApiError::NotFound { .. }));
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events.json"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/events.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "333", "name": "3x3x3 Cube", "format": "time" }]
            })))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        let events = session.get_events().await.expect("fourth attempt succeeds");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["id"], "333");
        assert_eq!(request_count(&server).await, 4);
    }

    #[tokio::test]
    async fn exhausted_retries_wrap_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/competitions/WC2023.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        let error = session
            .get_competition("WC2023")
            .await
            .expect_err("persistent 500 must fail");

        match &error {
            ApiError::RetriesExhausted { attempts, last } => {
                assert_eq!(*attempts, 4);
                assert!(matches!(**last, ApiError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(error.status_code(), Some(500));
        assert_eq!(request_count(&server).await, 4);
    }

    #[tokio::test]
    async fn client_errors_fail_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        let error = session
            .get_competition_results("WC2023")
            .await
            .expect_err("429 must fail");

        assert_eq!(error.status_code(), Some(429));
        assert!(matches!(error, ApiError::Status { .. }));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn connection_failures_are_retried() {
        let client = WcaClient::new("http://127.0.0.1:9", Duration::from_secs(1))
            .with_retry_policy(RetryPolicy {
                retries: 2,
                base_delay: Duration::from_millis(1),
            });

        let error = client
            .session()
            .expect("session")
            .get_events()
            .await
            .expect_err("nothing listens on the discard port");

        match error {
            ApiError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ApiError::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_unexpected_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/countries.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        let error = session.get_countries().await.expect_err("html is not json");

        assert!(matches!(error, ApiError::Unexpected(_)));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn request_drops_empty_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events.json"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let session = fast_client(&server).session().expect("session");
        session
            .request(
                "events.json",
                &[("lang", Some("en".to_string())), ("region", None)],
            )
            .await
            .expect("request should match");

        let requests = server.received_requests().await.expect("recorded");
        assert_eq!(requests[0].url.query(), Some("lang=en"));
    }

    #[tokio::test]
    async fn endpoint_helpers_build_static_paths() {
        let server = MockServer::start().await;
        for endpoint in [
            "/competitions/2024/03/05.json",
            "/rank/US/average/333.json",
            "/results/WC2023/333bf.json",
            "/championships/WC2023.json",
        ] {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": endpoint })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let session = fast_client(&server).session().expect("session");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        session.get_competitions_by_date(date).await.expect("by date");
        session
            .get_rankings("333", "US", RankType::Average)
            .await
            .expect("rankings");
        session
            .get_competition_event_results("WC2023", "333bf")
            .await
            .expect("event results");
        session.get_championship("WC2023").await.expect("championship");
    }
}
