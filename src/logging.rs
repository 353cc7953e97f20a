//! Tracing setup and per-request access logging

use std::time::Instant;

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Connection-level chatter from the HTTP stack stays quiet unless asked for
/// through `RUST_LOG`.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

fn default_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = started_at.elapsed().as_millis() as u64;

    if status.is_server_error() {
        error!(method = %method, path = %path, status = status.as_u16(), duration_ms, "request failed");
    } else if status == StatusCode::UNAUTHORIZED {
        warn!(method = %method, path = %path, duration_ms, "authentication failure");
    } else {
        info!(method = %method, path = %path, status = status.as_u16(), duration_ms, "request summary");
    }

    response
}
