//! Optional bearer-token gate for the MCP endpoint

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{errors::AppError, AppState};

/// Compares the presented token against the configured one. With no
/// configured token every request is accepted.
fn check_bearer(expected: Option<&str>, presented: Option<&str>) -> Result<(), AppError> {
    match (expected, presented) {
        (None, _) => Ok(()),
        (Some(_), None) => Err(AppError::unauthorized(
            "missing_token",
            "missing authorization header",
        )),
        (Some(expected), Some(presented)) if presented == expected => Ok(()),
        (Some(_), Some(_)) => Err(AppError::unauthorized(
            "invalid_token",
            "invalid bearer token",
        )),
    }
}

pub async fn require_bearer_token(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = auth_header
        .as_ref()
        .map(|TypedHeader(auth)| auth.token());
    check_bearer(state.api_token.as_deref(), presented)?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection_code(result: Result<(), AppError>) -> &'static str {
        match result {
            Err(AppError::Unauthorized { code, .. }) => code,
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn open_without_configured_token() {
        assert!(check_bearer(None, None).is_ok());
        assert!(check_bearer(None, Some("anything")).is_ok());
    }

    #[test]
    fn configured_token_must_be_presented() {
        assert_eq!(rejection_code(check_bearer(Some("secret"), None)), "missing_token");
    }

    #[test]
    fn wrong_token_is_rejected() {
        assert_eq!(
            rejection_code(check_bearer(Some("secret"), Some("guess"))),
            "invalid_token"
        );
        assert!(check_bearer(Some("secret"), Some("secret")).is_ok());
    }
}
