use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::wca_client::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("failed to {action}: {source}")]
    Upstream {
        action: String,
        #[source]
        source: ApiError,
    },
    #[error("unexpected error while trying to {action}: {message}")]
    Unexpected { action: String, message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn unexpected(action: impl Into<String>, message: impl ToString) -> Self {
        Self::Unexpected {
            action: action.into(),
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    /// Wraps a client failure with the operation that was being performed.
    ///
    /// Malformed upstream payloads are reported as unexpected errors; every
    /// other client error keeps its taxonomy under `Upstream`.
    pub fn from_api(action: impl Into<String>, source: ApiError) -> Self {
        match source {
            ApiError::Unexpected(message) => Self::Unexpected {
                action: action.into(),
                message,
            },
            source => Self::Upstream {
                action: action.into(),
                source,
            },
        }
    }

    /// True for failures that belong in a tool result rather than a
    /// JSON-RPC error.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Unexpected { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::Upstream { .. } | Self::Unexpected { .. } => {
                let message = self.to_string();
                tracing::warn!(error = %message, "request failed upstream");
                (StatusCode::BAD_GATEWAY, "upstream_error", message)
            }
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}
