use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Coarse classification of a failed collaborator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    Parse,
    Timeout,
}

/// Failure returned by the endpoint client. Never panics across the boundary;
/// every request yields either a value or one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl FetchError {
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network(_) => FetchErrorKind::Network,
            Self::HttpStatus { .. } => FetchErrorKind::HttpStatus,
            Self::Parse(_) => FetchErrorKind::Parse,
            Self::Timeout(_) => FetchErrorKind::Timeout,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// A history response that cannot be aligned at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlignmentError {
    #[error("Incomplete history response: missing `{0}` array")]
    MissingField(&'static str),
}

/// Errors surfaced by the local dashboard routes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Station API error: {0}")]
    Upstream(#[from] FetchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Upstream(FetchError::HttpStatus { status, message }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                message.clone(),
            ),
            Self::Upstream(e) => {
                tracing::warn!(error = %e, "Station API unreachable");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not reach the station server".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
