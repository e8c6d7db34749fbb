use axum::http::StatusCode;

/// Health check endpoint
///
/// Returns 200 OK while the process is up, whether or not the station server
/// is reachable.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
