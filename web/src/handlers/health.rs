//! Health check endpoint.
//!
//! Used by load balancers to verify the process is serving. It does not
//! touch the database.

use axum::http::StatusCode;

/// Liveness.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
