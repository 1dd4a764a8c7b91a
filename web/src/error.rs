//! Error types for web handlers.
//!
//! [`AppError`] is what every handler returns on failure. Domain errors map
//! onto HTTP status codes through `From<dormclean_core::Error>`; server-side
//! failures keep their detail in a logged source and send the client a
//! generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dormclean_core::Error;
use dormclean_ingest::IngestError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```
/// use axum::http::StatusCode;
/// use dormclean_core::Error;
/// use dormclean_web::AppError;
///
/// let err = AppError::from(Error::conflict("an invoice request for 2025-01 is already pending"));
/// assert_eq!(err.status(), StatusCode::CONFLICT);
/// assert_eq!(err.code(), "CONFLICT");
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error, logged for 5xx responses.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message, "FORBIDDEN")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{resource} with id {id} not found"), "NOT_FOUND")
    }

    /// 409 Conflict.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// 502 Bad Gateway, for a mail relay that refused or never received a message.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message, "DELIVERY_FAILED")
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let field = self
            .source
            .as_ref()
            .and_then(|e| e.downcast_ref::<Error>())
            .and_then(|e| match e {
                Error::Validation { field, .. } => Some(field.clone()),
                _ => None,
            });

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            field,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match &err {
            Error::Validation { .. } => Self::new(StatusCode::BAD_REQUEST, err.to_string(), "VALIDATION_ERROR")
                .with_source(err.into()),
            Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string(), "NOT_FOUND"),
            Error::Conflict(message) => Self::conflict(message.clone()),
            Error::Forbidden(message) => Self::forbidden(message.clone()),
            Error::Upstream { .. } => Self::internal("An internal error occurred").with_source(err.into()),
            Error::Delivery(_) => {
                Self::bad_gateway("The notification could not be delivered").with_source(err.into())
            },
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        if err.is_auth_failure() {
            Self::unauthorized(err.to_string())
        } else {
            Error::from(err).into()
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dormclean_core::DeliveryError;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (Error::validation("month", "month must be between 1 and 12"), StatusCode::BAD_REQUEST),
            (Error::not_found("Booking", "b-1"), StatusCode::NOT_FOUND),
            (Error::conflict("booking b-1 was already paid out"), StatusCode::CONFLICT),
            (Error::Forbidden("admins only".to_string()), StatusCode::FORBIDDEN),
            (Error::database("connection reset"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Delivery(DeliveryError::new("relay returned 503")), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_upstream_detail_stays_server_side() {
        let err = AppError::from(Error::database("password authentication failed for user app"));
        assert_eq!(err.message(), "An internal error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_delivery_diagnostic_stays_server_side() {
        let err = AppError::from(Error::Delivery(DeliveryError::new("Mail relay returned 401: bad key")));
        assert_eq!(err.code(), "DELIVERY_FAILED");
        assert!(!err.message().contains("bad key"));
    }

    #[test]
    fn test_signature_failures_are_unauthorized() {
        assert_eq!(AppError::from(IngestError::SignatureMismatch).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(IngestError::MissingOrderId).status(), StatusCode::BAD_REQUEST);
    }
}
