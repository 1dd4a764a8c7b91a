//! Order webhook.
//!
//! The body is read raw so the signature is checked against the exact bytes
//! the shop signed.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use dormclean_ingest::{IngestOutcome, SIGNATURE_HEADER};

/// Accept an order delivery.
///
/// Returns 201 when a booking was created and 200 for pings and redeliveries.
///
/// # Errors
///
/// 401 for a missing or wrong signature; 400 for a malformed payload.
pub async fn receive_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestOutcome>), AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    state.ingestor.authenticate(&body, signature).inspect_err(|err| {
        tracing::warn!(error = %err, "Rejected unsigned order delivery");
    })?;

    let outcome = state.ingestor.ingest(&body).await?;
    let status = match outcome {
        IngestOutcome::Created { .. } => StatusCode::CREATED,
        IngestOutcome::Ping { .. } | IngestOutcome::Duplicate { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}
