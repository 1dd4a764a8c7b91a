//! Monthly invoice requests.

use crate::error::AppError;
use crate::extractors::{CurrentProfile, RequireProvider};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use dormclean_core::{InvoiceRequest, Role};
use serde::Deserialize;

/// Body of `POST /api/invoice-requests`.
#[derive(Debug, Deserialize)]
pub struct NewInvoiceRequest {
    /// 1 to 12
    pub month: u32,
    /// Calendar year
    pub year: i32,
}

/// Ask for the invoice of one month.
///
/// # Errors
///
/// 400 for an invalid period; 409 while a request for it is still pending.
pub async fn create_invoice_request(
    State(state): State<AppState>,
    RequireProvider(provider): RequireProvider,
    Json(input): Json<NewInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceRequest>), AppError> {
    let request = state.invoice_requests.request(&provider, input.month, input.year).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// A provider's own requests, or every request for an admin.
///
/// # Errors
///
/// 403 for customers.
pub async fn list_invoice_requests(
    State(state): State<AppState>,
    CurrentProfile(caller): CurrentProfile,
) -> Result<Json<Vec<InvoiceRequest>>, AppError> {
    let requests = match caller.role {
        Role::Admin => state.invoice_requests.list(None).await?,
        Role::Provider => state.invoice_requests.list(Some(&caller.id)).await?,
        Role::User => return Err(AppError::forbidden("Invoice requests are available to providers")),
    };
    Ok(Json(requests))
}
