//! Provider billing: aggregates, invoice previews and payout runs.

use crate::error::AppError;
use crate::extractors::{RequireAdmin, RequireProvider};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use dormclean_billing::{PayoutReceipt, PayoutRequest, PlatformTotals, ProviderBilling};
use dormclean_core::{InvoiceRequestId, NaiveDate, ProfileId};
use serde::{Deserialize, Serialize};

/// Response of `GET /api/admin/billing`.
#[derive(Debug, Serialize)]
pub struct BillingOverview {
    /// One entry per provider
    pub providers: Vec<ProviderBilling>,
    /// Sums across providers
    pub totals: PlatformTotals,
}

/// Query of the invoice preview.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewFormat {
    /// `pdf` (default) or `base64`
    pub format: Option<String>,
}

/// Base64 rendition of an invoice preview.
#[derive(Debug, Serialize)]
pub struct EncodedInvoice {
    /// Invoice number
    pub invoice_id: String,
    /// Suggested attachment name
    pub filename: String,
    /// Standard base64 of the PDF bytes
    pub pdf_base64: String,
}

/// Body of `POST /api/admin/billing/:provider_id/payouts`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PayoutBody {
    /// Monthly invoice request settled by the run
    pub invoice_request_id: Option<InvoiceRequestId>,
    /// Payment date; today when absent
    pub payment_date: Option<NaiveDate>,
}

/// Every provider's billing state with platform totals.
///
/// # Errors
///
/// 500 when a store fails.
pub async fn overview(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<BillingOverview>, AppError> {
    let (providers, totals) = state.payouts.overview().await?;
    Ok(Json(BillingOverview { providers, totals }))
}

/// The invoice a payout run would send now, as a PDF download or base64 JSON.
///
/// # Errors
///
/// 404 when the profile is not a provider; 400 for an unknown format.
pub async fn invoice_preview(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(provider_id): Path<String>,
    Query(query): Query<PreviewFormat>,
) -> Result<Response, AppError> {
    let document = state.payouts.preview(&ProfileId::new(provider_id)).await?;

    match query.format.as_deref().unwrap_or("pdf") {
        "pdf" => {
            let disposition = format!("inline; filename=\"{}\"", document.filename());
            Ok((
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document.into_bytes(),
            )
                .into_response())
        }
        "base64" => Ok(Json(EncodedInvoice {
            invoice_id: document.invoice_id().to_string(),
            filename: document.filename(),
            pdf_base64: document.to_base64(),
        })
        .into_response()),
        other => Err(AppError::bad_request(format!("unknown invoice format '{other}'"))),
    }
}

/// Pay a provider for all completed, unpaid bookings and e-mail the invoice.
///
/// # Errors
///
/// 400 when nothing is due; 409 when a booking is claimed by another run;
/// 502 when the e-mail could not be delivered, in which case nothing is
/// marked paid.
pub async fn run_payout(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(provider_id): Path<String>,
    body: Option<Json<PayoutBody>>,
) -> Result<Json<PayoutReceipt>, AppError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let provider_id = ProfileId::new(provider_id);
    tracing::info!(admin_id = %admin.id, provider_id = %provider_id, "Starting payout run");

    let receipt = state
        .payouts
        .execute(
            &provider_id,
            PayoutRequest {
                invoice_request_id: body.invoice_request_id,
                payment_date: body.payment_date,
            },
        )
        .await?;
    Ok(Json(receipt))
}

/// The calling provider's own billing state.
///
/// # Errors
///
/// 500 when a store fails.
pub async fn own_billing(
    State(state): State<AppState>,
    RequireProvider(provider): RequireProvider,
) -> Result<Json<ProviderBilling>, AppError> {
    Ok(Json(state.payouts.billing_for(&provider.id).await?))
}
