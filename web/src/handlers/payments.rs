//! Payment history, direct recording and reconciliation.

use crate::error::AppError;
use crate::extractors::{RequireAdmin, RequireProvider};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use dormclean_billing::ReconcileReport;
use dormclean_core::{BookingId, InvoiceRequestId, Money, NaiveDate, NewPayment, Payment, ProfileId};
use serde::Deserialize;

/// A dollar amount given either as a JSON number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    /// `"120.00"`
    Text(String),
    /// `120` or `120.5`
    Number(serde_json::Number),
}

impl Amount {
    fn to_money(&self) -> Result<Money, AppError> {
        let text = match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        };
        Ok(Money::parse_decimal(&text)?)
    }
}

/// Body of `POST /api/admin/payments`.
#[derive(Debug, Deserialize)]
pub struct RecordPayment {
    /// Paid provider
    pub provider_id: String,
    /// Bookings settled
    pub booking_ids: Vec<BookingId>,
    /// Amount paid out, in dollars
    pub amount: Amount,
    /// Settlement date; today when absent
    pub payment_date: Option<NaiveDate>,
    /// Invoice request settled alongside
    pub invoice_request_id: Option<InvoiceRequestId>,
}

/// Query of `GET /api/admin/payments`.
#[derive(Debug, Deserialize)]
pub struct PaymentFilter {
    /// Restrict to one provider
    pub provider_id: Option<String>,
}

/// Record a payout settled outside the e-mail flow.
///
/// # Errors
///
/// 400 for an empty booking list, a bad amount or an uncompleted booking;
/// 409 when a booking was already paid out.
pub async fn record_payment(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<RecordPayment>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let amount = body.amount.to_money()?;
    let payment = state
        .recorder
        .record(NewPayment {
            provider_id: ProfileId::new(body.provider_id),
            provider_name: String::new(),
            booking_ids: body.booking_ids,
            amount,
            payment_date: body.payment_date.unwrap_or_else(|| state.clock.now().date_naive()),
            invoice_request_id: body.invoice_request_id,
        })
        .await?;

    tracing::info!(admin_id = %admin.id, payment_id = %payment.id, "Recorded payment");
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Every payment, newest first, optionally for one provider.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn list_payments(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let provider = filter
        .provider_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ProfileId::new);
    Ok(Json(state.payments.list_payments(provider.as_ref()).await?))
}

/// The calling provider's payments.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn own_payments(
    State(state): State<AppState>,
    RequireProvider(provider): RequireProvider,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.payments.list_payments(Some(&provider.id)).await?))
}

/// Resolve payout runs interrupted between dispatch and commit.
///
/// # Errors
///
/// 500 when pending intents cannot be listed.
pub async fn reconcile(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ReconcileReport>, AppError> {
    let report = state.payouts.reconcile().await?;
    tracing::info!(admin_id = %admin.id, committed = report.committed.len(), "Ran reconciliation on demand");
    Ok(Json(report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        let text: Amount = serde_json::from_str(r#""120.50""#).unwrap();
        let number: Amount = serde_json::from_str("120.5").unwrap();
        let whole: Amount = serde_json::from_str("120").unwrap();

        assert_eq!(text.to_money().unwrap().cents(), 12_050);
        assert_eq!(number.to_money().unwrap().cents(), 12_050);
        assert_eq!(whole.to_money().unwrap().cents(), 12_000);
    }

    #[test]
    fn test_amount_rejects_negative() {
        let amount: Amount = serde_json::from_str("-3").unwrap();
        assert!(amount.to_money().is_err());
    }
}
