//! Payout records: monthly invoice requests, payments and the delivery ledger.
//!
//! A payout run moves a [`Payment`] through two phases. It is first written as
//! [`PaymentStatus::PendingNotification`], which claims its bookings, and is then
//! either committed once the invoice e-mail is known to have gone out, or
//! abandoned. [`DeliveryAttempt`] rows are the ledger that reconciliation reads
//! to decide between the two without ever sending twice.

use crate::error::{Error, Result};
use crate::types::{BillingPeriod, BookingId, InvoiceRequestId, Money, PaymentId, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Invoice requests
// ============================================================================

/// Whether a monthly invoice request has been settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceRequestStatus {
    /// Waiting for a payout
    Pending,
    /// Settled by a committed payment
    Paid,
}

impl InvoiceRequestStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for InvoiceRequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(Error::validation("status", format!("unknown invoice request status '{other}'"))),
        }
    }
}

/// A provider's request to be invoiced and paid for one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    /// Request id
    pub id: InvoiceRequestId,
    /// Requesting provider
    pub provider_id: ProfileId,
    /// Provider display name snapshot
    pub provider_name: String,
    /// Month covered
    pub period: BillingPeriod,
    /// When the request was filed
    pub requested_at: DateTime<Utc>,
    /// Settlement state
    pub status: InvoiceRequestStatus,
}

impl InvoiceRequest {
    /// New pending request.
    #[must_use]
    pub fn new(
        provider_id: ProfileId,
        provider_name: impl Into<String>,
        period: BillingPeriod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceRequestId::new(),
            provider_id,
            provider_name: provider_name.into(),
            period,
            requested_at: now,
            status: InvoiceRequestStatus::Pending,
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Phase of a payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent written, bookings claimed, notification not yet confirmed
    PendingNotification,
    /// Bookings flagged paid; final
    Committed,
    /// Notification failed; bookings released; final
    Abandoned,
}

impl PaymentStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingNotification => "pending_notification",
            Self::Committed => "committed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Committed | Self::Abandoned)
    }

    /// Validate a transition to `next`.
    ///
    /// Only `PendingNotification` may move, and only to a final state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] for any other transition.
    pub fn transition(self, next: Self) -> Result<Self> {
        match (self, next) {
            (Self::PendingNotification, Self::Committed | Self::Abandoned) => Ok(next),
            _ => Err(Error::conflict(format!("payment cannot move from {self} to {next}"))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending_notification" => Ok(Self::PendingNotification),
            "committed" => Ok(Self::Committed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(Error::validation("status", format!("unknown payment status '{other}'"))),
        }
    }
}

/// Input for recording a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    /// Paid provider
    pub provider_id: ProfileId,
    /// Provider display name snapshot
    pub provider_name: String,
    /// Bookings settled by this payment
    pub booking_ids: Vec<BookingId>,
    /// Amount paid out
    pub amount: Money,
    /// Settlement date
    pub payment_date: NaiveDate,
    /// Invoice request settled alongside, if any
    pub invoice_request_id: Option<InvoiceRequestId>,
}

impl NewPayment {
    /// Reject empty or repeated booking lists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the list is empty or holds duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.booking_ids.is_empty() {
            return Err(Error::validation("booking_ids", "at least one booking is required"));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.booking_ids.len());
        if let Some(dup) = self.booking_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(Error::validation("booking_ids", format!("booking {dup} is listed twice")));
        }
        Ok(())
    }
}

/// A payout to one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,
    /// Paid provider
    pub provider_id: ProfileId,
    /// Provider display name snapshot
    pub provider_name: String,
    /// Bookings settled
    pub booking_ids: Vec<BookingId>,
    /// Amount paid
    pub amount: Money,
    /// Settlement date
    pub payment_date: NaiveDate,
    /// Settled invoice request
    pub invoice_request_id: Option<InvoiceRequestId>,
    /// Phase
    pub status: PaymentStatus,
    /// Invoice number sent with the notification, when there was one
    pub invoice_id: Option<String>,
    /// When the payment record was created
    pub created_at: DateTime<Utc>,
    /// Last phase change
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Build a payment from validated input in the given initial phase.
    #[must_use]
    pub fn new(input: NewPayment, status: PaymentStatus, invoice_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            provider_id: input.provider_id,
            provider_name: input.provider_name,
            booking_ids: input.booking_ids,
            amount: input.amount,
            payment_date: input.payment_date,
            invoice_request_id: input.invoice_request_id,
            status,
            invoice_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, stamping the change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] for a disallowed transition.
    pub fn advance(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.transition(next)?;
        self.updated_at = now;
        Ok(())
    }
}

// ============================================================================
// Delivery ledger
// ============================================================================

/// Outcome of one notification attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The relay accepted the message
    Sent,
    /// The relay rejected it or could not be reached
    Failed,
}

impl DeliveryStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(Error::validation("status", format!("unknown delivery status '{other}'"))),
        }
    }
}

/// One row of the delivery ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Payment the notification belongs to
    pub payment_id: PaymentId,
    /// Recipient address
    pub recipient: String,
    /// Outcome
    pub status: DeliveryStatus,
    /// Relay diagnostic on failure
    pub diagnostic: Option<String>,
    /// When the attempt finished
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    /// Successful attempt.
    #[must_use]
    pub fn sent(payment_id: PaymentId, recipient: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            payment_id,
            recipient: recipient.into(),
            status: DeliveryStatus::Sent,
            diagnostic: None,
            attempted_at: now,
        }
    }

    /// Failed attempt with the relay's diagnostic.
    #[must_use]
    pub fn failed(
        payment_id: PaymentId,
        recipient: impl Into<String>,
        diagnostic: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            payment_id,
            recipient: recipient.into(),
            status: DeliveryStatus::Failed,
            diagnostic: Some(diagnostic.into()),
            attempted_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(ids: Vec<BookingId>) -> NewPayment {
        NewPayment {
            provider_id: ProfileId::new("p1"),
            provider_name: "QFS".to_string(),
            booking_ids: ids,
            amount: Money::from_dollars(120),
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            invoice_request_id: None,
        }
    }

    #[test]
    fn test_payment_phases() {
        let mut payment = Payment::new(input(vec![BookingId::new()]), PaymentStatus::PendingNotification, None, Utc::now());
        payment.advance(PaymentStatus::Committed, Utc::now()).unwrap();
        assert!(payment.status.is_final());

        let err = payment.advance(PaymentStatus::Abandoned, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(payment.status, PaymentStatus::Committed);
    }

    #[test]
    fn test_abandoned_is_final() {
        assert!(PaymentStatus::Abandoned.transition(PaymentStatus::Committed).is_err());
        assert!(PaymentStatus::PendingNotification.transition(PaymentStatus::PendingNotification).is_err());
    }

    #[test]
    fn test_new_payment_validation() {
        assert!(input(vec![]).validate().is_err());
        let id = BookingId::new();
        assert!(input(vec![id, id]).validate().is_err());
        assert!(input(vec![id, BookingId::new()]).validate().is_ok());
    }

    #[test]
    fn test_status_storage_names() {
        for status in [PaymentStatus::PendingNotification, PaymentStatus::Committed, PaymentStatus::Abandoned] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentStatus::PendingNotification).unwrap(),
            "\"pending_notification\""
        );
        assert_eq!(serde_json::to_string(&InvoiceRequestStatus::Paid).unwrap(), "\"paid\"");
    }
}
