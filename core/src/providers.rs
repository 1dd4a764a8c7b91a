//! Collaborator traits injected into every dormclean component.
//!
//! Stores and the mail transport are **interfaces**, not implementations.
//! Services hold them as `Arc<dyn Trait>` and the server binary decides which
//! concrete backend to construct:
//!
//! - **Production**: `dormclean-postgres` stores, SMTP or HTTP relay mailer
//! - **Development**: console mailer
//! - **Testing**: `dormclean-testing` in-memory store and recording mailer
//!
//! Operations that must be all-or-nothing (payment recording, payout intent
//! commit) are single trait methods so each backend can run them inside one
//! transaction.

use crate::booking::Booking;
use crate::building::Building;
use crate::complaint::{Complaint, ComplaintResponse};
use crate::error::{DeliveryError, Result};
use crate::payout::{DeliveryAttempt, DeliveryStatus, InvoiceRequest, Payment};
use crate::profile::{Profile, Role};
use crate::types::{BookingId, BuildingId, ComplaintId, InvoiceRequestId, PaymentId, ProfileId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile by identity id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>>;

    /// Insert or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn save_profile(&self, profile: &Profile) -> Result<()>;

    /// List profiles, optionally restricted to one role, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>>;
}

/// Building persistence.
#[async_trait]
pub trait BuildingStore: Send + Sync {
    /// Load a building.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_building(&self, id: &BuildingId) -> Result<Option<Building>>;

    /// All buildings ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_buildings(&self) -> Result<Vec<Building>>;

    /// Insert a new building.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn insert_building(&self, building: &Building) -> Result<()>;

    /// Replace an existing building.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when it does not exist.
    async fn update_building(&self, building: &Building) -> Result<()>;

    /// Delete a building.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when it does not exist.
    async fn delete_building(&self, id: &BuildingId) -> Result<()>;
}

/// Booking persistence. Bookings are never deleted.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>>;

    /// Find the booking ingested from an upstream order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn find_by_external_order(&self, order_id: &str) -> Result<Option<Booking>>;

    /// Insert a new booking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) when the external
    /// order id was already ingested.
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    /// Replace the mutable fields of a booking (status, provider, images).
    ///
    /// The paid flag is owned by [`PaymentStore`] and is not written here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when it does not exist.
    async fn update_booking(&self, booking: &Booking) -> Result<()>;

    /// All bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_bookings(&self) -> Result<Vec<Booking>>;

    /// Bookings placed by one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_bookings_for_customer(&self, customer: &ProfileId) -> Result<Vec<Booking>>;

    /// Bookings assigned to one provider, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_bookings_for_provider(&self, provider: &ProfileId) -> Result<Vec<Booking>>;
}

/// Complaint persistence.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Load a complaint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_complaint(&self, id: &ComplaintId) -> Result<Option<Complaint>>;

    /// Insert a new complaint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn insert_complaint(&self, complaint: &Complaint) -> Result<()>;

    /// Persist the complaint's new status together with an appended response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when the complaint does not exist.
    async fn add_response(&self, complaint: &Complaint, response: &ComplaintResponse) -> Result<()>;

    /// Responses on a complaint, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_responses(&self, id: &ComplaintId) -> Result<Vec<ComplaintResponse>>;

    /// Complaints, newest first, optionally restricted to a customer or a provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_complaints(&self, scope: ComplaintScope) -> Result<Vec<Complaint>>;
}

/// Which complaints a listing covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComplaintScope {
    /// Every complaint
    All,
    /// Filed by this customer
    Customer(ProfileId),
    /// Concerning this provider
    Provider(ProfileId),
}

/// Monthly invoice request persistence.
#[async_trait]
pub trait InvoiceRequestStore: Send + Sync {
    /// Insert a pending request.
    ///
    /// The existence check and the insert happen atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) when a pending request
    /// already exists for the same provider and period.
    async fn create_invoice_request(&self, request: &InvoiceRequest) -> Result<()>;

    /// Load a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_invoice_request(&self, id: &InvoiceRequestId) -> Result<Option<InvoiceRequest>>;

    /// Requests, newest first, optionally for one provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_invoice_requests(&self, provider: Option<&ProfileId>) -> Result<Vec<InvoiceRequest>>;
}

/// Payment persistence and the booking paid flags it owns.
///
/// Every method is atomic. A booking counts as *claimed* while it is paid or
/// listed by a payment in `PendingNotification`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Record a `Committed` payment, flag its bookings paid and mark its invoice
    /// request paid, all in one transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`](crate::Error::Conflict) when any booking is already claimed
    /// - [`Error::NotFound`](crate::Error::NotFound) for an unknown booking or invoice request
    async fn record_payment(&self, payment: &Payment) -> Result<()>;

    /// Insert a `PendingNotification` payment, claiming its bookings.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`](crate::Error::Conflict) when any booking is already claimed
    /// - [`Error::NotFound`](crate::Error::NotFound) for an unknown booking
    async fn open_intent(&self, payment: &Payment) -> Result<()>;

    /// Move a pending payment to `Committed`, flag its bookings paid and mark its
    /// invoice request paid.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`](crate::Error::NotFound) for an unknown payment
    /// - [`Error::Conflict`](crate::Error::Conflict) when it is no longer pending
    async fn commit_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment>;

    /// Move a pending payment to `Abandoned`, releasing its bookings.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`](crate::Error::NotFound) for an unknown payment
    /// - [`Error::Conflict`](crate::Error::Conflict) when it is no longer pending
    async fn abandon_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment>;

    /// Load a payment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>>;

    /// Payments still in `PendingNotification`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_pending_intents(&self) -> Result<Vec<Payment>>;

    /// Payment history, newest first, optionally for one provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn list_payments(&self, provider: Option<&ProfileId>) -> Result<Vec<Payment>>;
}

/// Append-only record of notification attempts per payment.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Append an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<()>;

    /// Attempts for a payment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn attempts_for(&self, payment: &PaymentId) -> Result<Vec<DeliveryAttempt>>;

    /// Whether any attempt for `payment` reached the relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`](crate::Error::Upstream) when storage fails.
    async fn was_delivered(&self, payment: &PaymentId) -> Result<bool> {
        Ok(self
            .attempts_for(payment)
            .await?
            .iter()
            .any(|a| a.status == DeliveryStatus::Sent))
    }
}

/// File attached to an outbound e-mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the recipient
    pub filename: String,
    /// Standard base64 of the file bytes
    pub content_base64: String,
    /// MIME type, e.g. `application/pdf`
    pub mime_type: String,
}

/// A transactional e-mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Optional attachment
    pub attachment: Option<Attachment>,
}

/// Mail transport.
///
/// This trait abstracts over delivery services (SMTP, HTTP relays, console).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] carrying the relay's diagnostic when the relay
    /// rejects the message or cannot be reached.
    async fn send(&self, email: &OutboundEmail) -> std::result::Result<(), DeliveryError>;
}
