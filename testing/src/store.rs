//! In-memory implementation of every dormclean store trait.
//!
//! One mutex guards all tables, so each trait method is atomic the same way a
//! single database transaction is.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dormclean_core::providers::{
    BookingStore, BuildingStore, ComplaintScope, ComplaintStore, DeliveryLedger, InvoiceRequestStore, PaymentStore,
    ProfileStore,
};
use dormclean_core::{
    Booking, BookingId, Building, BuildingId, Complaint, ComplaintId, ComplaintResponse, DeliveryAttempt, Error,
    InvoiceRequest, InvoiceRequestId, InvoiceRequestStatus, Payment, PaymentId, PaymentStatus, Profile, ProfileId,
    Result, Role,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<ProfileId, Profile>,
    buildings: HashMap<BuildingId, Building>,
    bookings: Vec<Booking>,
    complaints: Vec<Complaint>,
    responses: Vec<ComplaintResponse>,
    invoice_requests: Vec<InvoiceRequest>,
    payments: Vec<Payment>,
    attempts: Vec<DeliveryAttempt>,
}

impl Tables {
    /// Every booking must exist and be neither paid nor held by a pending payment.
    fn check_unclaimed(&self, ids: &[BookingId]) -> Result<()> {
        for id in ids {
            let booking = self
                .bookings
                .iter()
                .find(|b| &b.id == id)
                .ok_or_else(|| Error::not_found("Booking", id))?;
            if booking.provider_paid {
                return Err(Error::conflict(format!("booking {id} was already paid out")));
            }
            let held = self
                .payments
                .iter()
                .any(|p| p.status == PaymentStatus::PendingNotification && p.booking_ids.contains(id));
            if held {
                return Err(Error::conflict(format!("booking {id} is part of a payout in progress")));
            }
        }
        Ok(())
    }

    fn settle(&mut self, payment: &Payment) {
        for booking in &mut self.bookings {
            if payment.booking_ids.contains(&booking.id) {
                booking.provider_paid = true;
                booking.updated_at = payment.updated_at;
            }
        }
        if let Some(request_id) = &payment.invoice_request_id {
            if let Some(request) = self.invoice_requests.iter_mut().find(|r| &r.id == request_id) {
                request.status = InvoiceRequestStatus::Paid;
            }
        }
    }

    fn payment_mut(&mut self, id: &PaymentId) -> Result<&mut Payment> {
        self.payments
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| Error::not_found("Payment", id))
    }
}

/// In-memory store for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use dormclean_testing::InMemoryStore;
/// use dormclean_testing::fixtures::provider;
/// use dormclean_core::providers::ProfileStore;
///
/// # async fn example() -> dormclean_core::Result<()> {
/// let store = InMemoryStore::new();
/// let qfs = provider("p-qfs", "QFS", 20.0);
/// store.save_profile(&qfs).await?;
/// assert!(store.get_profile(&qfs.id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings.
    #[must_use]
    pub fn booking_count(&self) -> usize {
        self.tables.lock().unwrap().bookings.len()
    }

    /// Overwrite a booking wholesale, paid flag included.
    ///
    /// Lets tests arrange states that only the payment path can normally reach.
    pub fn put_booking(&self, booking: Booking) {
        let mut tables = self.tables.lock().unwrap();
        tables.bookings.retain(|b| b.id != booking.id);
        tables.bookings.push(booking);
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>> {
        Ok(self.tables.lock().unwrap().profiles.get(id).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.tables
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>> {
        let tables = self.tables.lock().unwrap();
        let mut profiles: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| role.is_none_or(|r| p.role == r))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(profiles)
    }
}

#[async_trait]
impl BuildingStore for InMemoryStore {
    async fn get_building(&self, id: &BuildingId) -> Result<Option<Building>> {
        Ok(self.tables.lock().unwrap().buildings.get(id).cloned())
    }

    async fn list_buildings(&self) -> Result<Vec<Building>> {
        let tables = self.tables.lock().unwrap();
        let mut buildings: Vec<Building> = tables.buildings.values().cloned().collect();
        buildings.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(buildings)
    }

    async fn insert_building(&self, building: &Building) -> Result<()> {
        self.tables
            .lock()
            .unwrap()
            .buildings
            .insert(building.id, building.clone());
        Ok(())
    }

    async fn update_building(&self, building: &Building) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .buildings
            .get_mut(&building.id)
            .ok_or_else(|| Error::not_found("Building", building.id))?;
        *slot = building.clone();
        Ok(())
    }

    async fn delete_building(&self, id: &BuildingId) -> Result<()> {
        self.tables
            .lock()
            .unwrap()
            .buildings
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Building", id))
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.lock().unwrap().bookings.iter().find(|b| &b.id == id).cloned())
    }

    async fn find_by_external_order(&self, order_id: &str) -> Result<Option<Booking>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .bookings
            .iter()
            .find(|b| b.external_order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(order_id) = &booking.external_order_id {
            if tables.bookings.iter().any(|b| b.external_order_id.as_ref() == Some(order_id)) {
                return Err(Error::conflict(format!("order {order_id} was already ingested")));
            }
        }
        tables.bookings.push(booking.clone());
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .bookings
            .iter_mut()
            .find(|b| b.id == booking.id)
            .ok_or_else(|| Error::not_found("Booking", booking.id))?;
        let paid = slot.provider_paid;
        *slot = booking.clone();
        slot.provider_paid = paid;
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.tables.lock().unwrap().bookings.iter().rev().cloned().collect())
    }

    async fn list_bookings_for_customer(&self, customer: &ProfileId) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .bookings
            .iter()
            .rev()
            .filter(|b| b.customer_id.as_ref() == Some(customer))
            .cloned()
            .collect())
    }

    async fn list_bookings_for_provider(&self, provider: &ProfileId) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .bookings
            .iter()
            .rev()
            .filter(|b| b.is_assigned_to(provider))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ComplaintStore for InMemoryStore {
    async fn get_complaint(&self, id: &ComplaintId) -> Result<Option<Complaint>> {
        Ok(self.tables.lock().unwrap().complaints.iter().find(|c| &c.id == id).cloned())
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<()> {
        self.tables.lock().unwrap().complaints.push(complaint.clone());
        Ok(())
    }

    async fn add_response(&self, complaint: &Complaint, response: &ComplaintResponse) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let slot = tables
            .complaints
            .iter_mut()
            .find(|c| c.id == complaint.id)
            .ok_or_else(|| Error::not_found("Complaint", complaint.id))?;
        *slot = complaint.clone();
        tables.responses.push(response.clone());
        Ok(())
    }

    async fn list_responses(&self, id: &ComplaintId) -> Result<Vec<ComplaintResponse>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .responses
            .iter()
            .filter(|r| &r.complaint_id == id)
            .cloned()
            .collect())
    }

    async fn list_complaints(&self, scope: ComplaintScope) -> Result<Vec<Complaint>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .complaints
            .iter()
            .rev()
            .filter(|c| match &scope {
                ComplaintScope::All => true,
                ComplaintScope::Customer(id) => &c.customer_id == id,
                ComplaintScope::Provider(id) => c.provider_id.as_ref() == Some(id),
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InvoiceRequestStore for InMemoryStore {
    async fn create_invoice_request(&self, request: &InvoiceRequest) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let duplicate = tables.invoice_requests.iter().any(|r| {
            r.provider_id == request.provider_id
                && r.period == request.period
                && r.status == InvoiceRequestStatus::Pending
        });
        if duplicate {
            return Err(Error::conflict(format!(
                "an invoice request for {} is already pending",
                request.period
            )));
        }
        tables.invoice_requests.push(request.clone());
        Ok(())
    }

    async fn get_invoice_request(&self, id: &InvoiceRequestId) -> Result<Option<InvoiceRequest>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .invoice_requests
            .iter()
            .find(|r| &r.id == id)
            .cloned())
    }

    async fn list_invoice_requests(&self, provider: Option<&ProfileId>) -> Result<Vec<InvoiceRequest>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .invoice_requests
            .iter()
            .rev()
            .filter(|r| provider.is_none_or(|p| &r.provider_id == p))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn record_payment(&self, payment: &Payment) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_unclaimed(&payment.booking_ids)?;
        if let Some(request_id) = &payment.invoice_request_id {
            if !tables.invoice_requests.iter().any(|r| &r.id == request_id) {
                return Err(Error::not_found("InvoiceRequest", request_id));
            }
        }
        tables.payments.push(payment.clone());
        tables.settle(payment);
        Ok(())
    }

    async fn open_intent(&self, payment: &Payment) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.check_unclaimed(&payment.booking_ids)?;
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn commit_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment> {
        let mut tables = self.tables.lock().unwrap();
        let payment = tables.payment_mut(id)?;
        payment.advance(PaymentStatus::Committed, now)?;
        let committed = payment.clone();
        tables.settle(&committed);
        Ok(committed)
    }

    async fn abandon_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment> {
        let mut tables = self.tables.lock().unwrap();
        let payment = tables.payment_mut(id)?;
        payment.advance(PaymentStatus::Abandoned, now)?;
        Ok(payment.clone())
    }

    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.lock().unwrap().payments.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_pending_intents(&self) -> Result<Vec<Payment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::PendingNotification)
            .cloned()
            .collect())
    }

    async fn list_payments(&self, provider: Option<&ProfileId>) -> Result<Vec<Payment>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .payments
            .iter()
            .rev()
            .filter(|p| provider.is_none_or(|id| &p.provider_id == id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryStore {
    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<()> {
        self.tables.lock().unwrap().attempts.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for(&self, payment: &PaymentId) -> Result<Vec<DeliveryAttempt>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|a| &a.payment_id == payment)
            .cloned()
            .collect())
    }
}
