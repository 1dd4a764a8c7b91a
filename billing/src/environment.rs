//! Billing environment.
//!
//! Bundles the collaborators the billing services need so the server wires
//! them once and tests swap in in-memory fakes.

use dormclean_core::environment::Clock;
use dormclean_core::providers::{BookingStore, DeliveryLedger, InvoiceRequestStore, Mailer, PaymentStore, ProfileStore};
use std::sync::Arc;

/// External dependencies of the billing services.
#[derive(Clone)]
pub struct BillingEnvironment {
    /// Provider profiles
    pub profiles: Arc<dyn ProfileStore>,
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// Payments and the paid flags they own
    pub payments: Arc<dyn PaymentStore>,
    /// Monthly invoice requests
    pub invoice_requests: Arc<dyn InvoiceRequestStore>,
    /// Notification attempts per payment
    pub ledger: Arc<dyn DeliveryLedger>,
    /// Outbound mail transport
    pub mailer: Arc<dyn Mailer>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BillingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingEnvironment").finish_non_exhaustive()
    }
}
