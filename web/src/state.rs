//! Application state for Axum handlers.

use crate::identity::IdentityVerifier;
use dormclean_billing::{BillingEnvironment, InvoiceGenerator, InvoiceRequestService, PaymentRecorder, PayoutService};
use dormclean_core::environment::Clock;
use dormclean_core::providers::{BookingStore, BuildingStore, ComplaintStore, PaymentStore, ProfileStore};
use dormclean_ingest::OrderIngestor;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Profiles
    pub profiles: Arc<dyn ProfileStore>,
    /// Buildings
    pub buildings: Arc<dyn BuildingStore>,
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// Complaints and responses
    pub complaints: Arc<dyn ComplaintStore>,
    /// Payment history
    pub payments: Arc<dyn PaymentStore>,
    /// Billing queries and payout runs
    pub payouts: Arc<PayoutService>,
    /// Direct payment recording
    pub recorder: Arc<PaymentRecorder>,
    /// Monthly invoice requests
    pub invoice_requests: Arc<InvoiceRequestService>,
    /// Order webhook adapter
    pub ingestor: Arc<OrderIngestor>,
    /// Bearer token verification
    pub identity: Arc<dyn IdentityVerifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the billing services over `env` and keep the remaining stores.
    ///
    /// `payouts` is taken pre-built so callers can tune it (reconcile grace);
    /// use [`AppState::with_defaults`] otherwise.
    #[must_use]
    pub fn new(
        env: BillingEnvironment,
        buildings: Arc<dyn BuildingStore>,
        complaints: Arc<dyn ComplaintStore>,
        payouts: PayoutService,
        ingestor: OrderIngestor,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            profiles: env.profiles.clone(),
            bookings: env.bookings.clone(),
            payments: env.payments.clone(),
            clock: env.clock.clone(),
            buildings,
            complaints,
            payouts: Arc::new(payouts),
            recorder: Arc::new(PaymentRecorder::new(env.clone())),
            invoice_requests: Arc::new(InvoiceRequestService::new(env)),
            ingestor: Arc::new(ingestor),
            identity,
        }
    }

    /// Default payout service and an ingestor that accepts unsigned deliveries.
    #[must_use]
    pub fn with_defaults(
        env: BillingEnvironment,
        buildings: Arc<dyn BuildingStore>,
        complaints: Arc<dyn ComplaintStore>,
        generator: InvoiceGenerator,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let payouts = PayoutService::new(env.clone(), generator);
        let ingestor = OrderIngestor::new(env.bookings.clone(), buildings.clone(), env.clock.clone());
        Self::new(env, buildings, complaints, payouts, ingestor, identity)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
