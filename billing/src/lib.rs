//! # Dormclean Billing
//!
//! Provider billing for the dormclean marketplace:
//!
//! - [`aggregate`]: per-provider billing state computed from profiles and bookings
//! - [`invoice`]: paginated PDF invoices with binary and base64 encodings
//! - [`notify`]: the payout notification e-mail
//! - [`recorder`]: atomic payment recording
//! - [`payout`]: two-phase payout runs and their reconciliation
//! - [`invoice_requests`]: monthly invoice requests
//!
//! Services receive their stores, mailer and clock through
//! [`BillingEnvironment`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod environment;
pub mod invoice;
pub mod invoice_requests;
pub mod notify;
pub mod payout;
pub mod recorder;

pub use aggregate::{BillableBooking, PlatformTotals, ProviderBilling};
pub use environment::BillingEnvironment;
pub use invoice::{BusinessIdentity, InvoiceDocument, InvoiceError, InvoiceGenerator, InvoiceLayout};
pub use invoice_requests::InvoiceRequestService;
pub use payout::{PayoutReceipt, PayoutRequest, PayoutService, ReconcileReport};
pub use recorder::PaymentRecorder;

#[cfg(test)]
mod test_support {
    use crate::BillingEnvironment;
    use dormclean_testing::Harness;

    pub fn env(harness: &Harness) -> BillingEnvironment {
        BillingEnvironment {
            profiles: harness.store.clone(),
            bookings: harness.store.clone(),
            payments: harness.store.clone(),
            invoice_requests: harness.store.clone(),
            ledger: harness.store.clone(),
            mailer: harness.mailer.clone(),
            clock: harness.clock.clone(),
        }
    }
}
