//! Payment Recorder.
//!
//! Records a payout settled outside the e-mail flow. The payment insert, the
//! booking paid flags and the invoice request update happen in one store
//! transaction, and a booking that is already paid or claimed by a payout in
//! progress rejects the whole call.

use crate::environment::BillingEnvironment;
use dormclean_core::{
    BookingStatus, Error, InvoiceRequestStatus, Money, NewPayment, Payment, PaymentStatus, Profile, ProfileId,
    Result,
};

/// Persists payments atomically.
#[derive(Clone, Debug)]
pub struct PaymentRecorder {
    env: BillingEnvironment,
}

impl PaymentRecorder {
    /// Create a recorder.
    #[must_use]
    pub const fn new(env: BillingEnvironment) -> Self {
        Self { env }
    }

    /// Record a committed payment for `input.booking_ids`.
    ///
    /// The provider name is taken from the current profile. An amount that
    /// differs from the bookings' net payout is logged, not rejected.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty booking list or a booking that is not completed
    /// - [`Error::NotFound`] for an unknown provider, booking or invoice request
    /// - [`Error::Forbidden`] when a booking or invoice request belongs to another provider
    /// - [`Error::Conflict`] when a booking is already paid or an invoice request is settled
    pub async fn record(&self, mut input: NewPayment) -> Result<Payment> {
        input.validate()?;
        let provider = load_provider(&self.env, &input.provider_id).await?;
        input.provider_name.clone_from(&provider.name);

        let mut expected = Money::ZERO;
        for id in &input.booking_ids {
            let booking = self
                .env
                .bookings
                .get_booking(id)
                .await?
                .ok_or_else(|| Error::not_found("Booking", id))?;
            if !booking.is_assigned_to(&provider.id) {
                return Err(Error::Forbidden(format!("booking {id} is not assigned to {}", provider.id)));
            }
            if booking.status != BookingStatus::Completed {
                return Err(Error::validation("booking_ids", format!("booking {id} is not completed")));
            }
            if booking.provider_paid {
                return Err(Error::conflict(format!("booking {id} was already paid out")));
            }
            expected = expected.saturating_add(provider.commission_or_zero().net_of(booking.price));
        }

        if let Some(request_id) = &input.invoice_request_id {
            check_invoice_request(&self.env, request_id, &provider.id).await?;
        }

        if input.amount != expected {
            tracing::warn!(
                provider_id = %provider.id,
                amount = input.amount.cents(),
                expected = expected.cents(),
                "Recorded payment amount differs from net payout of its bookings"
            );
        }

        let payment = Payment::new(input, PaymentStatus::Committed, None, self.env.clock.now());
        self.env.payments.record_payment(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            provider_id = %payment.provider_id,
            bookings = payment.booking_ids.len(),
            amount = payment.amount.cents(),
            "Recorded payment"
        );
        Ok(payment)
    }
}

/// Load a profile that must exist and be a provider.
pub(crate) async fn load_provider(env: &BillingEnvironment, id: &ProfileId) -> Result<Profile> {
    env.profiles
        .get_profile(id)
        .await?
        .filter(Profile::is_provider)
        .ok_or_else(|| Error::not_found("Provider", id))
}

/// An invoice request must belong to the provider and still be pending.
pub(crate) async fn check_invoice_request(
    env: &BillingEnvironment,
    id: &dormclean_core::InvoiceRequestId,
    provider: &ProfileId,
) -> Result<()> {
    let request = env
        .invoice_requests
        .get_invoice_request(id)
        .await?
        .ok_or_else(|| Error::not_found("InvoiceRequest", id))?;
    if &request.provider_id != provider {
        return Err(Error::Forbidden(format!("invoice request {id} belongs to another provider")));
    }
    if request.status == InvoiceRequestStatus::Paid {
        return Err(Error::conflict(format!("invoice request {id} is already paid")));
    }
    Ok(())
}
