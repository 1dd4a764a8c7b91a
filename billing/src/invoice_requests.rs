//! Monthly invoice requests filed by providers.

use crate::environment::BillingEnvironment;
use dormclean_core::{BillingPeriod, Error, InvoiceRequest, Profile, ProfileId, Result};

/// Files and lists monthly invoice requests.
#[derive(Clone, Debug)]
pub struct InvoiceRequestService {
    env: BillingEnvironment,
}

impl InvoiceRequestService {
    /// Create the service.
    #[must_use]
    pub const fn new(env: BillingEnvironment) -> Self {
        Self { env }
    }

    /// File a request for `month`/`year` on behalf of `provider`.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] when `provider` is not a provider
    /// - [`Error::Validation`] for an invalid month or year
    /// - [`Error::Conflict`] when a pending request already covers the period
    pub async fn request(&self, provider: &Profile, month: u32, year: i32) -> Result<InvoiceRequest> {
        if !provider.is_provider() {
            return Err(Error::Forbidden("only providers can request invoices".to_string()));
        }
        let period = BillingPeriod::new(month, year)?;
        let request = InvoiceRequest::new(provider.id.clone(), provider.name.clone(), period, self.env.clock.now());

        self.env.invoice_requests.create_invoice_request(&request).await?;
        tracing::info!(
            request_id = %request.id,
            provider_id = %provider.id,
            period = %period,
            "Filed invoice request"
        );
        Ok(request)
    }

    /// Requests for one provider, or every request when `provider` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when the store fails.
    pub async fn list(&self, provider: Option<&ProfileId>) -> Result<Vec<InvoiceRequest>> {
        self.env.invoice_requests.list_invoice_requests(provider).await
    }
}
