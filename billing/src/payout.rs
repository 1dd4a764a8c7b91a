//! Payout runs.
//!
//! A payout run pays one provider for every completed, unpaid booking and
//! notifies them with the invoice attached. It is a two-phase sequence:
//!
//! ```text
//! aggregate ─▶ render ─▶ open intent ─▶ dispatch ─┬─ sent ───▶ commit
//!                        (claims bookings)        └─ failed ─▶ abandon
//! ```
//!
//! Every dispatch attempt lands in the delivery ledger. A crash between
//! dispatch and commit leaves a `PendingNotification` payment behind;
//! [`PayoutService::reconcile`] resolves it from the ledger alone and never
//! sends the e-mail a second time.

use crate::aggregate::{PlatformTotals, ProviderBilling, aggregate, aggregate_provider};
use crate::environment::BillingEnvironment;
use crate::invoice::{InvoiceDocument, InvoiceGenerator};
use crate::notify::invoice_email;
use crate::recorder::{check_invoice_request, load_provider};
use chrono::TimeDelta;
use dormclean_core::{
    DeliveryAttempt, Error, InvoiceRequestId, NaiveDate, NewPayment, Payment, PaymentId, PaymentStatus,
    ProfileId, Result, Role,
};
use serde::Serialize;

/// Default age a pending intent must reach before reconciliation touches it.
pub const DEFAULT_RECONCILE_GRACE: TimeDelta = TimeDelta::minutes(5);

/// Options for one payout run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayoutRequest {
    /// Monthly invoice request settled by this run
    pub invoice_request_id: Option<InvoiceRequestId>,
    /// Payment date; defaults to today
    pub payment_date: Option<NaiveDate>,
}

/// Result of a successful payout run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayoutReceipt {
    /// The committed payment
    pub payment: Payment,
    /// Invoice number sent
    pub invoice_id: String,
    /// Notification recipient
    pub notified: String,
}

/// Outcome of a reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Intents committed because the ledger shows a delivery
    pub committed: Vec<PaymentId>,
    /// Intents abandoned because nothing was delivered
    pub abandoned: Vec<PaymentId>,
    /// Intents too recent to touch
    pub skipped: usize,
    /// Intents that could not be resolved this pass
    pub failed: usize,
}

/// Billing queries and payout orchestration.
#[derive(Clone, Debug)]
pub struct PayoutService {
    env: BillingEnvironment,
    generator: InvoiceGenerator,
    reconcile_grace: TimeDelta,
}

impl PayoutService {
    /// Create a service.
    #[must_use]
    pub const fn new(env: BillingEnvironment, generator: InvoiceGenerator) -> Self {
        Self {
            env,
            generator,
            reconcile_grace: DEFAULT_RECONCILE_GRACE,
        }
    }

    /// Set how old a pending intent must be before reconciliation resolves it.
    #[must_use]
    pub fn with_reconcile_grace(mut self, grace: TimeDelta) -> Self {
        self.reconcile_grace = grace;
        self
    }

    /// Every provider's aggregate plus platform totals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when a store fails.
    pub async fn overview(&self) -> Result<(Vec<ProviderBilling>, PlatformTotals)> {
        let providers = self.env.profiles.list_profiles(Some(Role::Provider)).await?;
        let bookings = self.env.bookings.list_bookings().await?;
        let aggregates = aggregate(&providers, &bookings);
        let totals = PlatformTotals::from_aggregates(&aggregates);
        Ok((aggregates, totals))
    }

    /// One provider's aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when `provider_id` is not a provider.
    pub async fn billing_for(&self, provider_id: &ProfileId) -> Result<ProviderBilling> {
        let provider = load_provider(&self.env, provider_id).await?;
        let bookings = self.env.bookings.list_bookings_for_provider(provider_id).await?;
        Ok(aggregate_provider(&provider, &bookings))
    }

    /// Render the invoice a payout run would send now, without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when `provider_id` is not a provider.
    pub async fn preview(&self, provider_id: &ProfileId) -> Result<InvoiceDocument> {
        let aggregate = self.billing_for(provider_id).await?;
        Ok(self.generator.generate(&aggregate, self.env.clock.now()))
    }

    /// Pay a provider for all completed, unpaid bookings and send the invoice.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown provider or invoice request
    /// - [`Error::Validation`] when nothing is due
    /// - [`Error::Conflict`] when a booking is claimed by another run
    /// - [`Error::Delivery`] when the e-mail failed; the payment is abandoned
    ///   and no booking is flagged paid
    pub async fn execute(&self, provider_id: &ProfileId, request: PayoutRequest) -> Result<PayoutReceipt> {
        let billing = self.billing_for(provider_id).await?;
        if !billing.has_payout_due() {
            return Err(Error::validation(
                "booking_ids",
                format!("nothing to pay: {} has no completed unpaid bookings", billing.provider_name),
            ));
        }
        if let Some(request_id) = &request.invoice_request_id {
            check_invoice_request(&self.env, request_id, provider_id).await?;
        }

        let now = self.env.clock.now();
        let document = self.generator.generate(&billing, now);
        let payment_date = request.payment_date.unwrap_or_else(|| now.date_naive());

        let intent = Payment::new(
            NewPayment {
                provider_id: billing.provider_id.clone(),
                provider_name: billing.provider_name.clone(),
                booking_ids: billing.unpaid_booking_ids(),
                amount: billing.total_payout_due,
                payment_date,
                invoice_request_id: request.invoice_request_id,
            },
            PaymentStatus::PendingNotification,
            Some(document.invoice_id().to_string()),
            now,
        );
        self.env.payments.open_intent(&intent).await?;
        tracing::info!(
            payment_id = %intent.id,
            provider_id = %intent.provider_id,
            bookings = intent.booking_ids.len(),
            amount = intent.amount.cents(),
            invoice_id = %document.invoice_id(),
            "Opened payout intent"
        );

        let email = invoice_email(&document, payment_date);
        if let Err(err) = self.dispatch(&intent.id, &email).await {
            let abandoned = self.env.payments.abandon_intent(&intent.id, self.env.clock.now()).await;
            if let Err(abandon_err) = abandoned {
                tracing::error!(
                    payment_id = %intent.id,
                    error = %abandon_err,
                    "Failed to abandon payout intent; reconciliation will resolve it"
                );
            } else {
                tracing::warn!(payment_id = %intent.id, "Abandoned payout intent after failed delivery");
            }
            return Err(err);
        }

        let payment = self.env.payments.commit_intent(&intent.id, self.env.clock.now()).await?;
        tracing::info!(payment_id = %payment.id, provider_id = %payment.provider_id, "Committed payout");

        Ok(PayoutReceipt {
            payment,
            invoice_id: document.invoice_id().to_string(),
            notified: email.to,
        })
    }

    /// Send the notification unless the ledger already records a delivery,
    /// appending the attempt to the ledger either way.
    async fn dispatch(&self, payment_id: &PaymentId, email: &dormclean_core::OutboundEmail) -> Result<()> {
        if self.env.ledger.was_delivered(payment_id).await? {
            tracing::info!(payment_id = %payment_id, "Invoice already delivered, not resending");
            return Ok(());
        }

        let outcome = self.env.mailer.send(email).await;
        let now = self.env.clock.now();
        let attempt = match &outcome {
            Ok(()) => DeliveryAttempt::sent(*payment_id, &email.to, now),
            Err(err) => DeliveryAttempt::failed(*payment_id, &email.to, &err.message, now),
        };
        if let Err(ledger_err) = self.env.ledger.record_attempt(&attempt).await {
            tracing::error!(payment_id = %payment_id, error = %ledger_err, "Failed to record delivery attempt");
        }

        match outcome {
            Ok(()) => {
                tracing::info!(payment_id = %payment_id, recipient = %email.to, "Invoice e-mail delivered");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(payment_id = %payment_id, recipient = %email.to, error = %err, "Invoice e-mail failed");
                Err(err.into())
            }
        }
    }

    /// Resolve pending intents older than the grace period: commit those the
    /// ledger shows as delivered, abandon the rest. Never sends e-mail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when pending intents cannot be listed.
    /// Failures on individual intents are logged and counted.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let now = self.env.clock.now();
        let mut report = ReconcileReport::default();

        for intent in self.env.payments.list_pending_intents().await? {
            if now - intent.created_at < self.reconcile_grace {
                report.skipped += 1;
                continue;
            }
            match self.resolve(&intent).await {
                Ok(PaymentStatus::Committed) => report.committed.push(intent.id),
                Ok(_) => report.abandoned.push(intent.id),
                Err(err) => {
                    tracing::error!(payment_id = %intent.id, error = %err, "Failed to reconcile payout intent");
                    report.failed += 1;
                }
            }
        }

        if !report.committed.is_empty() || !report.abandoned.is_empty() || report.failed > 0 {
            tracing::info!(
                committed = report.committed.len(),
                abandoned = report.abandoned.len(),
                skipped = report.skipped,
                failed = report.failed,
                "Reconciled payout intents"
            );
        }
        Ok(report)
    }

    async fn resolve(&self, intent: &Payment) -> Result<PaymentStatus> {
        let now = self.env.clock.now();
        let resolved = if self.env.ledger.was_delivered(&intent.id).await? {
            self.env.payments.commit_intent(&intent.id, now).await?
        } else {
            self.env.payments.abandon_intent(&intent.id, now).await?
        };
        Ok(resolved.status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::invoice::BusinessIdentity;
    use crate::test_support::env;
    use dormclean_core::environment::Clock;
    use dormclean_core::providers::{BookingStore, DeliveryLedger, InvoiceRequestStore, PaymentStore, ProfileStore};
    use dormclean_core::{BillingPeriod, DeliveryStatus, InvoiceRequest, InvoiceRequestStatus, Money, Profile};
    use dormclean_testing::Harness;
    use dormclean_testing::fixtures::{BookingBuilder, provider};

    fn service(harness: &Harness) -> PayoutService {
        let generator = InvoiceGenerator::new(
            BusinessIdentity {
                name: "Dormclean".to_string(),
                address: "1 Campus Way".to_string(),
                email: "billing@dormclean.test".to_string(),
                phone: None,
            },
            "USD",
        )
        .unwrap();
        PayoutService::new(env(harness), generator)
    }

    async fn seed(harness: &Harness) -> (Profile, Vec<dormclean_core::BookingId>) {
        let qfs = provider("p-qfs", "QFS", 20.0);
        harness.store.save_profile(&qfs).await.unwrap();
        let mut ids = Vec::new();
        for dollars in [100, 50] {
            let b = BookingBuilder::new().provider(&qfs).price(Money::from_dollars(dollars)).completed().build();
            harness.store.insert_booking(&b).await.unwrap();
            ids.push(b.id);
        }
        (qfs, ids)
    }

    #[tokio::test]
    async fn test_payout_commits_after_delivery() {
        let harness = Harness::new();
        let (qfs, ids) = seed(&harness).await;

        let receipt = service(&harness).execute(&qfs.id, PayoutRequest::default()).await.unwrap();

        assert_eq!(receipt.payment.status, PaymentStatus::Committed);
        assert_eq!(receipt.payment.amount, Money::from_dollars(120));
        assert_eq!(receipt.notified, qfs.email);
        for id in &ids {
            assert!(harness.store.get_booking(id).await.unwrap().unwrap().provider_paid);
        }

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.filename, format!("{}.pdf", receipt.invoice_id));

        let attempts = harness.store.attempts_for(&receipt.payment.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_failed_delivery_abandons_and_leaves_bookings_unpaid() {
        let harness = Harness::new();
        let (qfs, ids) = seed(&harness).await;
        harness.mailer.fail_with("550 mailbox unavailable");

        let err = service(&harness).execute(&qfs.id, PayoutRequest::default()).await.unwrap_err();
        assert!(matches!(&err, Error::Delivery(d) if d.message == "550 mailbox unavailable"));

        for id in &ids {
            assert!(!harness.store.get_booking(id).await.unwrap().unwrap().provider_paid);
        }
        let payments = harness.store.list_payments(Some(&qfs.id)).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Abandoned);
        let attempts = harness.store.attempts_for(&payments[0].id).await.unwrap();
        assert_eq!(attempts[0].diagnostic.as_deref(), Some("550 mailbox unavailable"));

        // Bookings are released, so a later run can pay them
        harness.mailer.succeed();
        let receipt = service(&harness).execute(&qfs.id, PayoutRequest::default()).await.unwrap();
        assert_eq!(receipt.payment.booking_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_due_has_no_side_effects() {
        let harness = Harness::new();
        let qfs = provider("p-qfs", "QFS", 20.0);
        harness.store.save_profile(&qfs).await.unwrap();

        let err = service(&harness).execute(&qfs.id, PayoutRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(harness.mailer.sent().is_empty());
        assert!(harness.store.list_payments(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_while_pending_conflicts() {
        let harness = Harness::new();
        let (qfs, ids) = seed(&harness).await;
        let svc = service(&harness);

        // A run that crashed after opening its intent
        let intent = Payment::new(
            NewPayment {
                provider_id: qfs.id.clone(),
                provider_name: qfs.name.clone(),
                booking_ids: ids,
                amount: Money::from_dollars(120),
                payment_date: harness.clock.now().date_naive(),
                invoice_request_id: None,
            },
            PaymentStatus::PendingNotification,
            None,
            harness.clock.now(),
        );
        harness.store.open_intent(&intent).await.unwrap();

        let err = svc.execute(&qfs.id, PayoutRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(harness.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_commits_delivered_and_abandons_undelivered() {
        let harness = Harness::new();
        let (qfs, ids) = seed(&harness).await;
        let svc = service(&harness).with_reconcile_grace(TimeDelta::zero());

        let new_intent = |booking_ids| {
            Payment::new(
                NewPayment {
                    provider_id: qfs.id.clone(),
                    provider_name: qfs.name.clone(),
                    booking_ids,
                    amount: Money::from_dollars(40),
                    payment_date: harness.clock.now().date_naive(),
                    invoice_request_id: None,
                },
                PaymentStatus::PendingNotification,
                None,
                harness.clock.now(),
            )
        };
        let delivered = new_intent(vec![ids[0]]);
        let lost = new_intent(vec![ids[1]]);
        harness.store.open_intent(&delivered).await.unwrap();
        harness.store.open_intent(&lost).await.unwrap();
        harness
            .store
            .record_attempt(&DeliveryAttempt::sent(delivered.id, &qfs.email, harness.clock.now()))
            .await
            .unwrap();

        let report = svc.reconcile().await.unwrap();
        assert_eq!(report.committed, vec![delivered.id]);
        assert_eq!(report.abandoned, vec![lost.id]);
        assert!(harness.mailer.sent().is_empty(), "reconcile must never send");
        assert!(harness.store.get_booking(&ids[0]).await.unwrap().unwrap().provider_paid);
        assert!(!harness.store.get_booking(&ids[1]).await.unwrap().unwrap().provider_paid);

        // Nothing left to do
        assert_eq!(svc.reconcile().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_reconcile_respects_grace_period() {
        let harness = Harness::new();
        let (qfs, ids) = seed(&harness).await;
        let intent = Payment::new(
            NewPayment {
                provider_id: qfs.id.clone(),
                provider_name: qfs.name.clone(),
                booking_ids: ids,
                amount: Money::from_dollars(120),
                payment_date: harness.clock.now().date_naive(),
                invoice_request_id: None,
            },
            PaymentStatus::PendingNotification,
            None,
            harness.clock.now(),
        );
        harness.store.open_intent(&intent).await.unwrap();
        let svc = service(&harness);

        assert_eq!(svc.reconcile().await.unwrap().skipped, 1);
        harness.clock.advance(TimeDelta::minutes(6));
        assert_eq!(svc.reconcile().await.unwrap().abandoned, vec![intent.id]);
    }

    #[tokio::test]
    async fn test_payout_settles_invoice_request() {
        let harness = Harness::new();
        let (qfs, _) = seed(&harness).await;
        let request = InvoiceRequest::new(qfs.id.clone(), "QFS", BillingPeriod::new(3, 2025).unwrap(), harness.clock.now());
        harness.store.create_invoice_request(&request).await.unwrap();

        service(&harness)
            .execute(
                &qfs.id,
                PayoutRequest {
                    invoice_request_id: Some(request.id),
                    payment_date: None,
                },
            )
            .await
            .unwrap();

        let stored = harness.store.get_invoice_request(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceRequestStatus::Paid);
    }

    #[tokio::test]
    async fn test_overview_and_preview() {
        let harness = Harness::new();
        let (qfs, _) = seed(&harness).await;
        let svc = service(&harness);

        let (aggregates, totals) = svc.overview().await.unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(totals.total_payout_due, Money::from_dollars(120));
        assert_eq!(totals.total_service_value, Money::from_dollars(150));

        let doc = svc.preview(&qfs.id).await.unwrap();
        assert_eq!(doc.layout().total, Money::from_dollars(120));
        assert!(harness.mailer.sent().is_empty());
        assert!(harness.store.list_payments(None).await.unwrap().is_empty());

        let err = svc.preview(&dormclean_core::ProfileId::new("nobody")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
