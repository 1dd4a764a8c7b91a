//! Payments, payout intents, invoice requests and the delivery ledger.

use crate::PostgresStore;
use crate::rows::{
    AttemptRow, INVOICE_REQUEST_COLUMNS, InvoiceRequestRow, PAYMENT_COLUMNS, PaymentRow, booking_uuids, cents, convert,
    db, is_unique_violation,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dormclean_core::providers::{DeliveryLedger, InvoiceRequestStore, PaymentStore};
use dormclean_core::{
    BookingId, DeliveryAttempt, Error, InvoiceRequest, InvoiceRequestId, Payment, PaymentId, PaymentStatus, ProfileId,
    Result,
};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Lock the bookings and reject the set unless every one exists unpaid and
/// unheld by a pending payout.
async fn claim_bookings(tx: &mut Transaction<'_, Postgres>, ids: &[BookingId]) -> Result<()> {
    let wanted = booking_uuids(ids);
    let found: Vec<(Uuid, bool)> =
        sqlx::query_as("SELECT id, provider_paid FROM bookings WHERE id = ANY($1) FOR UPDATE")
            .bind(&wanted)
            .fetch_all(&mut **tx)
            .await
            .map_err(db("lock bookings"))?;

    for id in ids {
        match found.iter().find(|(uuid, _)| uuid == id.as_uuid()) {
            None => return Err(Error::not_found("Booking", id)),
            Some((_, true)) => return Err(Error::conflict(format!("booking {id} was already paid out"))),
            Some((_, false)) => {},
        }
    }

    let held: Option<(Uuid,)> = sqlx::query_as(
        r"
        SELECT held.booking_id
        FROM payments, unnest(payments.booking_ids) AS held(booking_id)
        WHERE payments.status = 'pending_notification' AND held.booking_id = ANY($1)
        LIMIT 1
        ",
    )
    .bind(&wanted)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db("check pending payouts"))?;

    if let Some((booking,)) = held {
        return Err(Error::conflict(format!("booking {booking} is part of a payout in progress")));
    }
    Ok(())
}

async fn insert_payment(tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(payment.id.as_uuid())
    .bind(payment.provider_id.as_str())
    .bind(&payment.provider_name)
    .bind(booking_uuids(&payment.booking_ids))
    .bind(cents(payment.amount)?)
    .bind(payment.payment_date)
    .bind(payment.invoice_request_id.map(|id| *id.as_uuid()))
    .bind(payment.status.as_str())
    .bind(&payment.invoice_id)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(db("insert payment"))?;
    Ok(())
}

/// Flag the payment's bookings paid and its invoice request settled.
async fn settle(tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> Result<()> {
    sqlx::query("UPDATE bookings SET provider_paid = TRUE, updated_at = $2 WHERE id = ANY($1)")
        .bind(booking_uuids(&payment.booking_ids))
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db("flag bookings paid"))?;

    if let Some(request) = &payment.invoice_request_id {
        sqlx::query("UPDATE invoice_requests SET status = 'paid' WHERE id = $1")
            .bind(request.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(db("settle invoice request"))?;
    }
    Ok(())
}

/// Load a payment under lock, advance it and persist the new status.
async fn advance(tx: &mut Transaction<'_, Postgres>, id: &PaymentId, next: PaymentStatus, now: DateTime<Utc>) -> Result<Payment> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"))
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(db("load payment"))?
        .ok_or_else(|| Error::not_found("Payment", id))?;

    let mut payment = Payment::try_from(row)?;
    payment.advance(next, now)?;

    sqlx::query("UPDATE payments SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db("update payment"))?;
    Ok(payment)
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn record_payment(&self, payment: &Payment) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db("begin"))?;
        claim_bookings(&mut tx, &payment.booking_ids).await?;

        if let Some(request) = &payment.invoice_request_id {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM invoice_requests WHERE id = $1 FOR UPDATE")
                .bind(request.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db("load invoice request"))?;
            if exists.is_none() {
                return Err(Error::not_found("InvoiceRequest", request));
            }
        }

        insert_payment(&mut tx, payment).await?;
        settle(&mut tx, payment).await?;
        tx.commit().await.map_err(db("commit"))?;
        Ok(())
    }

    async fn open_intent(&self, payment: &Payment) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db("begin"))?;
        claim_bookings(&mut tx, &payment.booking_ids).await?;
        insert_payment(&mut tx, payment).await?;
        tx.commit().await.map_err(db("commit"))?;
        Ok(())
    }

    async fn commit_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(db("begin"))?;
        let payment = advance(&mut tx, id, PaymentStatus::Committed, now).await?;
        settle(&mut tx, &payment).await?;
        tx.commit().await.map_err(db("commit"))?;
        Ok(payment)
    }

    async fn abandon_intent(&self, id: &PaymentId, now: DateTime<Utc>) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(db("begin"))?;
        let payment = advance(&mut tx, id, PaymentStatus::Abandoned, now).await?;
        tx.commit().await.map_err(db("commit"))?;
        Ok(payment)
    }

    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get payment"))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn list_pending_intents(&self) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = 'pending_notification' ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db("list pending payouts"))?;
        convert(rows)
    }

    async fn list_payments(&self, provider: Option<&ProfileId>) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE ($1::text IS NULL OR provider_id = $1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(provider.map(ProfileId::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(db("list payments"))?;
        convert(rows)
    }
}

#[async_trait]
impl InvoiceRequestStore for PostgresStore {
    async fn create_invoice_request(&self, request: &InvoiceRequest) -> Result<()> {
        let month = i32::try_from(request.period.month).map_err(|_| Error::validation("month", "month out of range"))?;
        let result = sqlx::query(&format!(
            "INSERT INTO invoice_requests ({INVOICE_REQUEST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(request.id.as_uuid())
        .bind(request.provider_id.as_str())
        .bind(&request.provider_name)
        .bind(month)
        .bind(request.period.year)
        .bind(request.requested_at)
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::conflict(format!(
                "an invoice request for {} is already pending",
                request.period
            ))),
            Err(e) => Err(db("insert invoice request")(e)),
        }
    }

    async fn get_invoice_request(&self, id: &InvoiceRequestId) -> Result<Option<InvoiceRequest>> {
        sqlx::query_as::<_, InvoiceRequestRow>(&format!(
            "SELECT {INVOICE_REQUEST_COLUMNS} FROM invoice_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db("get invoice request"))?
        .map(InvoiceRequest::try_from)
        .transpose()
    }

    async fn list_invoice_requests(&self, provider: Option<&ProfileId>) -> Result<Vec<InvoiceRequest>> {
        let rows = sqlx::query_as::<_, InvoiceRequestRow>(&format!(
            "SELECT {INVOICE_REQUEST_COLUMNS} FROM invoice_requests WHERE ($1::text IS NULL OR provider_id = $1) \
             ORDER BY requested_at DESC, id DESC"
        ))
        .bind(provider.map(ProfileId::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(db("list invoice requests"))?;
        convert(rows)
    }
}

#[async_trait]
impl DeliveryLedger for PostgresStore {
    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO delivery_attempts (payment_id, recipient, status, diagnostic, attempted_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(attempt.payment_id.as_uuid())
        .bind(&attempt.recipient)
        .bind(attempt.status.as_str())
        .bind(&attempt.diagnostic)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(db("record delivery attempt"))?;
        Ok(())
    }

    async fn attempts_for(&self, payment: &PaymentId) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r"
            SELECT payment_id, recipient, status, diagnostic, attempted_at
            FROM delivery_attempts
            WHERE payment_id = $1
            ORDER BY id
            ",
        )
        .bind(payment.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db("list delivery attempts"))?;
        convert(rows)
    }

    async fn was_delivered(&self, payment: &PaymentId) -> Result<bool> {
        let (delivered,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM delivery_attempts WHERE payment_id = $1 AND status = 'sent')",
        )
        .bind(payment.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db("check delivery"))?;
        Ok(delivered)
    }
}
