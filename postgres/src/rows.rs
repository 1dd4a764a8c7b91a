//! Row types and their conversion into domain records.

use chrono::{DateTime, NaiveDate, Utc};
use dormclean_core::{
    Apartment, BillingPeriod, Booking, BookingId, Building, BuildingId, CommissionRate, Complaint, ComplaintId,
    ComplaintResponse, DeliveryAttempt, Error, InvoiceRequest, InvoiceRequestId, Money, Payment, PaymentId, Profile,
    ProfileId, Result, RoomCounts, RoomType,
};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Map a driver error into a storage failure tagged with what was attempted.
pub(crate) fn db(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::database(format!("{context}: {e}"))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn cents(amount: Money) -> Result<i64> {
    i64::try_from(amount.cents()).map_err(|_| Error::validation("amount", "amount is too large to store"))
}

fn money(cents: i64) -> Result<Money> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| Error::database(format!("negative amount {cents} in storage")))
}

pub(crate) fn count(rooms: u32) -> Result<i32> {
    i32::try_from(rooms).map_err(|_| Error::validation("room_counts", "room count is too large"))
}

fn rooms(stored: i32) -> Result<u32> {
    u32::try_from(stored).map_err(|_| Error::database(format!("negative room count {stored} in storage")))
}

pub(crate) fn booking_uuids(ids: &[BookingId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

pub(crate) const PROFILE_COLUMNS: &str = "id, name, email, phone, role, commission_bps, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct ProfileRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    commission_bps: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = Error;

    fn try_from(row: ProfileRow) -> Result<Self> {
        let commission = row
            .commission_bps
            .map(|bps| {
                u32::try_from(bps)
                    .map_err(|_| Error::database(format!("negative commission {bps} in storage")))
                    .and_then(CommissionRate::from_basis_points)
            })
            .transpose()?;
        Ok(Self {
            id: ProfileId::new(row.id),
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.role.parse()?,
            commission,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const BUILDING_COLUMNS: &str =
    "id, name, location, room_types, assigned_provider_id, assigned_provider_name, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct BuildingRow {
    id: Uuid,
    name: String,
    location: String,
    room_types: Json<Vec<RoomType>>,
    assigned_provider_id: Option<String>,
    assigned_provider_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BuildingRow> for Building {
    fn from(row: BuildingRow) -> Self {
        Self {
            id: BuildingId::from_uuid(row.id),
            name: row.name,
            location: row.location,
            room_types: row.room_types.0,
            assigned_provider_id: row.assigned_provider_id.map(ProfileId::new),
            assigned_provider_name: row.assigned_provider_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const BOOKING_COLUMNS: &str = "id, customer_id, customer_name, customer_email, building_id, building, \
     floor, apartment_type, apartment_number, service, rooms_standard, rooms_deep, rooms_move_out, \
     scheduled_date, scheduled_time, frequency, price_cents, status, provider_id, provider_name, \
     before_images, after_images, provider_paid, external_order_id, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    customer_id: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    building_id: Option<Uuid>,
    building: String,
    floor: Option<String>,
    apartment_type: Option<String>,
    apartment_number: Option<String>,
    service: String,
    rooms_standard: i32,
    rooms_deep: i32,
    rooms_move_out: i32,
    scheduled_date: Option<NaiveDate>,
    scheduled_time: Option<String>,
    frequency: Option<String>,
    price_cents: i64,
    status: String,
    provider_id: Option<String>,
    provider_name: Option<String>,
    before_images: Vec<String>,
    after_images: Vec<String>,
    provider_paid: bool,
    external_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Error;

    fn try_from(row: BookingRow) -> Result<Self> {
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            customer_id: row.customer_id.map(ProfileId::new),
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            building_id: row.building_id.map(BuildingId::from_uuid),
            building: row.building,
            apartment: Apartment {
                floor: row.floor,
                apartment_type: row.apartment_type,
                apartment_number: row.apartment_number,
            },
            service: row.service,
            room_counts: RoomCounts {
                standard: rooms(row.rooms_standard)?,
                deep: rooms(row.rooms_deep)?,
                move_out: rooms(row.rooms_move_out)?,
            },
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            frequency: row.frequency,
            price: money(row.price_cents)?,
            status: row.status.parse()?,
            provider_id: row.provider_id.map(ProfileId::new),
            provider_name: row.provider_name,
            before_images: row.before_images,
            after_images: row.after_images,
            provider_paid: row.provider_paid,
            external_order_id: row.external_order_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) const COMPLAINT_COLUMNS: &str = "id, customer_id, customer_name, booking_id, building, complaint_type, \
     text, image_url, status, provider_id, provider_name, last_response_at, created_at";

#[derive(Debug, FromRow)]
pub(crate) struct ComplaintRow {
    id: Uuid,
    customer_id: String,
    customer_name: String,
    booking_id: Option<Uuid>,
    building: String,
    complaint_type: String,
    text: String,
    image_url: Option<String>,
    status: String,
    provider_id: Option<String>,
    provider_name: Option<String>,
    last_response_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = Error;

    fn try_from(row: ComplaintRow) -> Result<Self> {
        Ok(Self {
            id: ComplaintId::from_uuid(row.id),
            customer_id: ProfileId::new(row.customer_id),
            customer_name: row.customer_name,
            booking_id: row.booking_id.map(BookingId::from_uuid),
            building: row.building,
            complaint_type: row.complaint_type.parse()?,
            text: row.text,
            image_url: row.image_url,
            status: row.status.parse()?,
            provider_id: row.provider_id.map(ProfileId::new),
            provider_name: row.provider_name,
            last_response_at: row.last_response_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ResponseRow {
    complaint_id: Uuid,
    text: String,
    responder_role: String,
    responder_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResponseRow> for ComplaintResponse {
    type Error = Error;

    fn try_from(row: ResponseRow) -> Result<Self> {
        Ok(Self {
            complaint_id: ComplaintId::from_uuid(row.complaint_id),
            text: row.text,
            responder_role: row.responder_role.parse()?,
            responder_name: row.responder_name,
            created_at: row.created_at,
        })
    }
}

pub(crate) const INVOICE_REQUEST_COLUMNS: &str = "id, provider_id, provider_name, month, year, requested_at, status";

#[derive(Debug, FromRow)]
pub(crate) struct InvoiceRequestRow {
    id: Uuid,
    provider_id: String,
    provider_name: String,
    month: i32,
    year: i32,
    requested_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<InvoiceRequestRow> for InvoiceRequest {
    type Error = Error;

    fn try_from(row: InvoiceRequestRow) -> Result<Self> {
        let month = u32::try_from(row.month).map_err(|_| Error::database(format!("invalid month {}", row.month)))?;
        Ok(Self {
            id: InvoiceRequestId::from_uuid(row.id),
            provider_id: ProfileId::new(row.provider_id),
            provider_name: row.provider_name,
            period: BillingPeriod::new(month, row.year)?,
            requested_at: row.requested_at,
            status: row.status.parse()?,
        })
    }
}

pub(crate) const PAYMENT_COLUMNS: &str = "id, provider_id, provider_name, booking_ids, amount_cents, payment_date, \
     invoice_request_id, status, invoice_id, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct PaymentRow {
    id: Uuid,
    provider_id: String,
    provider_name: String,
    booking_ids: Vec<Uuid>,
    amount_cents: i64,
    payment_date: NaiveDate,
    invoice_request_id: Option<Uuid>,
    status: String,
    invoice_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Self {
            id: PaymentId::from_uuid(row.id),
            provider_id: ProfileId::new(row.provider_id),
            provider_name: row.provider_name,
            booking_ids: row.booking_ids.into_iter().map(BookingId::from_uuid).collect(),
            amount: money(row.amount_cents)?,
            payment_date: row.payment_date,
            invoice_request_id: row.invoice_request_id.map(InvoiceRequestId::from_uuid),
            status: row.status.parse()?,
            invoice_id: row.invoice_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct AttemptRow {
    payment_id: Uuid,
    recipient: String,
    status: String,
    diagnostic: Option<String>,
    attempted_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for DeliveryAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(Self {
            payment_id: PaymentId::from_uuid(row.payment_id),
            recipient: row.recipient,
            status: row.status.parse()?,
            diagnostic: row.diagnostic,
            attempted_at: row.attempted_at,
        })
    }
}

/// Convert a batch of rows, failing on the first bad one.
pub(crate) fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_conversions() {
        assert_eq!(cents(Money::from_dollars(120)).unwrap(), 12_000);
        assert_eq!(money(4_050).unwrap(), Money::from_cents(4_050));
        assert!(money(-1).is_err());
        assert!(cents(Money::from_cents(u64::MAX)).is_err());
    }

    #[test]
    fn test_room_conversions() {
        assert_eq!(count(3).unwrap(), 3);
        assert!(count(u32::MAX).is_err());
        assert!(rooms(-2).is_err());
    }

    #[test]
    fn test_profile_row_commission() {
        let row = ProfileRow {
            id: "p-qfs".to_string(),
            name: "QFS".to_string(),
            email: "qfs@providers.test".to_string(),
            phone: None,
            role: "provider".to_string(),
            commission_bps: Some(2_000),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile = Profile::try_from(row).unwrap();
        assert_eq!(profile.commission_or_zero().basis_points(), 2_000);
        assert!(profile.is_provider());
    }
}
