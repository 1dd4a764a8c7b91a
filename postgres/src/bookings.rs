use crate::PostgresStore;
use crate::rows::{BOOKING_COLUMNS, BookingRow, cents, convert, count, db, is_unique_violation};
use async_trait::async_trait;
use dormclean_core::providers::BookingStore;
use dormclean_core::{Booking, BookingId, Error, ProfileId, Result};

impl PostgresStore {
    async fn select_bookings(&self, filter: &str, bind: Option<&str>) -> Result<Vec<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings {filter} ORDER BY created_at DESC, id DESC");
        let mut query = sqlx::query_as::<_, BookingRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db("list bookings"))?;
        convert(rows)
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn get_booking(&self, id: &BookingId) -> Result<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get booking"))?
            .map(Booking::try_from)
            .transpose()
    }

    async fn find_by_external_order(&self, order_id: &str) -> Result<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE external_order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db("find booking by order"))?
        .map(Booking::try_from)
        .transpose()
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let result = sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, \
              $21, $22, $23, $24, $25, $26)"
        ))
        .bind(booking.id.as_uuid())
        .bind(booking.customer_id.as_ref().map(ProfileId::as_str))
        .bind(&booking.customer_name)
        .bind(&booking.customer_email)
        .bind(booking.building_id.map(|id| *id.as_uuid()))
        .bind(&booking.building)
        .bind(&booking.apartment.floor)
        .bind(&booking.apartment.apartment_type)
        .bind(&booking.apartment.apartment_number)
        .bind(&booking.service)
        .bind(count(booking.room_counts.standard)?)
        .bind(count(booking.room_counts.deep)?)
        .bind(count(booking.room_counts.move_out)?)
        .bind(booking.scheduled_date)
        .bind(&booking.scheduled_time)
        .bind(&booking.frequency)
        .bind(cents(booking.price)?)
        .bind(booking.status.as_str())
        .bind(booking.provider_id.as_ref().map(ProfileId::as_str))
        .bind(&booking.provider_name)
        .bind(&booking.before_images)
        .bind(&booking.after_images)
        .bind(booking.provider_paid)
        .bind(&booking.external_order_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::conflict(format!(
                "order {} was already ingested",
                booking.external_order_id.as_deref().unwrap_or_default()
            ))),
            Err(e) => Err(db("insert booking")(e)),
        }
    }

    async fn update_booking(&self, booking: &Booking) -> Result<()> {
        // provider_paid is written only by the payment paths
        let result = sqlx::query(
            r"
            UPDATE bookings
            SET customer_name = $2,
                customer_email = $3,
                building_id = $4,
                building = $5,
                floor = $6,
                apartment_type = $7,
                apartment_number = $8,
                service = $9,
                scheduled_date = $10,
                scheduled_time = $11,
                frequency = $12,
                status = $13,
                provider_id = $14,
                provider_name = $15,
                before_images = $16,
                after_images = $17,
                updated_at = $18
            WHERE id = $1
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(&booking.customer_name)
        .bind(&booking.customer_email)
        .bind(booking.building_id.map(|id| *id.as_uuid()))
        .bind(&booking.building)
        .bind(&booking.apartment.floor)
        .bind(&booking.apartment.apartment_type)
        .bind(&booking.apartment.apartment_number)
        .bind(&booking.service)
        .bind(booking.scheduled_date)
        .bind(&booking.scheduled_time)
        .bind(&booking.frequency)
        .bind(booking.status.as_str())
        .bind(booking.provider_id.as_ref().map(ProfileId::as_str))
        .bind(&booking.provider_name)
        .bind(&booking.before_images)
        .bind(&booking.after_images)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db("update booking"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Booking", booking.id));
        }
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        self.select_bookings("", None).await
    }

    async fn list_bookings_for_customer(&self, customer: &ProfileId) -> Result<Vec<Booking>> {
        self.select_bookings("WHERE customer_id = $1", Some(customer.as_str()))
            .await
    }

    async fn list_bookings_for_provider(&self, provider: &ProfileId) -> Result<Vec<Booking>> {
        self.select_bookings("WHERE provider_id = $1", Some(provider.as_str()))
            .await
    }
}
