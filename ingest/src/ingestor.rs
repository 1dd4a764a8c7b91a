//! Turns order deliveries into bookings.

use crate::error::IngestError;
use crate::payload::{Delivery, OrderPayload, parse_delivery};
use crate::signature::SignatureVerifier;
use dormclean_core::environment::Clock;
use dormclean_core::providers::{BookingStore, BuildingStore};
use dormclean_core::{Booking, BookingId, Error, NewBooking, Result};
use serde::Serialize;
use std::sync::Arc;

/// Building name used when the order names none.
pub const UNSPECIFIED_BUILDING: &str = "Unspecified";

/// What happened to a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Test ping, nothing stored.
    Ping {
        /// Upstream webhook id
        webhook_id: String,
    },
    /// A new booking was stored.
    Created {
        /// Upstream order id
        order_id: String,
        /// Stored booking
        booking_id: BookingId,
    },
    /// The order was ingested before; the existing booking is kept.
    Duplicate {
        /// Upstream order id
        order_id: String,
        /// Booking created by the first delivery
        booking_id: BookingId,
    },
}

/// Order ingestion adapter.
///
/// Deliveries are deduplicated by upstream order id so shop retries never
/// create a second booking.
#[derive(Clone)]
pub struct OrderIngestor {
    bookings: Arc<dyn BookingStore>,
    buildings: Arc<dyn BuildingStore>,
    clock: Arc<dyn Clock>,
    verifier: Option<SignatureVerifier>,
}

impl OrderIngestor {
    /// Ingestor that accepts unsigned deliveries.
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingStore>, buildings: Arc<dyn BuildingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            bookings,
            buildings,
            clock,
            verifier: None,
        }
    }

    /// Require deliveries signed with `verifier`'s secret.
    #[must_use]
    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Check the signature header, when a secret is configured.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MissingSignature`] or [`IngestError::SignatureMismatch`].
    pub fn authenticate(&self, body: &[u8], signature: Option<&str>) -> std::result::Result<(), IngestError> {
        match &self.verifier {
            Some(verifier) => verifier.verify(body, signature),
            None => Ok(()),
        }
    }

    /// Parse a delivery and store its booking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed bodies, before any side
    /// effect, or the store's error when loading buildings or inserting fails.
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestOutcome> {
        let order = match parse_delivery(body) {
            Ok(Delivery::Order(order)) => order,
            Ok(Delivery::Ping { webhook_id }) => {
                tracing::info!(webhook_id = %webhook_id, "Webhook ping acknowledged");
                return Ok(IngestOutcome::Ping { webhook_id });
            },
            Err(err) => {
                tracing::warn!(error = %err, "Rejected order delivery");
                return Err(err.into());
            },
        };

        if let Some(existing) = self.bookings.find_by_external_order(&order.order_id).await? {
            return Ok(duplicate(order.order_id, &existing));
        }

        let booking = Booking::new(self.to_new_booking(&order).await?, self.clock.now())?;
        match self.bookings.insert_booking(&booking).await {
            Ok(()) => {},
            Err(Error::Conflict(_)) => {
                // Lost a race with a concurrent redelivery.
                let existing = self
                    .bookings
                    .find_by_external_order(&order.order_id)
                    .await?
                    .ok_or_else(|| Error::not_found("booking", &order.order_id))?;
                return Ok(duplicate(order.order_id, &existing));
            },
            Err(err) => return Err(err),
        }

        tracing::info!(
            order_id = %order.order_id,
            booking_id = %booking.id,
            building = %booking.building,
            price = booking.price.cents(),
            rooms = booking.room_counts.total(),
            "Booking ingested"
        );

        Ok(IngestOutcome::Created {
            order_id: order.order_id,
            booking_id: booking.id,
        })
    }

    async fn to_new_booking(&self, order: &OrderPayload) -> Result<NewBooking> {
        let (building_id, building) = match order.building.as_deref() {
            Some(name) => {
                let known = self
                    .buildings
                    .list_buildings()
                    .await?
                    .into_iter()
                    .find(|b| b.name.trim().eq_ignore_ascii_case(name));
                match known {
                    Some(b) => (Some(b.id), b.name),
                    None => (None, name.to_string()),
                }
            },
            None => (None, UNSPECIFIED_BUILDING.to_string()),
        };

        Ok(NewBooking {
            customer_id: order.customer_id.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            building_id,
            building,
            apartment: order.apartment.clone(),
            service: order.service.clone(),
            room_counts: order.room_counts,
            scheduled_date: order.service_date(),
            scheduled_time: order.scheduled_time.clone(),
            frequency: order.frequency.clone(),
            price: order.total,
            provider: None,
            external_order_id: Some(order.order_id.clone()),
        })
    }
}

fn duplicate(order_id: String, existing: &Booking) -> IngestOutcome {
    tracing::info!(order_id = %order_id, booking_id = %existing.id, "Order redelivered, keeping existing booking");
    IngestOutcome::Duplicate {
        order_id,
        booking_id: existing.id,
    }
}

impl std::fmt::Debug for OrderIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIngestor")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use dormclean_core::BookingStatus;
    use dormclean_testing::Harness;
    use dormclean_testing::fixtures::{building, provider};
    use serde_json::json;

    fn ingestor(harness: &Harness) -> OrderIngestor {
        OrderIngestor::new(harness.store.clone(), harness.store.clone(), harness.clock.clone())
    }

    fn sample_order() -> Vec<u8> {
        json!({
            "id": 5150,
            "date_created": "2025-03-01T08:00:00",
            "total": "160.00",
            "billing": {"first_name": "Sam", "last_name": "Student", "email": "sam@students.test"},
            "meta_data": [{"key": "_university", "value": "north hall"}],
            "line_items": [
                {"name": "Standard Clean", "quantity": 2, "meta_data": [
                    {"key": "Booking Date", "value": "2025-03-15"},
                    {"key": "Apartment Number", "value": "3B"}
                ]},
                {"name": "Deep Clean x Move-out", "quantity": 1}
            ]
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_ingest_creates_unassigned_booking() {
        let harness = Harness::new();
        let north = building("North Hall", Some(&provider("p-qfs", "QFS", 20.0)));
        harness.store.insert_building(&north).await.unwrap();

        let outcome = ingestor(&harness).ingest(&sample_order()).await.unwrap();
        let IngestOutcome::Created { booking_id, order_id } = outcome else {
            panic!("expected a new booking, got {outcome:?}");
        };
        assert_eq!(order_id, "5150");

        let booking = harness.store.get_booking(&booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::NewRequest);
        assert_eq!(booking.provider_display(), "Unassigned");
        assert_eq!(booking.building, "North Hall");
        assert_eq!(booking.building_id, Some(north.id));
        assert_eq!(booking.room_counts.standard, 2);
        assert_eq!(booking.room_counts.deep, 1);
        assert_eq!(booking.room_counts.move_out, 0);
        assert_eq!(booking.price.cents(), 16_000);
        assert_eq!(booking.scheduled_date, chrono::NaiveDate::from_ymd_opt(2025, 3, 15));
        assert_eq!(booking.apartment.apartment_number.as_deref(), Some("3B"));
        assert_eq!(booking.external_order_id.as_deref(), Some("5150"));
    }

    #[tokio::test]
    async fn test_redelivery_is_acknowledged_once() {
        let harness = Harness::new();
        let ingestor = ingestor(&harness);

        let first = ingestor.ingest(&sample_order()).await.unwrap();
        let second = ingestor.ingest(&sample_order()).await.unwrap();

        let IngestOutcome::Created { booking_id, .. } = first else {
            panic!("expected a new booking");
        };
        assert_eq!(
            second,
            IngestOutcome::Duplicate {
                order_id: "5150".to_string(),
                booking_id
            }
        );
        assert_eq!(harness.store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_building_kept_by_name() {
        let harness = Harness::new();
        let outcome = ingestor(&harness).ingest(&sample_order()).await.unwrap();
        let IngestOutcome::Created { booking_id, .. } = outcome else {
            panic!("expected a new booking");
        };
        let booking = harness.store.get_booking(&booking_id).await.unwrap().unwrap();
        assert_eq!(booking.building, "north hall");
        assert_eq!(booking.building_id, None);
    }

    #[tokio::test]
    async fn test_missing_building_is_unspecified() {
        let harness = Harness::new();
        let outcome = ingestor(&harness).ingest(br#"{"id": 1, "total": "40"}"#).await.unwrap();
        let IngestOutcome::Created { booking_id, .. } = outcome else {
            panic!("expected a new booking");
        };
        let booking = harness.store.get_booking(&booking_id).await.unwrap().unwrap();
        assert_eq!(booking.building, UNSPECIFIED_BUILDING);
        assert_eq!(booking.customer_name, "Guest");
    }

    #[tokio::test]
    async fn test_ping_and_malformed_store_nothing() {
        let harness = Harness::new();
        let ingestor = ingestor(&harness);

        assert_eq!(
            ingestor.ingest(b"webhook_id=3").await.unwrap(),
            IngestOutcome::Ping {
                webhook_id: "3".to_string()
            }
        );
        let err = ingestor.ingest(b"<xml/>").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let err = ingestor.ingest(br#"{"status": "processing"}"#).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "id"));
        assert_eq!(harness.store.booking_count(), 0);
    }

    #[test]
    fn test_authenticate() {
        let harness = Harness::new();
        let open = ingestor(&harness);
        assert!(open.authenticate(b"{}", None).is_ok());

        let verifier = SignatureVerifier::new("secret");
        let signature = verifier.sign(b"{}");
        let guarded = ingestor(&harness).with_verifier(verifier);
        assert!(guarded.authenticate(b"{}", Some(&signature)).is_ok());
        assert_eq!(guarded.authenticate(b"{}", None), Err(IngestError::MissingSignature));
        assert_eq!(
            guarded.authenticate(b"{ }", Some(&signature)),
            Err(IngestError::SignatureMismatch)
        );
    }

    #[test]
    fn test_outcome_json() {
        let value = serde_json::to_value(IngestOutcome::Ping {
            webhook_id: "3".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"result": "ping", "webhook_id": "3"}));
    }
}
