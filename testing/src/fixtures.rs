//! Fixture builders for domain records.
//!
//! Everything is stamped with [`test_clock`](crate::test_clock) time so
//! fixtures compare equal across runs.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::test_clock;
use dormclean_core::environment::Clock;
use dormclean_core::{
    Apartment, Booking, BookingStatus, Building, BuildingId, CommissionRate, Money, NaiveDate, NewBooking, Profile,
    ProfileId, Role, RoomCounts, RoomType, ServicePrices,
};

/// Provider profile with a commission percentage.
#[must_use]
pub fn provider(id: &str, name: &str, commission_percent: f64) -> Profile {
    Profile::new(
        ProfileId::new(id),
        name,
        format!("{id}@providers.test"),
        None,
        Role::Provider,
        Some(CommissionRate::from_percent(commission_percent).unwrap()),
        test_clock().now(),
    )
    .unwrap()
}

/// Customer profile.
#[must_use]
pub fn customer(id: &str, name: &str) -> Profile {
    Profile::new(
        ProfileId::new(id),
        name,
        format!("{id}@students.test"),
        None,
        Role::User,
        None,
        test_clock().now(),
    )
    .unwrap()
}

/// Administrator profile.
#[must_use]
pub fn admin(id: &str) -> Profile {
    Profile::new(ProfileId::new(id), "Admin", format!("{id}@dormclean.test"), None, Role::Admin, None, test_clock().now())
        .unwrap()
}

/// Building with a `Studio` and a `2 Bedroom` layout.
///
/// Studio: 40 / 70 / 90. 2 Bedroom: 60 / 100 / 130 (standard / deep / move-out).
#[must_use]
pub fn building(name: &str, provider: Option<&Profile>) -> Building {
    let prices = |standard, deep, move_out| ServicePrices {
        standard: Money::from_dollars(standard),
        deep: Money::from_dollars(deep),
        move_out: Money::from_dollars(move_out),
    };
    Building {
        id: BuildingId::new(),
        name: name.to_string(),
        location: "Campus".to_string(),
        room_types: vec![
            RoomType {
                name: "Studio".to_string(),
                prices: prices(40, 70, 90),
            },
            RoomType {
                name: "2 Bedroom".to_string(),
                prices: prices(60, 100, 130),
            },
        ],
        assigned_provider_id: provider.map(|p| p.id.clone()),
        assigned_provider_name: provider.map(|p| p.name.clone()),
        created_at: test_clock().now(),
        updated_at: test_clock().now(),
    }
}

/// Builder for [`Booking`] fixtures.
///
/// # Example
///
/// ```
/// use dormclean_testing::fixtures::{BookingBuilder, provider};
/// use dormclean_core::{BookingStatus, Money};
///
/// let qfs = provider("p-qfs", "QFS", 20.0);
/// let booking = BookingBuilder::new()
///     .provider(&qfs)
///     .price(Money::from_dollars(100))
///     .completed()
///     .build();
/// assert_eq!(booking.status, BookingStatus::Completed);
/// assert!(!booking.provider_paid);
/// ```
#[derive(Debug, Clone)]
pub struct BookingBuilder {
    input: NewBooking,
    status: Option<BookingStatus>,
    paid: bool,
}

impl Default for BookingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingBuilder {
    /// A one-room standard clean at North Hall for $40, unassigned.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: NewBooking {
                customer_id: Some(ProfileId::new("cust-1")),
                customer_name: "Sam Student".to_string(),
                customer_email: Some("sam@students.test".to_string()),
                building_id: None,
                building: "North Hall".to_string(),
                apartment: Apartment {
                    floor: Some("3".to_string()),
                    apartment_type: Some("Studio".to_string()),
                    apartment_number: Some("3B".to_string()),
                },
                service: "Standard Clean".to_string(),
                room_counts: RoomCounts {
                    standard: 1,
                    ..RoomCounts::default()
                },
                scheduled_date: NaiveDate::from_ymd_opt(2025, 1, 15),
                scheduled_time: Some("10:00".to_string()),
                frequency: Some("once".to_string()),
                price: Money::from_dollars(40),
                provider: None,
                external_order_id: None,
            },
            status: None,
            paid: false,
        }
    }

    /// Booking customer.
    #[must_use]
    pub fn customer(mut self, customer: &Profile) -> Self {
        self.input.customer_id = Some(customer.id.clone());
        self.input.customer_name.clone_from(&customer.name);
        self.input.customer_email = Some(customer.email.clone());
        self
    }

    /// Assigned provider.
    #[must_use]
    pub fn provider(mut self, provider: &Profile) -> Self {
        self.input.provider = Some((provider.id.clone(), provider.name.clone()));
        self
    }

    /// Price snapshot.
    #[must_use]
    pub fn price(mut self, price: Money) -> Self {
        self.input.price = price;
        self
    }

    /// Service date.
    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.input.scheduled_date = Some(date);
        self
    }

    /// Service description.
    #[must_use]
    pub fn service(mut self, service: &str) -> Self {
        self.input.service = service.to_string();
        self
    }

    /// Building name.
    #[must_use]
    pub fn building(mut self, building: &Building) -> Self {
        self.input.building_id = Some(building.id);
        self.input.building.clone_from(&building.name);
        self
    }

    /// Upstream order id.
    #[must_use]
    pub fn external_order(mut self, order_id: &str) -> Self {
        self.input.external_order_id = Some(order_id.to_string());
        self
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Shorthand for `status(BookingStatus::Completed)`.
    #[must_use]
    pub fn completed(self) -> Self {
        self.status(BookingStatus::Completed)
    }

    /// Already paid out.
    #[must_use]
    pub fn paid(mut self) -> Self {
        self.paid = true;
        self
    }

    /// Build the booking.
    #[must_use]
    pub fn build(self) -> Booking {
        let mut booking = Booking::new(self.input, test_clock().now()).unwrap();
        if let Some(status) = self.status {
            booking.status = status;
        }
        booking.provider_paid = self.paid;
        booking
    }
}
