//! Cleaning bookings and their forward-only status lifecycle.

use crate::building::ServiceType;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::types::{BookingId, BuildingId, Money, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a booking is in its lifecycle.
///
/// Transitions only move forward: `New Request → Aligned → In Process → Completed`.
/// Skipping ahead is allowed; moving backward is not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created without a provider (webhook orders)
    #[serde(rename = "New Request")]
    NewRequest,
    /// A provider is assigned and the job is scheduled
    #[serde(rename = "Aligned")]
    Aligned,
    /// The provider has started the job
    #[serde(rename = "In Process")]
    InProcess,
    /// The job is done and billable
    #[serde(rename = "Completed")]
    Completed,
}

impl BookingStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::NewRequest => 0,
            Self::Aligned => 1,
            Self::InProcess => 2,
            Self::Completed => 3,
        }
    }

    /// Storage and display representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewRequest => "New Request",
            Self::Aligned => "Aligned",
            Self::InProcess => "In Process",
            Self::Completed => "Completed",
        }
    }

    /// Validate a transition to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `next` is behind the current status.
    pub fn transition(self, next: Self) -> Result<Self> {
        if next.rank() < self.rank() {
            return Err(Error::validation(
                "status",
                format!("cannot move a booking from '{self}' back to '{next}'"),
            ));
        }
        Ok(next)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "New Request" => Ok(Self::NewRequest),
            "Aligned" => Ok(Self::Aligned),
            "In Process" => Ok(Self::InProcess),
            "Completed" => Ok(Self::Completed),
            other => Err(Error::validation("status", format!("unknown booking status '{other}'"))),
        }
    }
}

/// Number of rooms booked per service category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCounts {
    /// Rooms for a standard clean
    pub standard: u32,
    /// Rooms for a deep clean
    pub deep: u32,
    /// Rooms for a move-out clean
    pub move_out: u32,
}

impl RoomCounts {
    /// Count for one category.
    #[must_use]
    pub const fn get(&self, service: ServiceType) -> u32 {
        match service {
            ServiceType::Standard => self.standard,
            ServiceType::Deep => self.deep,
            ServiceType::MoveOut => self.move_out,
        }
    }

    /// Add `quantity` rooms to a category.
    pub fn add(&mut self, service: ServiceType, quantity: u32) {
        let slot = match service {
            ServiceType::Standard => &mut self.standard,
            ServiceType::Deep => &mut self.deep,
            ServiceType::MoveOut => &mut self.move_out,
        };
        *slot = slot.saturating_add(quantity);
    }

    /// Rooms across all categories.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.standard
            .saturating_add(self.deep)
            .saturating_add(self.move_out)
    }
}

/// Apartment details captured at booking time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    /// Floor
    pub floor: Option<String>,
    /// Layout name
    pub apartment_type: Option<String>,
    /// Unit number
    pub apartment_number: Option<String>,
}

/// Input for creating a booking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    /// Booking customer, when known
    pub customer_id: Option<ProfileId>,
    /// Customer display name
    pub customer_name: String,
    /// Customer email
    pub customer_email: Option<String>,
    /// Building id, when the building is known to the platform
    pub building_id: Option<BuildingId>,
    /// Building name snapshot
    pub building: String,
    /// Apartment details
    pub apartment: Apartment,
    /// Service description
    pub service: String,
    /// Rooms per category
    pub room_counts: RoomCounts,
    /// Scheduled day
    pub scheduled_date: Option<NaiveDate>,
    /// Scheduled time slot as entered
    pub scheduled_time: Option<String>,
    /// Recurrence as entered (`"once"`, `"weekly"`, ...)
    pub frequency: Option<String>,
    /// Frozen price snapshot
    pub price: Money,
    /// Provider, when already known
    pub provider: Option<(ProfileId, String)>,
    /// Upstream order id for webhook-ingested bookings
    pub external_order_id: Option<String>,
}

/// A single scheduled cleaning job with a frozen price snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Booking customer, when known
    pub customer_id: Option<ProfileId>,
    /// Customer display name
    pub customer_name: String,
    /// Customer email
    pub customer_email: Option<String>,
    /// Building id, when known
    pub building_id: Option<BuildingId>,
    /// Building name snapshot
    pub building: String,
    /// Apartment details
    pub apartment: Apartment,
    /// Service description
    pub service: String,
    /// Rooms per category
    pub room_counts: RoomCounts,
    /// Scheduled day
    pub scheduled_date: Option<NaiveDate>,
    /// Scheduled time slot
    pub scheduled_time: Option<String>,
    /// Recurrence
    pub frequency: Option<String>,
    /// Frozen at creation, never recomputed
    pub price: Money,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Provider join key
    pub provider_id: Option<ProfileId>,
    /// Provider display name snapshot
    pub provider_name: Option<String>,
    /// Photos taken before the job
    pub before_images: Vec<String>,
    /// Photos taken after the job
    pub after_images: Vec<String>,
    /// Set once, when the provider has been paid for this booking
    pub provider_paid: bool,
    /// Upstream order id for webhook-ingested bookings
    pub external_order_id: Option<String>,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a booking from validated input.
    ///
    /// The status starts at `Aligned` when a provider is already known and at
    /// `New Request` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank customer name or building.
    pub fn new(input: NewBooking, now: DateTime<Utc>) -> Result<Self> {
        if input.customer_name.trim().is_empty() {
            return Err(Error::validation("customer_name", "customer name is required"));
        }
        if input.building.trim().is_empty() {
            return Err(Error::validation("building", "building is required"));
        }

        let (status, provider_id, provider_name) = match input.provider {
            Some((id, name)) => (BookingStatus::Aligned, Some(id), Some(name)),
            None => (BookingStatus::NewRequest, None, None),
        };

        Ok(Self {
            id: BookingId::new(),
            customer_id: input.customer_id,
            customer_name: input.customer_name.trim().to_string(),
            customer_email: input.customer_email,
            building_id: input.building_id,
            building: input.building.trim().to_string(),
            apartment: input.apartment,
            service: input.service,
            room_counts: input.room_counts,
            scheduled_date: input.scheduled_date,
            scheduled_time: input.scheduled_time,
            frequency: input.frequency,
            price: input.price,
            status,
            provider_id,
            provider_name,
            before_images: Vec::new(),
            after_images: Vec::new(),
            provider_paid: false,
            external_order_id: input.external_order_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Provider name for display, `"Unassigned"` when none.
    #[must_use]
    pub fn provider_display(&self) -> &str {
        self.provider_name.as_deref().unwrap_or("Unassigned")
    }

    /// Whether `profile` is the assigned provider.
    #[must_use]
    pub fn is_assigned_to(&self, profile: &ProfileId) -> bool {
        self.provider_id.as_ref() == Some(profile)
    }

    /// Completed, not yet paid out.
    #[must_use]
    pub fn is_payable(&self) -> bool {
        self.status == BookingStatus::Completed && !self.provider_paid
    }

    /// Assign (or reassign) a provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `provider` is not a provider profile,
    /// or [`Error::Conflict`] when the booking was already paid out.
    pub fn assign_provider(&mut self, provider: &Profile, now: DateTime<Utc>) -> Result<()> {
        if !provider.is_provider() {
            return Err(Error::validation("provider_id", format!("{} is not a provider", provider.id)));
        }
        if self.provider_paid {
            return Err(Error::conflict(format!("booking {} was already paid out", self.id)));
        }
        self.provider_id = Some(provider.id.clone());
        self.provider_name = Some(provider.name.clone());
        if self.status == BookingStatus::NewRequest {
            self.status = BookingStatus::Aligned;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Record provider progress: an optional forward status move plus new photos.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a backward status move or a non-HTTP(S)
    /// image URL.
    pub fn record_progress(
        &mut self,
        status: Option<BookingStatus>,
        before_images: Vec<String>,
        after_images: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for url in before_images.iter().chain(after_images.iter()) {
            validate_image_url(url)?;
        }
        if let Some(next) = status {
            self.status = self.status.transition(next)?;
        }
        self.before_images.extend(before_images);
        self.after_images.extend(after_images);
        self.updated_at = now;
        Ok(())
    }
}

fn validate_image_url(url: &str) -> Result<()> {
    let ok = (url.starts_with("https://") || url.starts_with("http://"))
        && url.len() > "https://".len()
        && !url.chars().any(char::is_whitespace);
    if ok {
        Ok(())
    } else {
        Err(Error::validation("images", format!("'{url}' is not an image URL")))
    }
}
