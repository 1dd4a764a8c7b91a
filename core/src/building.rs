//! Residence buildings and their service price lists.

use crate::booking::RoomCounts;
use crate::error::{Error, Result};
use crate::types::{BuildingId, Money, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cleaning service categories a room can be booked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Routine clean
    Standard,
    /// Deep clean
    Deep,
    /// End-of-tenancy clean
    MoveOut,
}

impl ServiceType {
    /// All categories in display order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Deep, Self::MoveOut];

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Standard => "Standard Clean",
            Self::Deep => "Deep Clean",
            Self::MoveOut => "Move-out Clean",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-room price for each service category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrices {
    /// Standard clean price per room
    pub standard: Money,
    /// Deep clean price per room
    pub deep: Money,
    /// Move-out clean price per room
    pub move_out: Money,
}

impl ServicePrices {
    /// Price for one room of `service`.
    #[must_use]
    pub const fn price_for(&self, service: ServiceType) -> Money {
        match service {
            ServiceType::Standard => self.standard,
            ServiceType::Deep => self.deep,
            ServiceType::MoveOut => self.move_out,
        }
    }
}

/// An apartment layout offered in a building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    /// Layout name, e.g. `"Studio"` or `"4 Bedroom"`
    pub name: String,
    /// Prices per service
    pub prices: ServicePrices,
}

/// A residence building served by one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Building id
    pub id: BuildingId,
    /// Display name (unique in practice, not enforced)
    pub name: String,
    /// Address or campus location
    pub location: String,
    /// Offered layouts
    pub room_types: Vec<RoomType>,
    /// Provider profile that serves this building
    pub assigned_provider_id: Option<ProfileId>,
    /// Provider display name at assignment time
    pub assigned_provider_name: Option<String>,
    /// When the building was created
    pub created_at: DateTime<Utc>,
    /// Last edit
    pub updated_at: DateTime<Utc>,
}

impl Building {
    /// Validate the editable fields of a building.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank name or location, no room types,
    /// or duplicate room-type names.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "building name is required"));
        }
        if self.location.trim().is_empty() {
            return Err(Error::validation("location", "location is required"));
        }
        if self.room_types.is_empty() {
            return Err(Error::validation("room_types", "at least one room type is required"));
        }
        let mut seen = std::collections::HashSet::new();
        for room_type in &self.room_types {
            let key = room_type.name.trim().to_lowercase();
            if key.is_empty() {
                return Err(Error::validation("room_types", "room type name is required"));
            }
            if !seen.insert(key) {
                return Err(Error::validation(
                    "room_types",
                    format!("duplicate room type '{}'", room_type.name),
                ));
            }
        }
        Ok(())
    }

    /// Find a room type by case-insensitive name.
    #[must_use]
    pub fn room_type(&self, name: &str) -> Option<&RoomType> {
        let wanted = name.trim().to_lowercase();
        self.room_types
            .iter()
            .find(|rt| rt.name.trim().to_lowercase() == wanted)
    }

    /// Price a checkout: sum of room count times per-room price for each service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown room type or zero rooms.
    pub fn quote(&self, room_type: &str, counts: &RoomCounts) -> Result<Money> {
        let room_type = self.room_type(room_type).ok_or_else(|| {
            Error::validation("apartment_type", format!("'{room_type}' is not offered in {}", self.name))
        })?;
        if counts.total() == 0 {
            return Err(Error::validation("room_counts", "select at least one room"));
        }

        Ok(ServiceType::ALL
            .iter()
            .map(|service| room_type.prices.price_for(*service).saturating_mul(counts.get(*service)))
            .sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn building() -> Building {
        Building {
            id: BuildingId::new(),
            name: "North Hall".to_string(),
            location: "Campus North".to_string(),
            room_types: vec![RoomType {
                name: "Studio".to_string(),
                prices: ServicePrices {
                    standard: Money::from_dollars(40),
                    deep: Money::from_dollars(70),
                    move_out: Money::from_dollars(90),
                },
            }],
            assigned_provider_id: None,
            assigned_provider_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_sums_services() {
        let counts = RoomCounts {
            standard: 2,
            deep: 1,
            move_out: 0,
        };
        assert_eq!(building().quote("studio", &counts).unwrap(), Money::from_dollars(150));
    }

    #[test]
    fn test_quote_rejects_unknown_room_type_and_empty_counts() {
        assert!(building().quote("Penthouse", &RoomCounts { standard: 1, ..RoomCounts::default() }).is_err());
        assert!(building().quote("Studio", &RoomCounts::default()).is_err());
    }

    #[test]
    fn test_validate_duplicate_room_types() {
        let mut b = building();
        b.room_types.push(b.room_types[0].clone());
        assert!(matches!(b.validate(), Err(Error::Validation { .. })));
    }
}
