//! Parsing of WooCommerce-style order deliveries.
//!
//! Orders arrive as loosely-typed JSON. Booking details live in `meta_data`
//! entries attached to the order or to individual line items, under keys that
//! vary between shop configurations (`_booking_date`, `Booking Date`,
//! `booking-date`). Lookup follows one rule for every field: order-level
//! metadata first, then each line item in payload order, first non-empty value
//! wins.

use crate::error::IngestError;
use chrono::NaiveDate;
use dormclean_core::{Apartment, Money, ProfileId, RoomCounts, ServiceType};
use serde_json::{Map, Value};

/// What a webhook delivery turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The shop's "test ping" sent when a webhook is saved.
    Ping {
        /// Upstream webhook id
        webhook_id: String,
    },
    /// A real order.
    Order(OrderPayload),
}

/// The fields of an order that a booking is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPayload {
    /// Upstream order id, used as the dedupe key
    pub order_id: String,
    /// Date part of `date_created`
    pub created_on: Option<NaiveDate>,
    /// Order total
    pub total: Money,
    /// Identity id of the customer, when the shop forwards one
    pub customer_id: Option<ProfileId>,
    /// Billing first and last name, `"Guest"` when absent
    pub customer_name: String,
    /// Billing e-mail
    pub customer_email: Option<String>,
    /// University or building name
    pub building: Option<String>,
    /// Floor, layout and unit
    pub apartment: Apartment,
    /// Requested service date
    pub scheduled_date: Option<NaiveDate>,
    /// Requested time slot, as entered
    pub scheduled_time: Option<String>,
    /// Cleaning frequency, as entered
    pub frequency: Option<String>,
    /// Line item names joined with `", "`
    pub service: String,
    /// Rooms per service category
    pub room_counts: RoomCounts,
}

impl OrderPayload {
    /// Service date: metadata first, then the order's creation date.
    #[must_use]
    pub fn service_date(&self) -> Option<NaiveDate> {
        self.scheduled_date.or(self.created_on)
    }
}

/// Parse a raw webhook body.
///
/// # Errors
///
/// - [`IngestError::Malformed`] when the body is neither JSON nor a ping form
/// - [`IngestError::MissingOrderId`] when a JSON object has no usable `id`
/// - [`IngestError::InvalidField`] when `total` is not a decimal amount
pub fn parse_delivery(body: &[u8]) -> Result<Delivery, IngestError> {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(json_err) => {
            return form_ping(body).ok_or_else(|| IngestError::Malformed(json_err.to_string()));
        },
    };

    let Value::Object(order) = value else {
        return Err(IngestError::Malformed("expected a JSON object".to_string()));
    };

    let order_id = order.get("id").and_then(scalar_text);
    if order_id.is_none() {
        if let Some(webhook_id) = order.get("webhook_id").and_then(scalar_text) {
            return Ok(Delivery::Ping { webhook_id });
        }
    }
    let order_id = order_id.ok_or(IngestError::MissingOrderId)?;

    parse_order(order_id, &order).map(Delivery::Order)
}

fn form_ping(body: &[u8]) -> Option<Delivery> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    pairs
        .into_iter()
        .find(|(key, _)| key == "webhook_id")
        .map(|(_, webhook_id)| Delivery::Ping { webhook_id })
}

fn parse_order(order_id: String, order: &Map<String, Value>) -> Result<OrderPayload, IngestError> {
    let line_items: &[Value] = order
        .get("line_items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let metadata = Metadata::new(order, line_items);

    let total = match order.get("total").and_then(scalar_text) {
        Some(text) => Money::parse_decimal(&text).map_err(|_| IngestError::InvalidField {
            field: "total",
            message: format!("'{text}' is not a decimal amount"),
        })?,
        None => Money::ZERO,
    };

    let billing = order.get("billing").and_then(Value::as_object);
    let billing_field = |key: &str| billing.and_then(|b| b.get(key)).and_then(scalar_text);
    let customer_name = [billing_field("first_name"), billing_field("last_name")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    let names: Vec<&str> = line_items
        .iter()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    Ok(OrderPayload {
        order_id,
        created_on: order
            .get("date_created")
            .and_then(Value::as_str)
            .and_then(parse_date),
        total,
        customer_id: metadata.lookup(MetaField::CustomerId).map(ProfileId::new),
        customer_name: if customer_name.is_empty() {
            "Guest".to_string()
        } else {
            customer_name
        },
        customer_email: billing_field("email"),
        building: metadata.lookup(MetaField::Building),
        apartment: Apartment {
            floor: metadata.lookup(MetaField::Floor),
            apartment_type: metadata.lookup(MetaField::ApartmentType),
            apartment_number: metadata.lookup(MetaField::ApartmentNumber),
        },
        scheduled_date: metadata
            .lookup(MetaField::BookingDate)
            .as_deref()
            .and_then(parse_date),
        scheduled_time: metadata.lookup(MetaField::BookingTime),
        frequency: metadata.lookup(MetaField::Frequency),
        service: names.join(", "),
        room_counts: room_counts(line_items),
    })
}

/// Count rooms per category from line item names and quantities.
///
/// Each line item feeds at most one counter, picked by priority
/// standard, then deep, then move-out.
#[must_use]
pub fn room_counts(line_items: &[Value]) -> RoomCounts {
    let mut counts = RoomCounts::default();
    for item in line_items {
        let Some(service) = item.get("name").and_then(Value::as_str).and_then(classify) else {
            continue;
        };
        counts.add(service, quantity(item.get("quantity")));
    }
    counts
}

/// Service category a line item name refers to.
#[must_use]
pub fn classify(name: &str) -> Option<ServiceType> {
    let lower = name.to_lowercase();
    if lower.contains("standard") {
        Some(ServiceType::Standard)
    } else if lower.contains("deep") {
        Some(ServiceType::Deep)
    } else if ["move-out", "moveout", "move out"].iter().any(|token| lower.contains(token)) {
        Some(ServiceType::MoveOut)
    } else {
        None
    }
}

fn quantity(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.map_or(1, |q| u32::try_from(q).unwrap_or(u32::MAX))
}

/// Normalize a metadata key for comparison.
///
/// Case-insensitive, `_`/`-`/space equivalent, a leading `_` ignored.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let key = key.strip_prefix('_').unwrap_or(key);
    key.to_lowercase()
        .split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Building,
    Floor,
    ApartmentType,
    ApartmentNumber,
    BookingDate,
    BookingTime,
    Frequency,
    CustomerId,
}

impl MetaField {
    const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Building => &["university", "building", "building name", "residence", "dorm"],
            Self::Floor => &["floor", "floor number"],
            Self::ApartmentType => &["apartment type", "room type", "unit type"],
            Self::ApartmentNumber => &["apartment number", "apartment no", "unit number", "room number"],
            Self::BookingDate => &["booking date", "cleaning date", "service date", "date"],
            Self::BookingTime => &["booking time", "cleaning time", "service time", "time slot", "time"],
            Self::Frequency => &["frequency", "cleaning frequency"],
            Self::CustomerId => &["user id", "customer user id", "profile id"],
        }
    }
}

struct Metadata<'a> {
    sources: Vec<&'a [Value]>,
}

impl<'a> Metadata<'a> {
    fn new(order: &'a Map<String, Value>, line_items: &'a [Value]) -> Self {
        let entries = |value: Option<&'a Value>| value.and_then(Value::as_array).map(Vec::as_slice);
        let sources = std::iter::once(entries(order.get("meta_data")))
            .chain(line_items.iter().map(|item| entries(item.get("meta_data"))))
            .flatten()
            .collect();
        Self { sources }
    }

    fn lookup(&self, field: MetaField) -> Option<String> {
        let aliases = field.aliases();
        self.sources.iter().flat_map(|entries| entries.iter()).find_map(|entry| {
            let key = entry
                .get("key")
                .or_else(|| entry.get("display_key"))
                .and_then(Value::as_str)?;
            if !aliases.contains(&normalize_key(key).as_str()) {
                return None;
            }
            entry.get("value").and_then(scalar_text)
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        },
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%Y/%m/%d"];

/// Parse a shop-entered date, accepting an ISO timestamp's date part.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let date_part = text.split_once('T').map_or(text, |(date, _)| date);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}
