//! Value objects and identifiers shared by every dormclean crate.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identity of a profile as issued by the external identity provider.
///
/// The identity provider's opaque user id is trusted as the profile key, so this
/// is a string rather than a generated UUID.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Wrap an identity-provider id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last `n` alphanumeric characters of the id, upper-cased.
    ///
    /// Used as the provider-specific part of invoice numbers.
    #[must_use]
    pub fn suffix(&self, n: usize) -> String {
        let alnum: Vec<char> = self
            .0
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let start = alnum.len().saturating_sub(n);
        alnum[start..].iter().collect()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a building
    BuildingId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a complaint
    ComplaintId
);
uuid_id!(
    /// Unique identifier for a monthly invoice request
    InvoiceRequestId
);
uuid_id!(
    /// Unique identifier for a provider payment
    PaymentId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors.
///
/// Serialized as an integer number of cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole dollars, saturating on overflow
    #[must_use]
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount in dollars (rounded down)
    #[must_use]
    pub const fn dollars(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity, saturating at the maximum
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Share of this amount expressed in basis points, rounded half up.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bps <= 10_000 keeps the result <= self
    pub const fn basis_points(self, bps: u32) -> Self {
        let scaled = (self.0 as u128) * (bps as u128) + 5_000;
        Self((scaled / 10_000) as u64)
    }

    /// Parse a decimal amount such as `"150.00"`, `"$99.5"` or `"12"`.
    ///
    /// A third fractional digit rounds half up; further digits are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty, negative or non-numeric input.
    pub fn parse_decimal(input: &str) -> Result<Self> {
        let invalid = || Error::validation("amount", format!("'{input}' is not a valid amount"));

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole_cents = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| invalid())?
                .checked_mul(100)
                .ok_or_else(invalid)?
        };

        let digits: Vec<u64> = fraction.bytes().map(|b| u64::from(b - b'0')).collect();
        let mut fraction_cents = digits.first().copied().unwrap_or(0) * 10 + digits.get(1).copied().unwrap_or(0);
        if digits.get(2).copied().unwrap_or(0) >= 5 {
            fraction_cents += 1;
        }

        whole_cents
            .checked_add(fraction_cents)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Plain two-decimal rendering without currency symbol (`"150.00"`).
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.dollars(), self.0 % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.dollars(), self.0 % 100)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ============================================================================
// Commission
// ============================================================================

/// Platform commission retained from a provider's bookings.
///
/// Stored in basis points (1% = 100 bps) so payout arithmetic stays integral.
/// Serialized as a percentage number (`20`, `12.5`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// No commission.
    pub const ZERO: Self = Self(0);

    /// Upper bound: the platform keeps the whole price.
    pub const MAX_BASIS_POINTS: u32 = 10_000;

    /// Build from basis points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] above 10 000 bps.
    pub fn from_basis_points(bps: u32) -> Result<Self> {
        if bps > Self::MAX_BASIS_POINTS {
            return Err(Error::validation(
                "commission_percentage",
                "commission must be between 0 and 100",
            ));
        }
        Ok(Self(bps))
    }

    /// Build from a percentage in `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for values outside the range or non-finite input.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above
    pub fn from_percent(percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(Error::validation(
                "commission_percentage",
                "commission must be between 0 and 100",
            ));
        }
        Self::from_basis_points((percent * 100.0).round() as u32)
    }

    /// Basis points.
    #[must_use]
    pub const fn basis_points(&self) -> u32 {
        self.0
    }

    /// Percentage value.
    #[must_use]
    pub fn percent(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Commission retained on `price`.
    #[must_use]
    pub const fn commission_on(&self, price: Money) -> Money {
        price.basis_points(self.0)
    }

    /// What the provider earns on `price`: `price - price * commission`.
    #[must_use]
    pub const fn net_of(&self, price: Money) -> Money {
        price.saturating_sub(self.commission_on(price))
    }
}

impl TryFrom<f64> for CommissionRate {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::from_percent(value)
    }
}

impl From<CommissionRate> for f64 {
    fn from(rate: CommissionRate) -> Self {
        rate.percent()
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{:.2}%", self.percent())
        }
    }
}

// ============================================================================
// Billing period
// ============================================================================

/// Calendar month a provider invoice request covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// Month, 1..=12
    pub month: u32,
    /// Four-digit year
    pub year: i32,
}

impl BillingPeriod {
    /// Validate and build a billing period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the month is outside 1..=12 or the
    /// year is outside 2000..=9999.
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::validation("month", "month must be between 1 and 12"));
        }
        if !(2000..=9999).contains(&year) {
            return Err(Error::validation("year", "year must be a four-digit year"));
        }
        Ok(Self { month, year })
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(Money::parse_decimal("150.00").unwrap(), Money::from_cents(15_000));
        assert_eq!(Money::parse_decimal("$99.5").unwrap(), Money::from_cents(9_950));
        assert_eq!(Money::parse_decimal("12").unwrap(), Money::from_dollars(12));
        assert_eq!(Money::parse_decimal(".75").unwrap(), Money::from_cents(75));
        assert_eq!(Money::parse_decimal("1.005").unwrap(), Money::from_cents(101));
        assert_eq!(Money::parse_decimal("1.004").unwrap(), Money::from_cents(100));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        for input in ["", "  ", "-5", "abc", "1.2.3", ".", "$"] {
            assert!(Money::parse_decimal(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(12_345).to_string(), "$123.45");
        assert_eq!(Money::ZERO.to_decimal_string(), "0.00");
    }

    #[test]
    fn test_commission_scenario() {
        let rate = CommissionRate::from_percent(20.0).unwrap();
        assert_eq!(rate.net_of(Money::from_dollars(100)), Money::from_dollars(80));
        assert_eq!(rate.net_of(Money::from_dollars(50)), Money::from_dollars(40));
    }

    #[test]
    fn test_commission_rounds_half_up() {
        let rate = CommissionRate::from_percent(12.5).unwrap();
        // 12.5% of $0.99 = 12.375 cents -> 12 cents
        assert_eq!(rate.commission_on(Money::from_cents(99)), Money::from_cents(12));
        // 12.5% of $0.04 = 0.5 cents -> 1 cent
        assert_eq!(rate.commission_on(Money::from_cents(4)), Money::from_cents(1));
    }

    #[test]
    fn test_commission_bounds() {
        assert!(CommissionRate::from_percent(-0.1).is_err());
        assert!(CommissionRate::from_percent(100.1).is_err());
        assert!(CommissionRate::from_percent(f64::NAN).is_err());
        assert_eq!(CommissionRate::from_percent(100.0).unwrap().net_of(Money::from_dollars(7)), Money::ZERO);
    }

    #[test]
    fn test_commission_serde_as_percent() {
        let rate: CommissionRate = serde_json::from_str("12.5").unwrap();
        assert_eq!(rate.basis_points(), 1_250);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "12.5");
        assert!(serde_json::from_str::<CommissionRate>("150").is_err());
    }

    #[test]
    fn test_profile_id_suffix() {
        assert_eq!(ProfileId::new("user_2abc-def9").suffix(6), "BCDEF9");
        assert_eq!(ProfileId::new("x1").suffix(6), "X1");
    }

    #[test]
    fn test_billing_period_validation() {
        assert!(BillingPeriod::new(0, 2025).is_err());
        assert!(BillingPeriod::new(13, 2025).is_err());
        assert!(BillingPeriod::new(3, 99).is_err());
        assert_eq!(BillingPeriod::new(3, 2025).unwrap().to_string(), "2025-03");
    }

    proptest! {
        #[test]
        fn net_plus_commission_is_price(cents in 0u64..10_000_000, bps in 0u32..=10_000) {
            let rate = CommissionRate::from_basis_points(bps).unwrap();
            let price = Money::from_cents(cents);
            prop_assert_eq!(rate.net_of(price).saturating_add(rate.commission_on(price)), price);
        }

        #[test]
        fn decimal_string_round_trips(cents in 0u64..1_000_000_000) {
            let money = Money::from_cents(cents);
            prop_assert_eq!(Money::parse_decimal(&money.to_decimal_string()).unwrap(), money);
        }
    }
}
