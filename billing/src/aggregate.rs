//! Billing Aggregator.
//!
//! Pure reduction from the profile and booking sets to one [`ProviderBilling`]
//! per provider. Bookings join to providers by `provider_id`; the display name
//! on the booking is never consulted, so a provider rename cannot desynchronize
//! billing.
//!
//! The output is a deterministic function of the inputs: providers keep the
//! order they were given in and line items are sorted by date, creation time
//! and id.

use dormclean_core::{Booking, BookingId, BookingStatus, CommissionRate, Money, NaiveDate, Profile, ProfileId};
use serde::Serialize;
use std::collections::HashMap;

/// One unpaid completed booking as it appears on an invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BillableBooking {
    /// Booking id
    pub booking_id: BookingId,
    /// Service date (scheduled date, else creation date)
    pub date: NaiveDate,
    /// Service description
    pub service: String,
    /// Customer name
    pub client: String,
    /// Frozen booking price
    pub price: Money,
    /// Provider earning after commission
    pub net: Money,
}

/// Billing state of one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderBilling {
    /// Provider id
    pub provider_id: ProfileId,
    /// Current provider name
    pub provider_name: String,
    /// Invoice recipient
    pub provider_email: String,
    /// Commission applied (zero when unset)
    pub commission: CommissionRate,
    /// Completed bookings, paid or not
    pub completed_count: usize,
    /// Completed bookings already paid out
    pub paid_count: usize,
    /// Completed bookings awaiting payout
    pub unpaid: Vec<BillableBooking>,
    /// Sum of price over every completed booking
    pub total_service_value: Money,
    /// Sum of net earning over unpaid bookings
    pub total_payout_due: Money,
    /// Commission retained on unpaid bookings
    pub commission_due: Money,
}

impl ProviderBilling {
    /// Ids of the bookings a payout would settle.
    #[must_use]
    pub fn unpaid_booking_ids(&self) -> Vec<BookingId> {
        self.unpaid.iter().map(|b| b.booking_id).collect()
    }

    /// Whether there is anything to pay.
    #[must_use]
    pub fn has_payout_due(&self) -> bool {
        !self.unpaid.is_empty()
    }
}

/// Platform-wide totals over every provider aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlatformTotals {
    /// Providers considered
    pub providers: usize,
    /// Providers with a payout due
    pub providers_with_payout_due: usize,
    /// Gross value of completed bookings
    pub total_service_value: Money,
    /// Outstanding provider payouts
    pub total_payout_due: Money,
    /// Commission retained on outstanding bookings
    pub commission_due: Money,
}

impl PlatformTotals {
    /// Sum provider aggregates.
    #[must_use]
    pub fn from_aggregates(aggregates: &[ProviderBilling]) -> Self {
        aggregates.iter().fold(Self::default(), |acc, agg| Self {
            providers: acc.providers + 1,
            providers_with_payout_due: acc.providers_with_payout_due + usize::from(agg.has_payout_due()),
            total_service_value: acc.total_service_value.saturating_add(agg.total_service_value),
            total_payout_due: acc.total_payout_due.saturating_add(agg.total_payout_due),
            commission_due: acc.commission_due.saturating_add(agg.commission_due),
        })
    }
}

/// Aggregate every provider profile.
///
/// Non-provider profiles are skipped; bookings whose provider is absent from
/// `profiles` contribute nothing. Empty inputs yield an empty result.
#[must_use]
pub fn aggregate(profiles: &[Profile], bookings: &[Booking]) -> Vec<ProviderBilling> {
    let mut by_provider: HashMap<&ProfileId, Vec<&Booking>> = HashMap::new();
    for booking in bookings.iter().filter(|b| b.status == BookingStatus::Completed) {
        if let Some(provider) = &booking.provider_id {
            by_provider.entry(provider).or_default().push(booking);
        }
    }

    profiles
        .iter()
        .filter(|p| p.is_provider())
        .map(|p| build(p, by_provider.get(&p.id).map_or(&[][..], Vec::as_slice)))
        .collect()
}

/// Aggregate a single provider against the full booking set.
#[must_use]
pub fn aggregate_provider(provider: &Profile, bookings: &[Booking]) -> ProviderBilling {
    let completed: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed && b.is_assigned_to(&provider.id))
        .collect();
    build(provider, &completed)
}

fn build(provider: &Profile, completed: &[&Booking]) -> ProviderBilling {
    let commission = provider.commission_or_zero();

    let mut unpaid_bookings: Vec<&Booking> = completed.iter().copied().filter(|b| !b.provider_paid).collect();
    unpaid_bookings.sort_by_key(|b| (service_date(b), b.created_at, b.id));

    let unpaid: Vec<BillableBooking> = unpaid_bookings
        .into_iter()
        .map(|b| BillableBooking {
            booking_id: b.id,
            date: service_date(b),
            service: b.service.clone(),
            client: b.customer_name.clone(),
            price: b.price,
            net: commission.net_of(b.price),
        })
        .collect();

    let total_payout_due: Money = unpaid.iter().map(|b| b.net).sum();
    let unpaid_gross: Money = unpaid.iter().map(|b| b.price).sum();

    ProviderBilling {
        provider_id: provider.id.clone(),
        provider_name: provider.name.clone(),
        provider_email: provider.email.clone(),
        commission,
        completed_count: completed.len(),
        paid_count: completed.iter().filter(|b| b.provider_paid).count(),
        total_service_value: completed.iter().map(|b| b.price).sum(),
        total_payout_due,
        commission_due: unpaid_gross.saturating_sub(total_payout_due),
        unpaid,
    }
}

fn service_date(booking: &Booking) -> NaiveDate {
    booking.scheduled_date.unwrap_or_else(|| booking.created_at.date_naive())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dormclean_testing::fixtures::{BookingBuilder, customer, provider};
    use proptest::prelude::*;

    #[test]
    fn test_qfs_scenario() {
        let qfs = provider("p-qfs", "QFS", 20.0);
        let bookings = vec![
            BookingBuilder::new().provider(&qfs).price(Money::from_dollars(100)).completed().build(),
            BookingBuilder::new().provider(&qfs).price(Money::from_dollars(50)).completed().build(),
        ];

        let result = aggregate(&[qfs], &bookings);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].total_service_value, Money::from_dollars(150));
        assert_eq!(result[0].total_payout_due, Money::from_dollars(120));
        assert_eq!(result[0].commission_due, Money::from_dollars(30));
        let mut nets: Vec<Money> = result[0].unpaid.iter().map(|b| b.net).collect();
        nets.sort();
        assert_eq!(nets, vec![Money::from_dollars(40), Money::from_dollars(80)]);
    }

    #[test]
    fn test_only_completed_unpaid_assigned_bookings_are_due() {
        let qfs = provider("p-qfs", "QFS", 0.0);
        let other = provider("p-other", "Other", 0.0);
        let bookings = vec![
            BookingBuilder::new().provider(&qfs).price(Money::from_dollars(10)).completed().build(),
            BookingBuilder::new().provider(&qfs).price(Money::from_dollars(20)).completed().paid().build(),
            BookingBuilder::new().provider(&qfs).price(Money::from_dollars(40)).build(),
            BookingBuilder::new().provider(&other).price(Money::from_dollars(80)).completed().build(),
            BookingBuilder::new().price(Money::from_dollars(160)).completed().build(),
        ];

        let agg = aggregate_provider(&qfs, &bookings);
        assert_eq!(agg.total_payout_due, Money::from_dollars(10));
        assert_eq!(agg.total_service_value, Money::from_dollars(30));
        assert_eq!(agg.completed_count, 2);
        assert_eq!(agg.paid_count, 1);
    }

    #[test]
    fn test_line_items_ordered_by_date_then_creation() {
        let qfs = provider("p-qfs", "QFS", 0.0);
        let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        let booked = |date, minutes| {
            let mut booking = BookingBuilder::new().provider(&qfs).date(date).completed().build();
            booking.created_at += chrono::TimeDelta::minutes(minutes);
            booking
        };
        let late_same_day = booked(day(10), 30);
        let early_same_day = booked(day(10), 5);
        let next_day = booked(day(11), 0);
        let bookings = vec![next_day.clone(), late_same_day.clone(), early_same_day.clone()];

        for _ in 0..2 {
            let order: Vec<BookingId> = aggregate_provider(&qfs, &bookings).unpaid.iter().map(|b| b.booking_id).collect();
            assert_eq!(order, vec![early_same_day.id, late_same_day.id, next_day.id]);
        }
    }

    #[test]
    fn test_join_survives_rename() {
        let mut qfs = provider("p-qfs", "QFS", 0.0);
        let booking = BookingBuilder::new().provider(&qfs).price(Money::from_dollars(25)).completed().build();
        qfs.name = "QFS Cleaning Ltd".to_string();

        let agg = aggregate_provider(&qfs, &[booking]);
        assert_eq!(agg.total_payout_due, Money::from_dollars(25));
        assert_eq!(agg.provider_name, "QFS Cleaning Ltd");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(aggregate(&[], &[]).is_empty());
        let agg = aggregate(&[provider("p1", "Solo", 10.0), customer("c1", "Sam")], &[]);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].total_payout_due, Money::ZERO);
        assert!(!agg[0].has_payout_due());
        assert_eq!(PlatformTotals::from_aggregates(&agg).providers_with_payout_due, 0);
    }

    #[test]
    fn test_platform_totals() {
        let a = provider("pa", "A", 20.0);
        let b = provider("pb", "B", 0.0);
        let bookings = vec![
            BookingBuilder::new().provider(&a).price(Money::from_dollars(100)).completed().build(),
            BookingBuilder::new().provider(&b).price(Money::from_dollars(30)).completed().build(),
        ];
        let totals = PlatformTotals::from_aggregates(&aggregate(&[a, b], &bookings));
        assert_eq!(totals.providers, 2);
        assert_eq!(totals.providers_with_payout_due, 2);
        assert_eq!(totals.total_payout_due, Money::from_dollars(110));
        assert_eq!(totals.commission_due, Money::from_dollars(20));
    }

    fn arb_booking(providers: Vec<Profile>) -> impl Strategy<Value = Booking> {
        (0..=providers.len(), 0u64..1_000_000, any::<bool>(), 0u8..4).prop_map(move |(idx, cents, paid, status)| {
            let mut builder = BookingBuilder::new().price(Money::from_cents(cents));
            if let Some(p) = providers.get(idx) {
                builder = builder.provider(p);
            }
            builder = match status {
                0 => builder.status(BookingStatus::Aligned),
                1 => builder.status(BookingStatus::InProcess),
                _ => builder.completed(),
            };
            if paid {
                builder = builder.paid();
            }
            builder.build()
        })
    }

    proptest! {
        #[test]
        fn prop_payout_due_matches_definition(
            commission in 0u32..=10_000,
            bookings in proptest::collection::vec(
                arb_booking(vec![provider("p1", "One", 0.0), provider("p2", "Two", 0.0)]),
                0..30,
            ),
        ) {
            let mut p1 = provider("p1", "One", 0.0);
            p1.commission = Some(CommissionRate::from_basis_points(commission).unwrap());
            let p2 = provider("p2", "Two", 0.0);

            let result = aggregate(&[p1.clone(), p2], &bookings);
            let expected: Money = bookings
                .iter()
                .filter(|b| b.status == BookingStatus::Completed && !b.provider_paid && b.is_assigned_to(&p1.id))
                .map(|b| p1.commission_or_zero().net_of(b.price))
                .sum();
            prop_assert_eq!(result[0].total_payout_due, expected);
            prop_assert!(result[0].total_payout_due <= result[0].total_service_value);
        }

        #[test]
        fn prop_aggregate_is_idempotent(
            bookings in proptest::collection::vec(arb_booking(vec![provider("p1", "One", 12.5)]), 0..20),
        ) {
            let profiles = [provider("p1", "One", 12.5)];
            prop_assert_eq!(aggregate(&profiles, &bookings), aggregate(&profiles, &bookings));
        }
    }
}
