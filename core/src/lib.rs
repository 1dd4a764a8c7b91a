//! # Dormclean Core
//!
//! Domain types and injected dependency traits for the dormclean cleaning
//! marketplace.
//!
//! This crate is the leaf of the workspace. It holds:
//!
//! - **Value objects**: [`Money`], [`CommissionRate`], [`BillingPeriod`] and the id newtypes
//! - **Entities**: profiles, buildings, bookings, complaints, invoice requests, payments
//! - **Lifecycles**: forward-only booking status, complaint resolution, payout phases
//! - **Errors**: the [`Error`] taxonomy every outer layer maps onto transport codes
//! - **Environment**: [`environment::Clock`] plus the store and mailer traits in [`providers`]
//!
//! Nothing here performs I/O. Stores, mail transports and the clock are traits so
//! each component receives its collaborators at construction time and tests can
//! substitute in-memory fakes.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod booking;
pub mod building;
pub mod complaint;
pub mod environment;
pub mod error;
pub mod payout;
pub mod profile;
pub mod providers;
pub mod types;

pub use booking::{Apartment, Booking, BookingStatus, NewBooking, RoomCounts};
pub use building::{Building, RoomType, ServicePrices, ServiceType};
pub use complaint::{Complaint, ComplaintResponse, ComplaintStatus, ComplaintType};
pub use error::{DeliveryError, Error, Result};
pub use payout::{
    DeliveryAttempt, DeliveryStatus, InvoiceRequest, InvoiceRequestStatus, NewPayment, Payment,
    PaymentStatus,
};
pub use profile::{Profile, Role};
pub use providers::{Attachment, Mailer, OutboundEmail};
pub use types::{
    BillingPeriod, BookingId, BuildingId, CommissionRate, ComplaintId, InvoiceRequestId, Money,
    PaymentId, ProfileId,
};

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
