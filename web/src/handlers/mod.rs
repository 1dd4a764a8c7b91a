//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod billing;
pub mod bookings;
pub mod buildings;
pub mod complaints;
pub mod health;
pub mod invoice_requests;
pub mod payments;
pub mod profiles;
pub mod webhooks;

pub use health::health_check;
