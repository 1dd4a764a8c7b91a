//! # Dormclean Ingest
//!
//! Accepts e-commerce order webhooks and turns each order into an unassigned
//! booking.
//!
//! - [`payload`]: tolerant parsing of WooCommerce-style order JSON and ping detection
//! - [`signature`]: `X-WC-Webhook-Signature` verification
//! - [`OrderIngestor`]: dedupe by upstream order id and persistence
//!
//! ## Example
//!
//! ```
//! use dormclean_ingest::payload::{Delivery, parse_delivery};
//!
//! let delivery = parse_delivery(br#"{"id": 7, "line_items": [{"name": "Deep Clean", "quantity": 2}]}"#).unwrap();
//! let Delivery::Order(order) = delivery else { unreachable!() };
//! assert_eq!(order.room_counts.deep, 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod ingestor;
pub mod payload;
pub mod signature;

pub use error::IngestError;
pub use ingestor::{IngestOutcome, OrderIngestor};
pub use signature::{SIGNATURE_HEADER, SignatureVerifier};
