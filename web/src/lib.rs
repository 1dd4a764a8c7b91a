//! HTTP surface of the dormclean marketplace.
//!
//! Handlers are thin: they authenticate the caller, check the role, and hand
//! the request to the domain types and billing services. Errors from the
//! domain map onto status codes in [`AppError`].
//!
//! # Request Flow
//!
//! 1. **Correlation id** is read or generated and a request span opened
//! 2. **Identity** is resolved from the bearer token, then the profile loaded
//! 3. **Role guard** (`RequireAdmin`, `RequireProvider`) rejects with 403
//! 4. **Domain call** through stores or billing services
//! 5. **Map result** to JSON, or to `{code, message}` on error
//!
//! # Example
//!
//! ```ignore
//! use dormclean_web::{AppState, build_router};
//!
//! let state = AppState::with_defaults(env, buildings, complaints, generator, identity);
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, CurrentProfile, Identity, RequireAdmin, RequireProvider};
pub use identity::{IdentityRejected, IdentityVerifier, TrustedIdVerifier};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
