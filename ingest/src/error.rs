//! Errors raised while accepting an order webhook.

use dormclean_core::Error;
use thiserror::Error;

/// Why an inbound order delivery was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The body is neither JSON nor a recognised ping form.
    #[error("malformed order payload: {0}")]
    Malformed(String),

    /// The payload parsed but carries no order id.
    #[error("order payload has no id")]
    MissingOrderId,

    /// A field is present but unusable (for example an unparseable total).
    #[error("invalid order field {field}: {message}")]
    InvalidField {
        /// Payload field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// A secret is configured and the request carries no signature header.
    #[error("missing webhook signature")]
    MissingSignature,

    /// The signature header does not match the body.
    #[error("webhook signature mismatch")]
    SignatureMismatch,
}

impl IngestError {
    /// Returns `true` for signature failures, which are answered before parsing.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::MissingSignature | Self::SignatureMismatch)
    }
}

impl From<IngestError> for Error {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Malformed(message) => Self::validation("body", message),
            IngestError::MissingOrderId => Self::validation("id", "order id is required"),
            IngestError::InvalidField { field, message } => Self::validation(field, message),
            IngestError::MissingSignature | IngestError::SignatureMismatch => Self::Forbidden(err.to_string()),
        }
    }
}
