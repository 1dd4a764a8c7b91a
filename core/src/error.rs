//! Error taxonomy shared across dormclean.
//!
//! Every operation fails with one of four families: validation, not-found,
//! conflict, or upstream failure (storage, mail relay). The web layer maps each
//! family onto an HTTP status; nothing here knows about HTTP.

use thiserror::Error;

/// Result type alias for dormclean operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by domain operations and their injected collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input failed shape or range validation.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Requested id
        id: String,
    },

    /// The request contradicts a business rule (duplicate monthly request, already-paid booking).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller's role does not permit the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A storage or other upstream call failed.
    #[error("{service} error: {message}")]
    Upstream {
        /// Which collaborator failed (`database`, `identity`, ...)
        service: &'static str,
        /// Diagnostic detail, logged server-side only
        message: String,
    },

    /// The mail relay rejected or never received the message.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl Error {
    /// Build a validation error for `field`.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a not-found error.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Build a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Build a storage failure.
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Upstream {
            service: "database",
            message: message.into(),
        }
    }

    /// Returns `true` if this error is due to invalid caller input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dormclean_core::Error;
    /// assert!(Error::validation("month", "out of range").is_user_error());
    /// assert!(!Error::database("pool closed").is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Conflict(_) | Self::Forbidden(_)
        )
    }
}

/// Mail relay failure carrying the relay's diagnostic message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Email delivery failed: {message}")]
pub struct DeliveryError {
    /// Diagnostic from the relay or transport
    pub message: String,
}

impl DeliveryError {
    /// Create a delivery error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::validation("month", "must be between 1 and 12").to_string(),
            "Invalid month: must be between 1 and 12"
        );
        assert_eq!(Error::not_found("Booking", "42").to_string(), "Booking with id 42 not found");
        assert_eq!(
            Error::from(DeliveryError::new("550 mailbox unavailable")).to_string(),
            "Email delivery failed: 550 mailbox unavailable"
        );
    }
}
