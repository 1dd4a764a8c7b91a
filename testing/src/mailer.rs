//! Mailer double that captures outbound e-mail.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use dormclean_core::{DeliveryError, Mailer, OutboundEmail};
use std::sync::Mutex;

/// Records every accepted message; can be told to reject sends.
///
/// # Example
///
/// ```
/// use dormclean_testing::RecordingMailer;
/// use dormclean_core::{Mailer, OutboundEmail};
///
/// # async fn example() {
/// let mailer = RecordingMailer::new();
/// mailer.fail_with("relay down");
/// let email = OutboundEmail {
///     to: "qfs@example.com".to_string(),
///     subject: "Invoice".to_string(),
///     html: "<p>hi</p>".to_string(),
///     attachment: None,
/// };
/// assert!(mailer.send(&email).await.is_err());
/// assert!(mailer.sent().is_empty());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failure: Mutex<Option<String>>,
    attempts: Mutex<usize>,
}

impl RecordingMailer {
    /// Mailer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following send with `diagnostic`.
    pub fn fail_with(&self, diagnostic: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(diagnostic.into());
    }

    /// Accept sends again.
    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Messages accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Sends attempted so far, accepted or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(diagnostic) = self.failure.lock().unwrap().clone() {
            return Err(DeliveryError::new(diagnostic));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
