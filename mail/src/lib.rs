//! # Dormclean Mail
//!
//! [`Mailer`](dormclean_core::Mailer) transports:
//!
//! - [`SmtpMailer`]: Lettre over SMTP, sending on the blocking pool
//! - [`RelayMailer`]: JSON over HTTPS to a transactional mail relay
//! - [`ConsoleMailer`]: logs instead of sending, for development

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod console;
pub mod relay;
mod smtp;

pub use console::ConsoleMailer;
pub use relay::RelayMailer;
pub use smtp::SmtpMailer;

/// The `From` mailbox of outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Sender address
    pub email: String,
    /// Display name
    pub name: String,
}

impl Sender {
    /// Create a sender.
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// `Name <address>`, or the bare address when the name is blank.
    ///
    /// ```
    /// use dormclean_mail::Sender;
    ///
    /// assert_eq!(Sender::new("a@b.test", "Billing").mailbox(), "Billing <a@b.test>");
    /// assert_eq!(Sender::new("a@b.test", " ").mailbox(), "a@b.test");
    /// ```
    #[must_use]
    pub fn mailbox(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name.trim(), self.email)
        }
    }
}
