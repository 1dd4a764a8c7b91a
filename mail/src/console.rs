//! Console mailer for development.

use async_trait::async_trait;
use dormclean_core::{DeliveryError, Mailer, OutboundEmail};
use tracing::info;

/// Logs messages instead of sending them.
///
/// Every send succeeds, so payout runs commit in development without a relay.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create a new console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let attachment = email.attachment.as_ref();
        info!(
            to = %email.to,
            subject = %email.subject,
            attachment = attachment.map_or("none", |a| a.filename.as_str()),
            attachment_base64_len = attachment.map_or(0, |a| a.content_base64.len()),
            "Email (development mode, not sent)"
        );
        println!("\n── EMAIL ─────────────────────────────────────────────");
        println!("To:      {}", email.to);
        println!("Subject: {}", email.subject);
        if let Some(a) = attachment {
            println!("Attach:  {} ({})", a.filename, a.mime_type);
        }
        println!("──────────────────────────────────────────────────────\n");
        Ok(())
    }
}
