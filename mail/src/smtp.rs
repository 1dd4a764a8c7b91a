//! SMTP transport using Lettre.

use crate::Sender;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dormclean_core::{Attachment, DeliveryError, Mailer, OutboundEmail};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP mailer.
///
/// # Configuration
///
/// - `server`: SMTP relay host (e.g., "smtp.gmail.com")
/// - `port`: usually 587 for STARTTLS, 465 for TLS
/// - `username` / `password`: relay credentials
/// - `sender`: the `From` mailbox
///
/// # Examples
///
/// ```ignore
/// use dormclean_mail::{Sender, SmtpMailer};
///
/// let mailer = SmtpMailer::new(
///     "smtp.gmail.com".to_string(),
///     587,
///     "billing@dormclean.example".to_string(),
///     "app_password".to_string(),
///     Sender::new("billing@dormclean.example", "Dormclean Billing"),
/// );
/// ```
#[derive(Clone)]
pub struct SmtpMailer {
    server: String,
    port: u16,
    credentials: Credentials,
    sender: Sender,
}

impl SmtpMailer {
    /// Create a new SMTP mailer.
    #[must_use]
    pub fn new(server: String, port: u16, username: String, password: String, sender: Sender) -> Self {
        Self {
            server,
            port,
            credentials: Credentials::new(username, password),
            sender,
        }
    }

    /// Build a transport per message; the relay connection is not pooled.
    fn build_transport(&self) -> Result<SmtpTransport, DeliveryError> {
        Ok(SmtpTransport::relay(&self.server)
            .map_err(|e| DeliveryError::new(format!("SMTP relay error: {e}")))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build())
    }

    /// Build the MIME message for `email`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] for unparseable addresses, MIME types or
    /// attachment content.
    pub fn build_message(&self, email: &OutboundEmail) -> Result<Message, DeliveryError> {
        let builder = Message::builder()
            .from(
                self.sender
                    .mailbox()
                    .parse()
                    .map_err(|e| DeliveryError::new(format!("Invalid from address: {e}")))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| DeliveryError::new(format!("Invalid to address: {e}")))?)
            .subject(email.subject.clone());

        let message = match &email.attachment {
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.html.clone()),
            Some(attachment) => builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(email.html.clone()))
                    .singlepart(attachment_part(attachment)?),
            ),
        };
        message.map_err(|e| DeliveryError::new(format!("Failed to build email: {e}")))
    }
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart, DeliveryError> {
    let content = STANDARD
        .decode(&attachment.content_base64)
        .map_err(|e| DeliveryError::new(format!("Attachment is not base64: {e}")))?;
    let content_type = ContentType::parse(&attachment.mime_type)
        .map_err(|e| DeliveryError::new(format!("Invalid attachment type: {e}")))?;
    Ok(LettreAttachment::new(attachment.filename.clone()).body(content, content_type))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let message = self.build_message(email)?;
        let transport = self.build_transport()?;

        tokio::task::spawn_blocking(move || {
            transport
                .send(&message)
                .map_err(|e| DeliveryError::new(format!("Failed to send email: {e}")))
        })
        .await
        .map_err(|e| DeliveryError::new(format!("Email task failed: {e}")))?
        .map(|_| ())?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent via SMTP");
        Ok(())
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}
