//! HTTP mail relay client.

use crate::Sender;
use async_trait::async_trait;
use dormclean_core::{DeliveryError, Mailer, OutboundEmail};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Default request timeout for relay calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body the relay accepts.
#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<RelayAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content: &'a str,
    #[serde(rename = "type")]
    mime_type: &'a str,
}

/// Mailer that posts messages to a transactional mail relay.
///
/// The relay receives `{from, to, subject, html, attachments}` as JSON with a
/// bearer API key. Any non-2xx answer is a [`DeliveryError`] carrying the
/// relay's status and response body.
#[derive(Clone)]
pub struct RelayMailer {
    client: Client,
    api_url: String,
    api_key: String,
    sender: Sender,
}

impl RelayMailer {
    /// Create a relay client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, sender: Sender) -> Result<Self, DeliveryError> {
        Self::with_timeout(api_url, api_key, sender, DEFAULT_TIMEOUT)
    }

    /// Create a relay client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the HTTP client cannot be built.
    pub fn with_timeout(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        sender: Sender,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::new(format!("Failed to build relay client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let request = RelayRequest {
            from: self.sender.mailbox(),
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            attachments: email
                .attachment
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.filename,
                    content: &a.content_base64,
                    mime_type: &a.mime_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::new(format!("Mail relay unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(to = %email.to, status = status.as_u16(), body = %body, "Mail relay rejected message");
            return Err(DeliveryError::new(format!("Mail relay returned {}: {body}", status.as_u16())));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email accepted by relay");
        Ok(())
    }
}

impl std::fmt::Debug for RelayMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayMailer")
            .field("api_url", &self.api_url)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}
