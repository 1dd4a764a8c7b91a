//! Relay mailer against a mock HTTP relay.

#![allow(clippy::unwrap_used)]

use dormclean_core::{Attachment, Mailer, OutboundEmail};
use dormclean_mail::{RelayMailer, Sender};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn invoice_email() -> OutboundEmail {
    OutboundEmail {
        to: "qfs@providers.test".to_string(),
        subject: "Payout invoice INV-ABC123".to_string(),
        html: "<p>Your payout of USD 120.00</p>".to_string(),
        attachment: Some(Attachment {
            filename: "INV-ABC123.pdf".to_string(),
            content_base64: "JVBERi0xLjc=".to_string(),
            mime_type: "application/pdf".to_string(),
        }),
    }
}

fn mailer(server: &MockServer) -> RelayMailer {
    RelayMailer::new(
        format!("{}/emails", server.uri()),
        "re_test_key",
        Sender::new("billing@dormclean.test", "Dormclean Billing"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_relay_accepts_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test_key"))
        .and(body_partial_json(serde_json::json!({
            "from": "Dormclean Billing <billing@dormclean.test>",
            "to": "qfs@providers.test",
            "subject": "Payout invoice INV-ABC123",
            "attachments": [{
                "filename": "INV-ABC123.pdf",
                "content": "JVBERi0xLjc=",
                "type": "application/pdf"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})))
        .expect(1)
        .mount(&server)
        .await;

    mailer(&server).send(&invoice_email()).await.unwrap();
}

#[tokio::test]
async fn test_relay_rejection_carries_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("recipient domain not verified"))
        .mount(&server)
        .await;

    let err = mailer(&server).send(&invoice_email()).await.unwrap_err();
    assert!(err.message.contains("422"));
    assert!(err.message.contains("recipient domain not verified"));
}

#[tokio::test]
async fn test_relay_timeout_is_delivery_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mailer = RelayMailer::with_timeout(
        format!("{}/emails", server.uri()),
        "re_test_key",
        Sender::new("billing@dormclean.test", "Billing"),
        Duration::from_millis(100),
    )
    .unwrap();

    let err = mailer.send(&invoice_email()).await.unwrap_err();
    assert!(err.message.contains("unreachable"));
}

#[tokio::test]
async fn test_relay_unreachable() {
    let mailer = RelayMailer::new(
        "http://127.0.0.1:9/emails",
        "re_test_key",
        Sender::new("billing@dormclean.test", "Billing"),
    )
    .unwrap();
    assert!(mailer.send(&invoice_email()).await.is_err());
}
