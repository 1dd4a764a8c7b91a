//! Invoice e-mail composition.

use crate::invoice::InvoiceDocument;
use dormclean_core::{Attachment, NaiveDate, OutboundEmail};

/// Compose the payout notification carrying the invoice as a PDF attachment.
#[must_use]
pub fn invoice_email(document: &InvoiceDocument, payment_date: NaiveDate) -> OutboundEmail {
    let layout = document.layout();
    let html = format!(
        "<p>Hello {name},</p>\
         <p>{business} has processed your payout of <strong>{currency} {total}</strong> \
         for {count} completed booking{plural}, dated {date}.</p>\
         <p>Your invoice <strong>{invoice}</strong> is attached.</p>\
         <p>Questions? Reply to {contact}.</p>",
        name = escape(&layout.billed_to.name),
        business = escape(&layout.business.name),
        currency = layout.currency,
        total = layout.total.to_decimal_string(),
        count = layout.rows.len(),
        plural = if layout.rows.len() == 1 { "" } else { "s" },
        date = payment_date.format("%Y-%m-%d"),
        invoice = escape(&layout.invoice_id),
        contact = escape(&layout.business.email),
    );

    OutboundEmail {
        to: layout.billed_to.email.clone(),
        subject: format!("{} payout invoice {}", layout.business.name, layout.invoice_id),
        html,
        attachment: Some(Attachment {
            filename: document.filename(),
            content_base64: document.to_base64(),
            mime_type: "application/pdf".to_string(),
        }),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
