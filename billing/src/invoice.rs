//! Invoice Generator.
//!
//! Renders one [`ProviderBilling`] into a paginated PDF. Rendering happens in
//! two steps: [`InvoiceLayout::build`] decides what goes on which page, then
//! the layout is written out with `pdf-writer` using the standard Helvetica
//! fonts. The writer adds no compression and no metadata timestamps, so the
//! bytes are a function of the aggregate, the business identity and the
//! generation instant.

use crate::aggregate::ProviderBilling;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, Utc};
use dormclean_core::{CommissionRate, Money, ProfileId};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};
use serde::Serialize;
use std::ops::Range;
use thiserror::Error;

/// Line items on the first page, below the header blocks.
pub const FIRST_PAGE_ROWS: usize = 24;
/// Line items on each continuation page.
pub const CONTINUATION_PAGE_ROWS: usize = 38;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const ROW_HEIGHT: f32 = 18.0;
const FOOTER_Y: f32 = 36.0;

const REGULAR: Name<'static> = Name(b"F1");
const BOLD: Name<'static> = Name(b"F2");

/// Errors raised while configuring invoice generation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvoiceError {
    /// The business identity printed in the header is incomplete.
    #[error("business identity is missing its {0}")]
    IncompleteBusiness(&'static str),

    /// The currency is not a three-letter code.
    #[error("'{0}' is not a three-letter currency code")]
    InvalidCurrency(String),
}

impl From<InvoiceError> for dormclean_core::Error {
    fn from(err: InvoiceError) -> Self {
        Self::validation("invoice", err.to_string())
    }
}

/// The platform's identity, printed in the invoice header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BusinessIdentity {
    /// Trading name
    pub name: String,
    /// Postal address, one line
    pub address: String,
    /// Contact e-mail
    pub email: String,
    /// Contact phone
    pub phone: Option<String>,
}

/// Provider block of the invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BilledTo {
    /// Provider id
    pub provider_id: ProfileId,
    /// Provider name
    pub name: String,
    /// Provider e-mail
    pub email: String,
}

/// One table row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvoiceRow {
    /// Service date
    pub date: NaiveDate,
    /// Service description
    pub service: String,
    /// Customer
    pub client: String,
    /// Booking price
    pub gross: Money,
    /// Provider earning
    pub net: Money,
}

/// What one page holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageSlice {
    /// 1-based page number
    pub number: usize,
    /// Indices into [`InvoiceLayout::rows`]
    pub rows: Range<usize>,
    /// Whether the total row is printed on this page
    pub has_total: bool,
}

/// Structured invoice content and its pagination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvoiceLayout {
    /// `INV-<provider suffix>-<YYYYMMDDHHMMSS>`
    pub invoice_id: String,
    /// Generation instant
    pub issued_at: DateTime<Utc>,
    /// ISO currency code
    pub currency: String,
    /// Header block
    pub business: BusinessIdentity,
    /// Billed-to block
    pub billed_to: BilledTo,
    /// Commission applied
    pub commission: CommissionRate,
    /// Line items
    pub rows: Vec<InvoiceRow>,
    /// Sum of net earnings
    pub total: Money,
    /// Page breakdown
    pub pages: Vec<PageSlice>,
}

/// Invoice number for a provider at an instant.
#[must_use]
pub fn invoice_id(provider: &ProfileId, at: DateTime<Utc>) -> String {
    let suffix = provider.suffix(6);
    let suffix = if suffix.is_empty() { "NOID".to_string() } else { suffix };
    format!("INV-{suffix}-{}", at.format("%Y%m%d%H%M%S"))
}

impl InvoiceLayout {
    /// Lay out an aggregate.
    #[must_use]
    pub fn build(
        aggregate: &ProviderBilling,
        business: &BusinessIdentity,
        currency: &str,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let rows: Vec<InvoiceRow> = aggregate
            .unpaid
            .iter()
            .map(|b| InvoiceRow {
                date: b.date,
                service: b.service.clone(),
                client: b.client.clone(),
                gross: b.price,
                net: b.net,
            })
            .collect();

        Self {
            invoice_id: invoice_id(&aggregate.provider_id, issued_at),
            issued_at,
            currency: currency.to_string(),
            business: business.clone(),
            billed_to: BilledTo {
                provider_id: aggregate.provider_id.clone(),
                name: aggregate.provider_name.clone(),
                email: aggregate.provider_email.clone(),
            },
            commission: aggregate.commission,
            pages: paginate(rows.len()),
            total: aggregate.total_payout_due,
            rows,
        }
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Split `row_count` rows over pages; the total row needs one free slot after
/// the last item, spilling onto a page of its own when the last page is full.
fn paginate(row_count: usize) -> Vec<PageSlice> {
    let mut pages = Vec::new();
    let mut start = 0;
    loop {
        let capacity = if pages.is_empty() { FIRST_PAGE_ROWS } else { CONTINUATION_PAGE_ROWS };
        let end = (start + capacity).min(row_count);
        let has_total = end == row_count && end - start < capacity;
        pages.push(PageSlice {
            number: pages.len() + 1,
            rows: start..end,
            has_total,
        });
        if has_total {
            return pages;
        }
        start = end;
    }
}

/// A rendered invoice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDocument {
    layout: InvoiceLayout,
    bytes: Vec<u8>,
}

impl InvoiceDocument {
    /// Binary PDF.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the binary PDF.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Standard padded base64 of [`Self::as_bytes`].
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Attachment file name.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.pdf", self.layout.invoice_id)
    }

    /// Invoice number.
    #[must_use]
    pub fn invoice_id(&self) -> &str {
        &self.layout.invoice_id
    }

    /// Structured content.
    #[must_use]
    pub const fn layout(&self) -> &InvoiceLayout {
        &self.layout
    }
}

/// Renders provider aggregates into PDF invoices.
#[derive(Clone, Debug)]
pub struct InvoiceGenerator {
    business: BusinessIdentity,
    currency: String,
}

impl InvoiceGenerator {
    /// Create a generator for a business identity and currency.
    ///
    /// # Errors
    ///
    /// Returns [`InvoiceError`] for a blank business name or e-mail, or a
    /// currency that is not three ASCII letters.
    pub fn new(business: BusinessIdentity, currency: impl Into<String>) -> Result<Self, InvoiceError> {
        if business.name.trim().is_empty() {
            return Err(InvoiceError::IncompleteBusiness("name"));
        }
        if business.email.trim().is_empty() {
            return Err(InvoiceError::IncompleteBusiness("email"));
        }
        let currency = currency.into().trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InvoiceError::InvalidCurrency(currency));
        }
        Ok(Self { business, currency })
    }

    /// Business identity printed in the header.
    #[must_use]
    pub const fn business(&self) -> &BusinessIdentity {
        &self.business
    }

    /// Render an aggregate. An aggregate without unpaid bookings renders an
    /// empty table with a zero total.
    #[must_use]
    pub fn generate(&self, aggregate: &ProviderBilling, issued_at: DateTime<Utc>) -> InvoiceDocument {
        let layout = InvoiceLayout::build(aggregate, &self.business, &self.currency, issued_at);
        let bytes = render(&layout);
        tracing::debug!(
            invoice_id = %layout.invoice_id,
            provider_id = %layout.billed_to.provider_id,
            pages = layout.page_count(),
            bytes = bytes.len(),
            "Rendered invoice"
        );
        InvoiceDocument { layout, bytes }
    }
}

// ============================================================================
// PDF rendering
// ============================================================================

fn render(layout: &InvoiceLayout) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let regular_id = Ref::new(3);
    let bold_id = Ref::new(4);
    let mut next_id = 5;
    let page_ids: Vec<(Ref, Ref)> = layout
        .pages
        .iter()
        .map(|_| {
            let ids = (Ref::new(next_id), Ref::new(next_id + 1));
            next_id += 2;
            ids
        })
        .collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id)
        .kids(page_ids.iter().map(|(page, _)| *page))
        .count(i32::try_from(page_ids.len()).unwrap_or(i32::MAX));
    pdf.type1_font(regular_id).base_font(Name(b"Helvetica"));
    pdf.type1_font(bold_id).base_font(Name(b"Helvetica-Bold"));

    let total_pages = layout.pages.len();
    for (slice, (page_id, content_id)) in layout.pages.iter().zip(&page_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
        page.parent(page_tree_id);
        page.contents(*content_id);
        page.resources().fonts().pair(REGULAR, regular_id).pair(BOLD, bold_id);
        page.finish();

        let content = render_page(layout, slice, total_pages);
        pdf.stream(*content_id, &content);
    }

    pdf.finish()
}

fn render_page(layout: &InvoiceLayout, slice: &PageSlice, total_pages: usize) -> Vec<u8> {
    let mut page = PageWriter::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    if slice.number == 1 {
        y = page.header(layout, y);
    } else {
        page.text(BOLD, 12.0, MARGIN, y, &format!("Invoice {} (continued)", layout.invoice_id));
        y -= 2.0 * ROW_HEIGHT;
    }

    y = page.table_header(&layout.currency, y);
    if layout.rows.is_empty() && slice.has_total {
        page.text(REGULAR, 10.0, MARGIN, y, "No unpaid completed bookings.");
        y -= ROW_HEIGHT;
    }
    for row in &layout.rows[slice.rows.clone()] {
        page.row(row, y);
        y -= ROW_HEIGHT;
    }
    if slice.has_total {
        page.rule(y + ROW_HEIGHT - 4.0);
        page.text(BOLD, 11.0, MARGIN, y - 2.0, &format!("Total payout due ({})", layout.currency));
        page.amount(BOLD, 11.0, Column::NET_RIGHT, y - 2.0, layout.total);
    }

    page.footer(slice.number, total_pages);
    page.finish()
}

struct Column;

impl Column {
    const DATE: f32 = MARGIN;
    const SERVICE: f32 = 120.0;
    const CLIENT: f32 = 290.0;
    const GROSS_RIGHT: f32 = 470.0;
    const NET_RIGHT: f32 = PAGE_WIDTH - MARGIN;
}

struct PageWriter {
    content: Content,
}

impl PageWriter {
    fn new() -> Self {
        Self { content: Content::new() }
    }

    fn text(&mut self, font: Name<'_>, size: f32, x: f32, y: f32, text: &str) {
        let encoded = encode(text);
        self.content.begin_text();
        self.content.set_font(font, size);
        self.content.next_line(x, y);
        self.content.show(Str(&encoded));
        self.content.end_text();
    }

    fn amount(&mut self, font: Name<'_>, size: f32, right: f32, y: f32, amount: Money) {
        let text = amount.to_decimal_string();
        let width = numeric_width(&text, size);
        self.text(font, size, right - width, y, &text);
    }

    fn rule(&mut self, y: f32) {
        self.content.set_line_width(0.5);
        self.content.move_to(MARGIN, y);
        self.content.line_to(PAGE_WIDTH - MARGIN, y);
        self.content.stroke();
    }

    fn header(&mut self, layout: &InvoiceLayout, mut y: f32) -> f32 {
        let business = &layout.business;
        self.text(BOLD, 18.0, MARGIN, y, &business.name);
        self.text(BOLD, 18.0, 400.0, y, "INVOICE");
        y -= 22.0;
        self.text(REGULAR, 10.0, MARGIN, y, &business.address);
        self.text(REGULAR, 10.0, 400.0, y, &layout.invoice_id);
        y -= 14.0;
        self.text(REGULAR, 10.0, MARGIN, y, &business.email);
        self.text(
            REGULAR,
            10.0,
            400.0,
            y,
            &format!("Issued {}", layout.issued_at.format("%Y-%m-%d %H:%M UTC")),
        );
        y -= 14.0;
        if let Some(phone) = &business.phone {
            self.text(REGULAR, 10.0, MARGIN, y, phone);
            y -= 14.0;
        }

        y -= 20.0;
        self.text(BOLD, 11.0, MARGIN, y, "Billed to");
        y -= 16.0;
        self.text(REGULAR, 10.0, MARGIN, y, &layout.billed_to.name);
        y -= 14.0;
        self.text(REGULAR, 10.0, MARGIN, y, &layout.billed_to.email);
        y -= 14.0;
        self.text(
            REGULAR,
            10.0,
            MARGIN,
            y,
            &format!("Provider {} | commission {}", layout.billed_to.provider_id, layout.commission),
        );
        y - 30.0
    }

    fn table_header(&mut self, currency: &str, y: f32) -> f32 {
        self.text(BOLD, 10.0, Column::DATE, y, "Date");
        self.text(BOLD, 10.0, Column::SERVICE, y, "Service");
        self.text(BOLD, 10.0, Column::CLIENT, y, "Client");
        self.text(BOLD, 10.0, Column::GROSS_RIGHT - 60.0, y, &format!("Price ({currency})"));
        self.text(BOLD, 10.0, Column::NET_RIGHT - 60.0, y, &format!("Net ({currency})"));
        self.rule(y - 5.0);
        y - ROW_HEIGHT
    }

    fn row(&mut self, row: &InvoiceRow, y: f32) {
        self.text(REGULAR, 10.0, Column::DATE, y, &row.date.format("%Y-%m-%d").to_string());
        self.text(REGULAR, 10.0, Column::SERVICE, y, &truncate(&row.service, 30));
        self.text(REGULAR, 10.0, Column::CLIENT, y, &truncate(&row.client, 24));
        self.amount(REGULAR, 10.0, Column::GROSS_RIGHT, y, row.gross);
        self.amount(REGULAR, 10.0, Column::NET_RIGHT, y, row.net);
    }

    fn footer(&mut self, number: usize, total: usize) {
        self.text(REGULAR, 9.0, PAGE_WIDTH / 2.0 - 25.0, FOOTER_Y, &format!("Page {number} of {total}"));
    }

    fn finish(self) -> Vec<u8> {
        self.content.finish()
    }
}

/// Map text onto the single-byte range the standard fonts cover.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u8::try_from(c) {
            Ok(byte) if c.is_ascii() && !c.is_ascii_control() => byte,
            _ => b'?',
        })
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Helvetica advance width of an amount string (digits and `.`).
fn numeric_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| if c == '.' { 278 } else { 556 }).sum();
    #[allow(clippy::cast_precision_loss)] // small strings
    let units = units as f32;
    units / 1000.0 * size
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_provider;
    use chrono::TimeZone;
    use dormclean_testing::fixtures::{BookingBuilder, provider};

    fn generator() -> InvoiceGenerator {
        InvoiceGenerator::new(
            BusinessIdentity {
                name: "Dormclean".to_string(),
                address: "1 Campus Way".to_string(),
                email: "billing@dormclean.test".to_string(),
                phone: None,
            },
            "usd",
        )
        .unwrap()
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 31, 14, 5, 9).unwrap()
    }

    fn aggregate_with(count: usize) -> ProviderBilling {
        let p = provider("user_2abc-def9", "QFS", 20.0);
        let bookings: Vec<_> = (0..count)
            .map(|_| BookingBuilder::new().provider(&p).price(Money::from_dollars(100)).completed().build())
            .collect();
        aggregate_provider(&p, &bookings)
    }

    #[test]
    fn test_invoice_id_scheme() {
        assert_eq!(invoice_id(&ProfileId::new("user_2abc-def9"), instant()), "INV-BCDEF9-20250331140509");
        assert_eq!(invoice_id(&ProfileId::new("--"), instant()), "INV-NOID-20250331140509");
    }

    #[test]
    fn test_empty_aggregate_renders_zero_total() {
        let doc = generator().generate(&aggregate_with(0), instant());
        assert_eq!(doc.layout().total, Money::ZERO);
        assert_eq!(doc.layout().page_count(), 1);
        assert!(doc.layout().pages[0].has_total);
        assert!(doc.as_bytes().starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(doc.as_bytes());
        assert!(text.contains("(0.00)"));
        assert!(text.contains("(Page 1 of 1)"));
    }

    #[test]
    fn test_base64_round_trips_to_bytes() {
        let doc = generator().generate(&aggregate_with(3), instant());
        let decoded = STANDARD.decode(doc.to_base64()).unwrap();
        assert_eq!(decoded, doc.as_bytes());
        assert_eq!(doc.filename(), "INV-BCDEF9-20250331140509.pdf");
    }

    #[test]
    fn test_rendering_is_deterministic_for_same_instant() {
        let agg = aggregate_with(5);
        assert_eq!(generator().generate(&agg, instant()), generator().generate(&agg, instant()));
    }

    #[test]
    fn test_total_row_matches_payout_due() {
        let doc = generator().generate(&aggregate_with(2), instant());
        assert_eq!(doc.layout().total, Money::from_dollars(160));
        assert!(String::from_utf8_lossy(doc.as_bytes()).contains("(160.00)"));
        assert_eq!(doc.layout().currency, "USD");
    }

    #[test]
    fn test_pagination() {
        let pages = paginate(0);
        assert_eq!(pages.len(), 1);

        let pages = paginate(FIRST_PAGE_ROWS - 1);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].has_total);

        // Full first page pushes the total onto a page of its own
        let pages = paginate(FIRST_PAGE_ROWS);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].rows, FIRST_PAGE_ROWS..FIRST_PAGE_ROWS);
        assert!(pages[1].has_total && !pages[0].has_total);

        let pages = paginate(FIRST_PAGE_ROWS + 10);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].rows, FIRST_PAGE_ROWS..FIRST_PAGE_ROWS + 10);
    }

    #[test]
    fn test_every_page_has_footer() {
        let doc = generator().generate(&aggregate_with(FIRST_PAGE_ROWS + CONTINUATION_PAGE_ROWS), instant());
        let text = String::from_utf8_lossy(doc.as_bytes());
        let pages = doc.layout().page_count();
        assert_eq!(pages, 3);
        for n in 1..=pages {
            assert!(text.contains(&format!("(Page {n} of {pages})")));
        }
    }

    #[test]
    fn test_generator_validation() {
        let business = generator().business().clone();
        assert!(InvoiceGenerator::new(business.clone(), "dollars").is_err());
        let mut blank = business;
        blank.name = "  ".to_string();
        assert_eq!(
            InvoiceGenerator::new(blank, "USD").unwrap_err(),
            InvoiceError::IncompleteBusiness("name")
        );
    }

    #[test]
    fn test_text_encoding_replaces_non_ascii() {
        assert_eq!(encode("Café"), b"Caf?".to_vec());
        assert_eq!(truncate("abcdefgh", 6), "abc...");
    }
}
