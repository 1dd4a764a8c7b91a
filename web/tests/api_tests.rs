//! HTTP tests against the full router wired to in-memory stores.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)] // Test code uses expect for clear failure messages

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestRequest, TestServer};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dormclean_billing::{BillingEnvironment, BusinessIdentity, InvoiceGenerator, PayoutService};
use dormclean_core::providers::{BookingStore, BuildingStore, ProfileStore};
use dormclean_core::{Booking, BookingStatus, Money, NaiveDate, Profile};
use dormclean_ingest::{OrderIngestor, SIGNATURE_HEADER, SignatureVerifier};
use dormclean_testing::Harness;
use dormclean_testing::fixtures::{BookingBuilder, admin, building, customer, provider};
use dormclean_web::{AppState, TrustedIdVerifier, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

struct TestApp {
    server: TestServer,
    harness: Harness,
}

fn generator() -> InvoiceGenerator {
    InvoiceGenerator::new(
        BusinessIdentity {
            name: "Dormclean".to_string(),
            address: "1 Campus Way".to_string(),
            email: "billing@dormclean.test".to_string(),
            phone: Some("555-0100".to_string()),
        },
        "USD",
    )
    .expect("business identity is valid")
}

fn spawn_app(webhook_secret: Option<&str>) -> TestApp {
    dormclean_testing::init_tracing();
    let harness = Harness::new();
    let env = BillingEnvironment {
        profiles: harness.store.clone(),
        bookings: harness.store.clone(),
        payments: harness.store.clone(),
        invoice_requests: harness.store.clone(),
        ledger: harness.store.clone(),
        mailer: harness.mailer.clone(),
        clock: harness.clock.clone(),
    };

    let mut ingestor = OrderIngestor::new(harness.store.clone(), harness.store.clone(), harness.clock.clone());
    if let Some(secret) = webhook_secret {
        ingestor = ingestor.with_verifier(SignatureVerifier::new(secret));
    }
    let payouts = PayoutService::new(env.clone(), generator());
    let state = AppState::new(
        env,
        harness.store.clone(),
        harness.store.clone(),
        payouts,
        ingestor,
        Arc::new(TrustedIdVerifier),
    );

    let server = TestServer::new(build_router(state)).expect("router starts");
    TestApp { server, harness }
}

fn as_user(request: TestRequest, profile_id: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {profile_id}")).unwrap(),
    )
}

impl TestApp {
    async fn seed(&self, profile: &Profile) {
        self.harness.store.save_profile(profile).await.unwrap();
    }

    async fn booking(&self, booking: &Booking) -> Booking {
        self.harness.store.get_booking(&booking.id).await.unwrap().expect("booking exists")
    }
}

// ============================================================================
// Identity and profiles
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app(None);
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_missing_bearer_token_is_unauthorized() {
    let app = spawn_app(None);
    let response = app.server.get("/api/profile").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_first_save_creates_customer_profile_and_role_never_changes() {
    let app = spawn_app(None);

    as_user(app.server.get("/api/profile"), "user_1")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let created = as_user(app.server.put("/api/profile"), "user_1")
        .json(&json!({"name": "Riley", "email": "riley@students.test"}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let profile: Value = created.json();
    assert_eq!(profile["role"], "user");

    let edited = as_user(app.server.put("/api/profile"), "user_1")
        .json(&json!({"name": "Riley Q", "role": "admin"}))
        .await;
    edited.assert_status_ok();
    let profile: Value = edited.json();
    assert_eq!(profile["name"], "Riley Q");
    assert_eq!(profile["role"], "user");
}

#[tokio::test]
async fn test_first_save_requires_email() {
    let app = spawn_app(None);
    let response = as_user(app.server.put("/api/profile"), "user_1")
        .json(&json!({"name": "Riley"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn test_signed_in_without_profile_is_forbidden() {
    let app = spawn_app(None);
    as_user(app.server.get("/api/bookings"), "stranger")
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_reject_other_roles() {
    let app = spawn_app(None);
    app.seed(&customer("cust-1", "Sam")).await;
    app.seed(&provider("p-qfs", "QFS", 20.0)).await;

    as_user(app.server.get("/api/admin/billing"), "cust-1")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    as_user(app.server.post("/api/buildings"), "p-qfs")
        .json(&json!({"name": "North Hall", "location": "Campus", "room_types": []}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_provisions_provider_and_sets_commission() {
    let app = spawn_app(None);
    app.seed(&admin("admin-1")).await;

    let created = as_user(app.server.post("/api/admin/providers"), "admin-1")
        .json(&json!({
            "id": "p-sparkle",
            "name": "Sparkle Co",
            "email": "ops@sparkle.test",
            "commission_percentage": 15
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let profile: Value = created.json();
    assert_eq!(profile["role"], "provider");

    as_user(app.server.post("/api/admin/providers"), "admin-1")
        .json(&json!({"id": "p-sparkle", "name": "Again", "email": "x@y.test", "commission_percentage": 5}))
        .await
        .assert_status(StatusCode::CONFLICT);

    let updated = as_user(app.server.put("/api/admin/providers/p-sparkle/commission"), "admin-1")
        .json(&json!({"commission_percentage": 12.5}))
        .await;
    updated.assert_status_ok();
    let profile: Value = updated.json();
    assert_eq!(profile["commission"], 12.5);

    as_user(app.server.put("/api/admin/providers/p-sparkle/commission"), "admin-1")
        .json(&json!({"commission_percentage": 120}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Buildings and bookings
// ============================================================================

#[tokio::test]
async fn test_building_crud() {
    let app = spawn_app(None);
    app.seed(&admin("admin-1")).await;
    app.seed(&provider("p-qfs", "QFS", 20.0)).await;
    app.seed(&customer("cust-1", "Sam")).await;

    let created = as_user(app.server.post("/api/buildings"), "admin-1")
        .json(&json!({
            "name": "North Hall",
            "location": "Campus",
            "room_types": [{"name": "Studio", "prices": {"standard": 4000, "deep": 7000, "move_out": 9000}}],
            "assigned_provider_id": "p-qfs"
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let building: Value = created.json();
    assert_eq!(building["assigned_provider_name"], "QFS");
    let id = building["id"].as_str().unwrap().to_string();

    let listed: Value = as_user(app.server.get("/api/buildings"), "cust-1").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    as_user(app.server.put(&format!("/api/buildings/{id}")), "admin-1")
        .json(&json!({"name": "North Hall", "location": "Campus", "room_types": [], "assigned_provider_id": "cust-1"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    as_user(app.server.delete(&format!("/api/buildings/{id}")), "admin-1")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    as_user(app.server.get(&format!("/api/buildings/{id}")), "cust-1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_prices_from_building_and_aligns_provider() {
    let app = spawn_app(None);
    let qfs = provider("p-qfs", "QFS", 20.0);
    app.seed(&qfs).await;
    app.seed(&customer("cust-1", "Sam")).await;
    let hall = building("North Hall", Some(&qfs));
    app.harness.store.insert_building(&hall).await.unwrap();

    let response = as_user(app.server.post("/api/bookings"), "cust-1")
        .json(&json!({
            "building_id": hall.id,
            "apartment_type": "Studio",
            "room_counts": {"standard": 2, "deep": 1, "move_out": 0},
            "scheduled_date": "2025-02-01"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let booking: Value = response.json();
    assert_eq!(booking["price"], 15_000);
    assert_eq!(booking["status"], "Aligned");
    assert_eq!(booking["provider_id"], "p-qfs");
    assert_eq!(booking["service"], "Standard Clean x2, Deep Clean x1");

    as_user(app.server.post("/api/bookings"), "cust-1")
        .json(&json!({
            "building_id": hall.id,
            "apartment_type": "Penthouse",
            "room_counts": {"standard": 1, "deep": 0, "move_out": 0},
            "scheduled_date": "2025-02-01"
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_list_is_scoped_by_role() {
    let app = spawn_app(None);
    let qfs = provider("p-qfs", "QFS", 20.0);
    let sam = customer("cust-1", "Sam");
    app.seed(&qfs).await;
    app.seed(&sam).await;
    app.seed(&customer("cust-2", "Alex")).await;
    app.seed(&admin("admin-1")).await;
    app.harness.store.put_booking(BookingBuilder::new().customer(&sam).provider(&qfs).build());
    app.harness.store.put_booking(BookingBuilder::new().customer(&sam).build());

    let count = |body: Value| body.as_array().unwrap().len();
    assert_eq!(count(as_user(app.server.get("/api/bookings"), "cust-1").await.json()), 2);
    assert_eq!(count(as_user(app.server.get("/api/bookings"), "cust-2").await.json()), 0);
    assert_eq!(count(as_user(app.server.get("/api/bookings"), "p-qfs").await.json()), 1);
    assert_eq!(count(as_user(app.server.get("/api/bookings"), "admin-1").await.json()), 2);
}

#[tokio::test]
async fn test_provider_progress_moves_forward_only() {
    let app = spawn_app(None);
    let qfs = provider("p-qfs", "QFS", 20.0);
    app.seed(&qfs).await;
    app.seed(&provider("p-other", "Other", 10.0)).await;
    let booking = BookingBuilder::new().provider(&qfs).build();
    app.harness.store.put_booking(booking.clone());
    let path = format!("/api/bookings/{}/progress", booking.id);

    let response = as_user(app.server.put(&path), "p-qfs")
        .json(&json!({"status": "In Process", "before_images": ["https://img.test/before.jpg"]}))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["status"], "In Process");
    assert_eq!(updated["before_images"][0], "https://img.test/before.jpg");

    as_user(app.server.put(&path), "p-qfs")
        .json(&json!({"status": "Aligned"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    as_user(app.server.put(&path), "p-other")
        .json(&json!({"status": "Completed"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    assert_eq!(app.booking(&booking).await.status, BookingStatus::InProcess);
}

#[tokio::test]
async fn test_admin_assigns_provider() {
    let app = spawn_app(None);
    app.seed(&admin("admin-1")).await;
    app.seed(&provider("p-qfs", "QFS", 20.0)).await;
    let booking = BookingBuilder::new().build();
    app.harness.store.put_booking(booking.clone());

    let response = as_user(app.server.put(&format!("/api/admin/bookings/{}/provider", booking.id)), "admin-1")
        .json(&json!({"provider_id": "p-qfs"}))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["provider_name"], "QFS");
}

// ============================================================================
// Complaints
// ============================================================================

#[tokio::test]
async fn test_complaint_flow() {
    let app = spawn_app(None);
    let qfs = provider("p-qfs", "QFS", 20.0);
    let sam = customer("cust-1", "Sam");
    app.seed(&qfs).await;
    app.seed(&sam).await;
    app.seed(&customer("cust-2", "Alex")).await;
    let booking = BookingBuilder::new().customer(&sam).provider(&qfs).completed().build();
    app.harness.store.put_booking(booking.clone());

    as_user(app.server.post("/api/complaints"), "cust-2")
        .json(&json!({"booking_id": booking.id, "type": "damage", "text": "Broken lamp"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let filed = as_user(app.server.post("/api/complaints"), "cust-1")
        .json(&json!({"booking_id": booking.id, "type": "damage", "text": "Broken lamp"}))
        .await;
    filed.assert_status(StatusCode::CREATED);
    let complaint: Value = filed.json();
    assert_eq!(complaint["provider_id"], "p-qfs");
    assert_eq!(complaint["status"], "Pending");
    let id = complaint["id"].as_str().unwrap().to_string();

    let visible: Value = as_user(app.server.get("/api/complaints"), "p-qfs").await.json();
    assert_eq!(visible.as_array().unwrap().len(), 1);

    let path = format!("/api/complaints/{id}/responses");
    as_user(app.server.post(&path), "p-qfs")
        .json(&json!({"text": "We will replace it", "resolve": true}))
        .await
        .assert_status(StatusCode::CREATED);
    as_user(app.server.post(&path), "p-qfs")
        .json(&json!({"text": "Done", "resolve": true}))
        .await
        .assert_status(StatusCode::CONFLICT);
    as_user(app.server.post(&path), "cust-1")
        .json(&json!({"text": "Thanks"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let mine: Value = as_user(app.server.get("/api/complaints"), "cust-1").await.json();
    assert_eq!(mine[0]["status"], "Resolved");
    let responses: Value = as_user(app.server.get(&path), "cust-1").await.json();
    assert_eq!(responses.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_complaint_without_booking_needs_building() {
    let app = spawn_app(None);
    app.seed(&customer("cust-1", "Sam")).await;
    let response = as_user(app.server.post("/api/complaints"), "cust-1")
        .json(&json!({"type": "service_quality", "text": "Floors still dirty"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Invoice requests
// ============================================================================

#[tokio::test]
async fn test_one_pending_invoice_request_per_month() {
    let app = spawn_app(None);
    app.seed(&provider("p-qfs", "QFS", 20.0)).await;
    app.seed(&customer("cust-1", "Sam")).await;

    as_user(app.server.post("/api/invoice-requests"), "p-qfs")
        .json(&json!({"month": 1, "year": 2025}))
        .await
        .assert_status(StatusCode::CREATED);
    as_user(app.server.post("/api/invoice-requests"), "p-qfs")
        .json(&json!({"month": 1, "year": 2025}))
        .await
        .assert_status(StatusCode::CONFLICT);
    as_user(app.server.post("/api/invoice-requests"), "p-qfs")
        .json(&json!({"month": 13, "year": 2025}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let listed: Value = as_user(app.server.get("/api/invoice-requests"), "p-qfs").await.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    as_user(app.server.get("/api/invoice-requests"), "cust-1")
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Billing and payouts
// ============================================================================

struct BillingFixture {
    app: TestApp,
    payable: Vec<Booking>,
    already_paid: Booking,
}

/// QFS at 20% with $100 and $50 completed unpaid, $80 already paid, and one
/// job still in process.
async fn billing_fixture() -> BillingFixture {
    let app = spawn_app(None);
    let qfs = provider("p-qfs", "QFS", 20.0);
    app.seed(&qfs).await;
    app.seed(&admin("admin-1")).await;

    let first = BookingBuilder::new()
        .provider(&qfs)
        .price(Money::from_dollars(100))
        .date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap())
        .completed()
        .build();
    let second = BookingBuilder::new()
        .provider(&qfs)
        .price(Money::from_dollars(50))
        .date(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap())
        .completed()
        .build();
    let already_paid = BookingBuilder::new()
        .provider(&qfs)
        .price(Money::from_dollars(80))
        .completed()
        .paid()
        .build();
    let in_process = BookingBuilder::new()
        .provider(&qfs)
        .price(Money::from_dollars(70))
        .status(BookingStatus::InProcess)
        .build();
    for booking in [&first, &second, &already_paid, &in_process] {
        app.harness.store.put_booking(booking.clone());
    }

    BillingFixture {
        app,
        payable: vec![first, second],
        already_paid,
    }
}

#[tokio::test]
async fn test_billing_overview_nets_commission() {
    let BillingFixture { app, .. } = billing_fixture().await;

    let response = as_user(app.server.get("/api/admin/billing"), "admin-1").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let qfs = &body["providers"][0];
    assert_eq!(qfs["provider_id"], "p-qfs");
    assert_eq!(qfs["total_service_value"], 23_000);
    assert_eq!(qfs["total_payout_due"], 12_000);
    assert_eq!(qfs["commission_due"], 3_000);
    assert_eq!(qfs["unpaid"].as_array().unwrap().len(), 2);
    assert_eq!(body["totals"]["total_payout_due"], 12_000);
    assert_eq!(body["totals"]["total_service_value"], 23_000);
    assert_eq!(body["totals"]["commission_due"], 3_000);

    let own: Value = as_user(app.server.get("/api/provider/billing"), "p-qfs").await.json();
    assert_eq!(own["total_payout_due"], 12_000);
}

#[tokio::test]
async fn test_invoice_preview_is_a_pdf_download() {
    let BillingFixture { app, .. } = billing_fixture().await;

    let response = as_user(app.server.get("/api/admin/billing/p-qfs/invoice"), "admin-1").await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().contains("INV-PQFS-20250101000000.pdf"));
    assert!(response.as_bytes().starts_with(b"%PDF-"));

    as_user(app.server.get("/api/admin/billing/p-unknown/invoice"), "admin-1")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payout_run_sends_previewed_invoice_and_marks_bookings_paid() {
    let BillingFixture {
        app,
        payable,
        already_paid,
    } = billing_fixture().await;

    let preview: Value = as_user(app.server.get("/api/admin/billing/p-qfs/invoice?format=base64"), "admin-1")
        .await
        .json();

    let response = as_user(app.server.post("/api/admin/billing/p-qfs/payouts"), "admin-1")
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let receipt: Value = response.json();
    assert_eq!(receipt["payment"]["amount"], 12_000);
    assert_eq!(receipt["payment"]["status"], "committed");
    assert_eq!(receipt["notified"], "p-qfs@providers.test");

    let sent = app.harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    let attachment = sent[0].attachment.as_ref().expect("invoice attached");
    assert_eq!(attachment.content_base64, preview["pdf_base64"].as_str().unwrap());
    assert!(STANDARD.decode(&attachment.content_base64).unwrap().starts_with(b"%PDF-"));

    for booking in &payable {
        assert!(app.booking(booking).await.provider_paid);
    }
    assert!(app.booking(&already_paid).await.provider_paid);

    as_user(app.server.post("/api/admin/billing/p-qfs/payouts"), "admin-1")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let history: Value = as_user(app.server.get("/api/provider/payments"), "p-qfs").await.json();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payout_without_a_body_uses_defaults() {
    let BillingFixture { app, payable, .. } = billing_fixture().await;

    let response = as_user(app.server.post("/api/admin/billing/p-qfs/payouts"), "admin-1").await;
    response.assert_status_ok();
    let receipt: Value = response.json();
    assert_eq!(receipt["payment"]["amount"], 12_000);
    assert_eq!(receipt["payment"]["payment_date"], "2025-01-01");
    for booking in &payable {
        assert!(app.booking(booking).await.provider_paid);
    }
}

#[tokio::test]
async fn test_failed_delivery_leaves_bookings_unpaid() {
    let BillingFixture { app, payable, .. } = billing_fixture().await;
    app.harness.mailer.fail_with("relay returned 503");

    let response = as_user(app.server.post("/api/admin/billing/p-qfs/payouts"), "admin-1")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "DELIVERY_FAILED");
    assert!(!body["message"].as_str().unwrap().contains("503"));

    for booking in &payable {
        assert!(!app.booking(booking).await.provider_paid);
    }
    let payments: Value = as_user(app.server.get("/api/admin/payments?provider_id=p-qfs"), "admin-1")
        .await
        .json();
    assert_eq!(payments[0]["status"], "abandoned");

    app.harness.mailer.succeed();
    as_user(app.server.post("/api/admin/billing/p-qfs/payouts"), "admin-1")
        .json(&json!({}))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_direct_payment_rejects_double_payout() {
    let BillingFixture { app, payable, .. } = billing_fixture().await;
    let ids: Vec<_> = payable.iter().map(|b| b.id).collect();

    let recorded = as_user(app.server.post("/api/admin/payments"), "admin-1")
        .json(&json!({"provider_id": "p-qfs", "booking_ids": ids, "amount": "120.00", "payment_date": "2025-01-31"}))
        .await;
    recorded.assert_status(StatusCode::CREATED);
    let payment: Value = recorded.json();
    assert_eq!(payment["amount"], 12_000);
    assert_eq!(payment["provider_name"], "QFS");

    as_user(app.server.post("/api/admin/payments"), "admin-1")
        .json(&json!({"provider_id": "p-qfs", "booking_ids": ids, "amount": 120}))
        .await
        .assert_status(StatusCode::CONFLICT);
    as_user(app.server.post("/api/admin/payments"), "admin-1")
        .json(&json!({"provider_id": "p-qfs", "booking_ids": [], "amount": 0}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reconcile_with_nothing_pending() {
    let BillingFixture { app, .. } = billing_fixture().await;
    let response = as_user(app.server.post("/api/admin/payments/reconcile"), "admin-1").await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["committed"].as_array().unwrap().len(), 0);
    assert_eq!(report["failed"], 0);
}

// ============================================================================
// Order webhook
// ============================================================================

fn order_body() -> Vec<u8> {
    json!({
        "id": 9001,
        "date_created": "2025-01-05T09:30:00",
        "total": "80.00",
        "billing": {"first_name": "Jo", "last_name": "Doe", "email": "jo@students.test"},
        "meta_data": [{"key": "building", "value": "North Hall"}],
        "line_items": [{"name": "Standard Clean", "quantity": 2}]
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_webhook_ping_is_acknowledged() {
    let app = spawn_app(None);
    let response = app
        .server
        .post("/webhooks/orders")
        .bytes(Bytes::from_static(b"webhook_id=12"))
        .content_type("application/x-www-form-urlencoded")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["result"], "ping");
    assert_eq!(app.harness.store.booking_count(), 0);
}

#[tokio::test]
async fn test_webhook_creates_one_booking_per_order() {
    let app = spawn_app(None);

    let first = app.server.post("/webhooks/orders").bytes(Bytes::from(order_body())).await;
    first.assert_status(StatusCode::CREATED);
    let created: Value = first.json();
    assert_eq!(created["result"], "created");

    let again = app.server.post("/webhooks/orders").bytes(Bytes::from(order_body())).await;
    again.assert_status_ok();
    let duplicate: Value = again.json();
    assert_eq!(duplicate["result"], "duplicate");
    assert_eq!(duplicate["booking_id"], created["booking_id"]);
    assert_eq!(app.harness.store.booking_count(), 1);

    app.server
        .post("/webhooks/orders")
        .bytes(Bytes::from_static(b"not json"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_signature_is_enforced_when_configured() {
    let app = spawn_app(Some("shop-secret"));
    let body = order_body();

    app.server
        .post("/webhooks/orders")
        .bytes(Bytes::from(body.clone()))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/webhooks/orders")
        .bytes(Bytes::from(body.clone()))
        .add_header(HeaderName::from_static(SIGNATURE_HEADER), HeaderValue::from_static("bm9wZQ=="))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(app.harness.store.booking_count(), 0);

    let signature = SignatureVerifier::new("shop-secret").sign(&body);
    app.server
        .post("/webhooks/orders")
        .bytes(Bytes::from(body))
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .await
        .assert_status(StatusCode::CREATED);
}
