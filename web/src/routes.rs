//! Router composition.

use crate::handlers::{
    billing, bookings, buildings, complaints, health, invoice_requests, payments, profiles, webhooks,
};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the application router with every endpoint.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness
/// - `POST /webhooks/orders` - Order webhook, signature checked
///
/// ## Signed in
/// - `GET|PUT /api/profile` - Own profile
/// - `GET /api/buildings`, `GET /api/buildings/:id`
/// - `GET|POST /api/bookings` - Scoped list, checkout
/// - `PUT /api/bookings/:id/progress` - Provider progress
/// - `GET|POST /api/complaints`, `GET|POST /api/complaints/:id/responses`
/// - `GET|POST /api/invoice-requests`
/// - `GET /api/provider/billing`, `GET /api/provider/payments`
///
/// ## Admin
/// - `GET /api/admin/profiles`, `POST /api/admin/providers`,
///   `PUT /api/admin/providers/:id/commission`
/// - `POST /api/buildings`, `PUT|DELETE /api/buildings/:id`
/// - `PUT /api/admin/bookings/:id/provider`
/// - `GET /api/admin/billing`, `GET /api/admin/billing/:provider_id/invoice`,
///   `POST /api/admin/billing/:provider_id/payouts`
/// - `GET|POST /api/admin/payments`, `POST /api/admin/payments/reconcile`
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Profiles
        .route("/profile", get(profiles::get_profile).put(profiles::save_profile))
        .route("/admin/profiles", get(profiles::list_profiles))
        .route("/admin/providers", post(profiles::create_provider))
        .route("/admin/providers/:id/commission", put(profiles::set_commission))
        // Buildings
        .route("/buildings", get(buildings::list_buildings).post(buildings::create_building))
        .route(
            "/buildings/:id",
            get(buildings::get_building)
                .put(buildings::update_building)
                .delete(buildings::delete_building),
        )
        // Bookings
        .route("/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/bookings/:id/progress", put(bookings::record_progress))
        .route("/admin/bookings/:id/provider", put(bookings::assign_provider))
        // Complaints
        .route("/complaints", get(complaints::list_complaints).post(complaints::create_complaint))
        .route(
            "/complaints/:id/responses",
            get(complaints::list_responses).post(complaints::respond),
        )
        // Invoice requests
        .route(
            "/invoice-requests",
            get(invoice_requests::list_invoice_requests).post(invoice_requests::create_invoice_request),
        )
        // Billing
        .route("/admin/billing", get(billing::overview))
        .route("/admin/billing/:provider_id/invoice", get(billing::invoice_preview))
        .route("/admin/billing/:provider_id/payouts", post(billing::run_payout))
        .route("/provider/billing", get(billing::own_billing))
        // Payments
        .route("/admin/payments", get(payments::list_payments).post(payments::record_payment))
        .route("/admin/payments/reconcile", post(payments::reconcile))
        .route("/provider/payments", get(payments::own_payments));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/webhooks/orders", post(webhooks::receive_order))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
