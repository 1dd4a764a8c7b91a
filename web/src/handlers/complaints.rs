//! Complaint endpoints.

use crate::error::AppError;
use crate::extractors::CurrentProfile;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dormclean_core::providers::ComplaintScope;
use dormclean_core::{
    BookingId, Complaint, ComplaintId, ComplaintResponse, ComplaintStatus, ComplaintType, Error, Profile, Role,
};
use serde::Deserialize;

/// Body of `POST /api/complaints`.
#[derive(Debug, Deserialize)]
pub struct NewComplaint {
    /// Booking concerned; its building and provider are copied
    pub booking_id: Option<BookingId>,
    /// Building name, required without a booking
    pub building: Option<String>,
    /// Category
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    /// What went wrong
    pub text: String,
    /// Photo URL
    pub image_url: Option<String>,
}

/// Body of `POST /api/complaints/:id/responses`.
#[derive(Debug, Deserialize)]
pub struct NewResponse {
    /// Response body
    pub text: String,
    /// Mark the complaint resolved
    #[serde(default)]
    pub resolve: bool,
}

fn can_view(caller: &Profile, complaint: &Complaint) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::Provider => complaint.provider_id.as_ref() == Some(&caller.id),
        Role::User => complaint.customer_id == caller.id,
    }
}

async fn load_complaint(state: &AppState, id: &ComplaintId) -> Result<Complaint, AppError> {
    state
        .complaints
        .get_complaint(id)
        .await?
        .ok_or_else(|| AppError::not_found("Complaint", id))
}

/// File a complaint.
///
/// # Errors
///
/// 403 for non-customers or someone else's booking; 404 for an unknown
/// booking; 400 for blank text or a missing building.
pub async fn create_complaint(
    State(state): State<AppState>,
    CurrentProfile(customer): CurrentProfile,
    Json(input): Json<NewComplaint>,
) -> Result<(StatusCode, Json<Complaint>), AppError> {
    if customer.role != Role::User {
        return Err(AppError::forbidden("Only customers can file complaints"));
    }

    let (building, provider_id, provider_name) = if let Some(booking_id) = &input.booking_id {
        let booking = state
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found("Booking", booking_id))?;
        if booking.customer_id.as_ref() != Some(&customer.id) {
            return Err(AppError::forbidden("This booking belongs to another customer"));
        }
        (booking.building, booking.provider_id, booking.provider_name)
    } else {
        let name = input
            .building
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| Error::validation("building", "building is required"))?;
        let assigned = state
            .buildings
            .list_buildings()
            .await?
            .into_iter()
            .find(|b| b.name.trim().eq_ignore_ascii_case(name.trim()));
        let (provider_id, provider_name) = assigned
            .map(|b| (b.assigned_provider_id, b.assigned_provider_name))
            .unwrap_or_default();
        (name, provider_id, provider_name)
    };

    let complaint = Complaint {
        id: ComplaintId::new(),
        customer_id: customer.id.clone(),
        customer_name: customer.name.clone(),
        booking_id: input.booking_id,
        building: building.trim().to_string(),
        complaint_type: input.complaint_type,
        text: input.text.trim().to_string(),
        image_url: input.image_url.filter(|u| !u.trim().is_empty()),
        status: ComplaintStatus::Pending,
        provider_id,
        provider_name,
        last_response_at: None,
        created_at: state.clock.now(),
    };
    complaint.validate()?;
    state.complaints.insert_complaint(&complaint).await?;

    tracing::info!(
        complaint_id = %complaint.id,
        customer_id = %customer.id,
        complaint_type = %complaint.complaint_type.as_str(),
        "Filed complaint"
    );
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// Complaints visible to the caller, scoped like bookings.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn list_complaints(
    State(state): State<AppState>,
    CurrentProfile(caller): CurrentProfile,
) -> Result<Json<Vec<Complaint>>, AppError> {
    let scope = match caller.role {
        Role::Admin => ComplaintScope::All,
        Role::Provider => ComplaintScope::Provider(caller.id),
        Role::User => ComplaintScope::Customer(caller.id),
    };
    Ok(Json(state.complaints.list_complaints(scope).await?))
}

/// Responses on one complaint, oldest first.
///
/// # Errors
///
/// 404 for an unknown complaint or one the caller may not see.
pub async fn list_responses(
    State(state): State<AppState>,
    CurrentProfile(caller): CurrentProfile,
    Path(id): Path<ComplaintId>,
) -> Result<Json<Vec<ComplaintResponse>>, AppError> {
    let complaint = load_complaint(&state, &id).await?;
    if !can_view(&caller, &complaint) {
        return Err(AppError::not_found("Complaint", id));
    }
    Ok(Json(state.complaints.list_responses(&id).await?))
}

/// Answer a complaint, optionally resolving it.
///
/// # Errors
///
/// 403 unless the caller is an admin or the provider concerned; 409 when
/// resolving an already resolved complaint.
pub async fn respond(
    State(state): State<AppState>,
    CurrentProfile(responder): CurrentProfile,
    Path(id): Path<ComplaintId>,
    Json(input): Json<NewResponse>,
) -> Result<(StatusCode, Json<ComplaintResponse>), AppError> {
    let mut complaint = load_complaint(&state, &id).await?;
    let response = complaint.respond(&responder, &input.text, input.resolve, state.clock.now())?;
    state.complaints.add_response(&complaint, &response).await?;

    tracing::info!(
        complaint_id = %complaint.id,
        responder_id = %responder.id,
        status = %complaint.status.as_str(),
        "Responded to complaint"
    );
    Ok((StatusCode::CREATED, Json(response)))
}
