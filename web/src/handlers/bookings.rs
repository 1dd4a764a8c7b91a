//! Booking endpoints: checkout, scoped listing, provider progress and
//! admin assignment.

use crate::error::AppError;
use crate::extractors::{CurrentProfile, RequireAdmin, RequireProvider};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dormclean_core::building::ServiceType;
use dormclean_core::{
    Apartment, Booking, BookingId, BookingStatus, BuildingId, NaiveDate, NewBooking, ProfileId, Role, RoomCounts,
};
use serde::Deserialize;

/// Body of `POST /api/bookings`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Building booked
    pub building_id: BuildingId,
    /// Floor
    pub floor: Option<String>,
    /// Room type name, must be offered by the building
    pub apartment_type: String,
    /// Unit number
    pub apartment_number: Option<String>,
    /// Rooms per service
    pub room_counts: RoomCounts,
    /// Service day
    pub scheduled_date: NaiveDate,
    /// Time slot
    pub scheduled_time: Option<String>,
    /// Recurrence
    pub frequency: Option<String>,
}

/// Body of `PUT /api/bookings/:id/progress`.
#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    /// New status; forward moves only
    pub status: Option<BookingStatus>,
    /// Photo URLs taken before the job
    #[serde(default)]
    pub before_images: Vec<String>,
    /// Photo URLs taken after the job
    #[serde(default)]
    pub after_images: Vec<String>,
}

/// Body of `PUT /api/admin/bookings/:id/provider`.
#[derive(Debug, Deserialize)]
pub struct AssignProvider {
    /// Provider profile id
    pub provider_id: String,
}

/// "Standard Clean x2, Deep Clean x1" for the booked categories.
fn describe(counts: &RoomCounts) -> String {
    ServiceType::ALL
        .iter()
        .filter(|service| counts.get(**service) > 0)
        .map(|service| format!("{} x{}", service.label(), counts.get(*service)))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn load_booking(state: &AppState, id: &BookingId) -> Result<Booking, AppError> {
    state
        .bookings
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking", id))
}

/// Check out a booking. The price is quoted from the building's price list
/// and frozen on the booking.
///
/// # Errors
///
/// 403 for non-customers; 404 for an unknown building; 400 for an unknown
/// room type or no rooms.
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentProfile(customer): CurrentProfile,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    if customer.role != Role::User {
        return Err(AppError::forbidden("Only customers can book cleanings"));
    }
    let building = state
        .buildings
        .get_building(&request.building_id)
        .await?
        .ok_or_else(|| AppError::not_found("Building", request.building_id))?;
    let price = building.quote(&request.apartment_type, &request.room_counts)?;

    let provider = building
        .assigned_provider_id
        .clone()
        .zip(building.assigned_provider_name.clone());
    let booking = Booking::new(
        NewBooking {
            customer_id: Some(customer.id.clone()),
            customer_name: customer.name.clone(),
            customer_email: Some(customer.email.clone()),
            building_id: Some(building.id),
            building: building.name.clone(),
            apartment: Apartment {
                floor: request.floor,
                apartment_type: Some(request.apartment_type),
                apartment_number: request.apartment_number,
            },
            service: describe(&request.room_counts),
            room_counts: request.room_counts,
            scheduled_date: Some(request.scheduled_date),
            scheduled_time: request.scheduled_time,
            frequency: request.frequency,
            price,
            provider,
            external_order_id: None,
        },
        state.clock.now(),
    )?;
    state.bookings.insert_booking(&booking).await?;

    tracing::info!(
        booking_id = %booking.id,
        customer_id = %customer.id,
        building = %booking.building,
        price = booking.price.cents(),
        "Booked cleaning"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Bookings visible to the caller: a customer's own, a provider's assigned,
/// or all of them for an admin.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn list_bookings(
    State(state): State<AppState>,
    CurrentProfile(caller): CurrentProfile,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = match caller.role {
        Role::Admin => state.bookings.list_bookings().await?,
        Role::Provider => state.bookings.list_bookings_for_provider(&caller.id).await?,
        Role::User => state.bookings.list_bookings_for_customer(&caller.id).await?,
    };
    Ok(Json(bookings))
}

/// Record progress on an assigned booking.
///
/// # Errors
///
/// 403 when the booking is not assigned to the caller; 400 for a backward
/// status move or a bad image URL.
pub async fn record_progress(
    State(state): State<AppState>,
    RequireProvider(provider): RequireProvider,
    Path(id): Path<BookingId>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<Booking>, AppError> {
    let mut booking = load_booking(&state, &id).await?;
    if !booking.is_assigned_to(&provider.id) {
        return Err(AppError::forbidden("This booking is not assigned to you"));
    }

    let previous = booking.status;
    booking.record_progress(update.status, update.before_images, update.after_images, state.clock.now())?;
    state.bookings.update_booking(&booking).await?;

    tracing::info!(
        booking_id = %booking.id,
        provider_id = %provider.id,
        from = %previous.as_str(),
        to = %booking.status.as_str(),
        "Recorded booking progress"
    );
    Ok(Json(booking))
}

/// Assign or reassign the provider of a booking.
///
/// # Errors
///
/// 404 for an unknown booking or profile; 400 when the profile is not a
/// provider; 409 when the booking was already paid out.
pub async fn assign_provider(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<BookingId>,
    Json(input): Json<AssignProvider>,
) -> Result<Json<Booking>, AppError> {
    let provider_id = ProfileId::new(input.provider_id);
    let provider = state
        .profiles
        .get_profile(&provider_id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", &provider_id))?;
    let mut booking = load_booking(&state, &id).await?;

    booking.assign_provider(&provider, state.clock.now())?;
    state.bookings.update_booking(&booking).await?;

    tracing::info!(admin_id = %admin.id, booking_id = %booking.id, provider_id = %provider.id, "Assigned provider");
    Ok(Json(booking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_lists_booked_services() {
        let counts = RoomCounts {
            standard: 2,
            deep: 0,
            move_out: 1,
        };
        assert_eq!(describe(&counts), "Standard Clean x2, Move-out Clean x1");
    }
}
