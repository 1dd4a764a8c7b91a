//! Building endpoints. Everyone signed in can read; admins write.

use crate::error::AppError;
use crate::extractors::{CurrentProfile, RequireAdmin};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use dormclean_core::{Building, BuildingId, Error, ProfileId, RoomType};
use serde::Deserialize;

/// Body of `POST /api/buildings` and `PUT /api/buildings/:id`.
#[derive(Debug, Deserialize)]
pub struct BuildingInput {
    /// Display name
    pub name: String,
    /// Address or campus location
    pub location: String,
    /// Offered layouts with their prices
    pub room_types: Vec<RoomType>,
    /// Provider serving the building
    pub assigned_provider_id: Option<String>,
}

/// Resolve the assigned provider to `(id, current name)`.
async fn resolve_provider(state: &AppState, id: Option<&str>) -> Result<Option<(ProfileId, String)>, AppError> {
    let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let id = ProfileId::new(id);
    match state.profiles.get_profile(&id).await? {
        Some(profile) if profile.is_provider() => Ok(Some((profile.id, profile.name))),
        _ => Err(Error::validation("assigned_provider_id", format!("{id} is not a provider")).into()),
    }
}

fn apply(building: &mut Building, input: BuildingInput, provider: Option<(ProfileId, String)>) {
    building.name = input.name.trim().to_string();
    building.location = input.location.trim().to_string();
    building.room_types = input.room_types;
    let (id, name) = provider.unzip();
    building.assigned_provider_id = id;
    building.assigned_provider_name = name;
}

/// Every building, by name.
///
/// # Errors
///
/// 500 when the store fails.
pub async fn list_buildings(
    State(state): State<AppState>,
    CurrentProfile(_caller): CurrentProfile,
) -> Result<Json<Vec<Building>>, AppError> {
    Ok(Json(state.buildings.list_buildings().await?))
}

/// One building.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_building(
    State(state): State<AppState>,
    CurrentProfile(_caller): CurrentProfile,
    Path(id): Path<BuildingId>,
) -> Result<Json<Building>, AppError> {
    let building = state
        .buildings
        .get_building(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Building", id))?;
    Ok(Json(building))
}

/// Create a building.
///
/// # Errors
///
/// 400 for invalid fields or an assigned profile that is not a provider.
pub async fn create_building(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<BuildingInput>,
) -> Result<(StatusCode, Json<Building>), AppError> {
    let provider = resolve_provider(&state, input.assigned_provider_id.as_deref()).await?;
    let now = state.clock.now();
    let mut building = Building {
        id: BuildingId::new(),
        name: String::new(),
        location: String::new(),
        room_types: Vec::new(),
        assigned_provider_id: None,
        assigned_provider_name: None,
        created_at: now,
        updated_at: now,
    };
    apply(&mut building, input, provider);
    building.validate()?;
    state.buildings.insert_building(&building).await?;

    tracing::info!(admin_id = %admin.id, building_id = %building.id, name = %building.name, "Created building");
    Ok((StatusCode::CREATED, Json(building)))
}

/// Replace a building's editable fields.
///
/// # Errors
///
/// 404 for an unknown id; 400 for invalid fields.
pub async fn update_building(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<BuildingId>,
    Json(input): Json<BuildingInput>,
) -> Result<Json<Building>, AppError> {
    let mut building = state
        .buildings
        .get_building(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Building", id))?;
    let provider = resolve_provider(&state, input.assigned_provider_id.as_deref()).await?;

    apply(&mut building, input, provider);
    building.updated_at = state.clock.now();
    building.validate()?;
    state.buildings.update_building(&building).await?;

    tracing::info!(admin_id = %admin.id, building_id = %building.id, "Updated building");
    Ok(Json(building))
}

/// Delete a building. Bookings keep their building name snapshot.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn delete_building(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<BuildingId>,
) -> Result<StatusCode, AppError> {
    state.buildings.delete_building(&id).await?;
    tracing::info!(admin_id = %admin.id, building_id = %id, "Deleted building");
    Ok(StatusCode::NO_CONTENT)
}
