//! Profile endpoints.
//!
//! A profile is created the first time an identity saves it and always
//! starts as a customer; providers are provisioned by an administrator.

use crate::error::AppError;
use crate::extractors::{Identity, RequireAdmin};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use dormclean_core::{CommissionRate, Error, Profile, ProfileId, Role};
use serde::Deserialize;

/// Body of `PUT /api/profile`.
#[derive(Debug, Deserialize)]
pub struct ProfileEdit {
    /// Display name; required on first save
    pub name: Option<String>,
    /// Contact e-mail; required on first save
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
}

/// Query of `GET /api/admin/profiles`.
#[derive(Debug, Deserialize)]
pub struct ProfileFilter {
    /// `user`, `provider` or `admin`
    pub role: Option<String>,
}

/// Body of `POST /api/admin/providers`.
#[derive(Debug, Deserialize)]
pub struct NewProvider {
    /// Identity id the provider signs in with
    pub id: String,
    /// Company or trading name
    pub name: String,
    /// Invoice recipient
    pub email: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Platform commission, 0 to 100
    pub commission_percentage: f64,
}

/// Body of `PUT /api/admin/providers/:id/commission`.
#[derive(Debug, Deserialize)]
pub struct CommissionUpdate {
    /// Platform commission, 0 to 100
    pub commission_percentage: f64,
}

/// The caller's profile.
///
/// # Errors
///
/// 404 when the identity has no profile yet.
pub async fn get_profile(
    State(state): State<AppState>,
    Identity(id): Identity,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .profiles
        .get_profile(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", &id))?;
    Ok(Json(profile))
}

/// Create the caller's profile on first sign-in, or edit it.
///
/// The role is never changed here.
///
/// # Errors
///
/// 400 for a blank name or malformed e-mail.
pub async fn save_profile(
    State(state): State<AppState>,
    Identity(id): Identity,
    Json(edit): Json<ProfileEdit>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let now = state.clock.now();

    if let Some(mut profile) = state.profiles.get_profile(&id).await? {
        profile.apply_edit(edit.name, edit.email, edit.phone, now)?;
        state.profiles.save_profile(&profile).await?;
        tracing::info!(profile_id = %profile.id, "Updated profile");
        return Ok((StatusCode::OK, Json(profile)));
    }

    let name = edit.name.ok_or_else(|| Error::validation("name", "name is required"))?;
    let email = edit.email.ok_or_else(|| Error::validation("email", "email is required"))?;
    let profile = Profile::new(id, name, email, edit.phone, Role::User, None, now)?;
    state.profiles.save_profile(&profile).await?;
    tracing::info!(profile_id = %profile.id, "Created profile on first sign-in");
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Every profile, optionally filtered by role.
///
/// # Errors
///
/// 400 for an unknown role.
pub async fn list_profiles(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<ProfileFilter>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let role = filter.role.as_deref().map(str::parse::<Role>).transpose()?;
    Ok(Json(state.profiles.list_profiles(role).await?))
}

/// Provision a provider profile.
///
/// # Errors
///
/// 409 when the identity already has a profile; 400 for invalid fields.
pub async fn create_provider(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<NewProvider>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let id = ProfileId::new(input.id.trim());
    if state.profiles.get_profile(&id).await?.is_some() {
        return Err(AppError::conflict(format!("a profile already exists for {id}")));
    }

    let commission = CommissionRate::from_percent(input.commission_percentage)?;
    let profile = Profile::new(
        id,
        input.name,
        input.email,
        input.phone,
        Role::Provider,
        Some(commission),
        state.clock.now(),
    )?;
    state.profiles.save_profile(&profile).await?;

    tracing::info!(
        admin_id = %admin.id,
        provider_id = %profile.id,
        commission_bps = commission.basis_points(),
        "Provisioned provider"
    );
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Change a provider's commission. Applies to bookings not yet paid out.
///
/// # Errors
///
/// 404 for an unknown profile; 400 for a non-provider or an out-of-range rate.
pub async fn set_commission(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(provider_id): Path<String>,
    Json(update): Json<CommissionUpdate>,
) -> Result<Json<Profile>, AppError> {
    let id = ProfileId::new(provider_id);
    let mut profile = state
        .profiles
        .get_profile(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", &id))?;

    let commission = CommissionRate::from_percent(update.commission_percentage)?;
    profile.set_commission(commission, state.clock.now())?;
    state.profiles.save_profile(&profile).await?;

    tracing::info!(
        admin_id = %admin.id,
        provider_id = %profile.id,
        commission_bps = commission.basis_points(),
        "Updated provider commission"
    );
    Ok(Json(profile))
}
