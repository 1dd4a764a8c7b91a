//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id
//! - [`BearerToken`]: the raw `Authorization: Bearer` token
//! - [`Identity`]: the verified identity id, profile or not
//! - [`CurrentProfile`]: the caller's stored profile
//! - [`RequireAdmin`] / [`RequireProvider`]: a profile with that role
//!
//! # Example
//!
//! ```ignore
//! async fn handler(RequireAdmin(admin): RequireAdmin) -> Result<Json<Vec<Profile>>, AppError> {
//!     tracing::info!(admin_id = %admin.id, "Listing profiles");
//!     ...
//! }
//! ```

use crate::error::AppError;
use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use dormclean_core::{Profile, ProfileId};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Set by the correlation middleware; outside it, read from the
/// `X-Correlation-ID` header or generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }
        Ok(Self(crate::middleware::incoming_id(&parts.headers).unwrap_or_else(Uuid::new_v4)))
    }
}

/// Bearer token extracted from `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'"))?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// Verified identity id of the caller, who may not have a profile yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub ProfileId);

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let id = state
            .identity
            .verify(&token)
            .await
            .map_err(|rejected| AppError::unauthorized(rejected.0))?;
        Ok(Self(id))
    }
}

/// The caller's stored profile.
///
/// Rejects with 403 when the identity has not completed sign-in.
#[derive(Debug, Clone)]
pub struct CurrentProfile(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentProfile {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Identity(id) = Identity::from_request_parts(parts, state).await?;
        let profile = state
            .profiles
            .get_profile(&id)
            .await?
            .ok_or_else(|| AppError::forbidden("Complete your profile before continuing"))?;
        Ok(Self(profile))
    }
}

/// Require admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentProfile(profile) = CurrentProfile::from_request_parts(parts, state).await?;
        if !profile.is_admin() {
            tracing::warn!(profile_id = %profile.id, "Admin route refused");
            return Err(AppError::forbidden("Administrator access required"));
        }
        Ok(Self(profile))
    }
}

/// Require provider role.
#[derive(Debug, Clone)]
pub struct RequireProvider(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for RequireProvider {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentProfile(profile) = CurrentProfile::from_request_parts(parts, state).await?;
        if !profile.is_provider() {
            return Err(AppError::forbidden("Provider access required"));
        }
        Ok(Self(profile))
    }
}
