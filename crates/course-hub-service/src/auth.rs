//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - a valid bearer token, whether or not a profile exists
//! - `CurrentUser` - a valid bearer token of an active, registered user,
//!   with roles resolved into a `Principal`
//! - `AdminAuth` - admin authentication for privileged endpoints

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use course_hub_core::{Principal, User, UserId};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims accepted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Audience.
    pub aud: String,
    /// Expiration time (Unix).
    pub exp: i64,
    /// Issued at (Unix).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Validate an HS256 bearer token against the configured secret and audience.
pub fn validate_jwt(token: &str, config: &ServiceConfig) -> Result<JwtClaims, ApiError> {
    let secret = config.jwt_secret.as_ref().ok_or_else(|| {
        tracing::warn!("AUTH_JWT_SECRET not configured; rejecting bearer token");
        ApiError::Unauthorized
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&config.auth_audience]);
    validation.set_required_spec_claims(&["exp", "sub", "aud"]);

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(data.claims)
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

/// An authenticated token holder.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID from the token subject.
    pub user_id: UserId,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_jwt(token, &state.config)?;

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Self { user_id })
    }
}

/// An authenticated, registered and active user.
///
/// Roles are resolved once here; handlers evaluate policy against
/// `principal` without further lookups. `last_login` is refreshed at most
/// once per hour.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The stored profile.
    pub user: User,
    /// Identity plus resolved roles.
    pub principal: Principal,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user_id } = AuthUser::from_request_parts(parts, state).await?;

        let user = state
            .store
            .get_user(&user_id)?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Token subject is unknown or inactive");
                ApiError::Unauthorized
            })?;

        let now = Utc::now();
        if user.needs_login_refresh(now) {
            state.store.record_login(&user_id, now)?;
        }

        let principal = Principal::from_user(&user);
        Ok(Self { user, principal })
    }
}

/// Admin authentication via API key.
///
/// Requires the `X-Admin-Key` header to match the configured admin key.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if admin_key != expected_key {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(Self { admin_id })
    }
}
