//! User profile handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use course_hub_core::{validate_email, User, UserId};

use crate::auth::{AuthUser, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

/// User profile returned by the API.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub id: UserId,
    /// Email.
    pub email: String,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Phone.
    pub phone: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Member of the moderator group.
    pub is_moderator: bool,
    /// Account is active.
    pub is_active: bool,
    /// Registration time.
    pub date_joined: DateTime<Utc>,
    /// Last authenticated request.
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            is_moderator: user.is_moderator(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            city: user.city,
            is_active: user.is_active,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email, unique across users.
    pub email: String,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Phone.
    pub phone: Option<String>,
    /// City.
    pub city: Option<String>,
}

/// Partial profile update.
#[derive(Debug, Deserialize)]
pub struct ProfilePatch {
    /// New email.
    pub email: Option<String>,
    /// New first name.
    pub first_name: Option<String>,
    /// New last name.
    pub last_name: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New city.
    pub city: Option<String>,
}

/// Register the profile of the token subject.
pub async fn register(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let now = Utc::now();
    let mut user = User::new(auth.user_id, &req.email, now)?;
    user.first_name = req.first_name;
    user.last_name = req.last_name;
    user.phone = req.phone;
    user.city = req.city;
    user.last_login = Some(now);

    state.store.insert_user(&user)?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Get the caller's profile.
pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(current.user))
}

/// Update the caller's profile.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = patch.email.as_deref().map(validate_email).transpose()?;

    let user = state.store.update_user(&current.user.id, &mut |user| {
        if let Some(email) = &email {
            user.email.clone_from(email);
        }
        if patch.first_name.is_some() {
            user.first_name.clone_from(&patch.first_name);
        }
        if patch.last_name.is_some() {
            user.last_name.clone_from(&patch.last_name);
        }
        if patch.phone.is_some() {
            user.phone.clone_from(&patch.phone);
        }
        if patch.city.is_some() {
            user.city.clone_from(&patch.city);
        }
    })?;
    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(UserResponse::from(user)))
}

/// Delete the caller together with everything they own.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.store.delete_user(&current.user.id)?;
    tracing::info!(user_id = %current.user.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
