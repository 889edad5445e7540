//! Admin handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use course_hub_core::UserId;

use super::users::UserResponse;
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::sweep::deactivate_inactive_users;

/// Moderator membership change.
#[derive(Debug, Deserialize)]
pub struct ModeratorRequest {
    /// Whether the user should be a moderator.
    pub moderator: bool,
}

/// Grant or revoke moderator rights.
pub async fn set_moderator(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(id): Path<String>,
    Json(req): Json<ModeratorRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id: UserId = id.parse()?;
    let user = state
        .store
        .update_user(&user_id, &mut |user| user.set_moderator(req.moderator))?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        moderator = req.moderator,
        "Moderator membership changed"
    );

    Ok(Json(UserResponse::from(user)))
}

/// Sweep result.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    /// Users deactivated by this run.
    pub deactivated: usize,
}

/// Run the inactive-user sweep now.
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
) -> Result<Json<SweepResponse>, ApiError> {
    let deactivated = deactivate_inactive_users(
        state.store.as_ref(),
        state.config.inactivity_days,
        Utc::now(),
    )?;

    tracing::info!(admin_id = %admin.admin_id, deactivated, "Manual inactive-user sweep");

    Ok(Json(SweepResponse { deactivated }))
}
