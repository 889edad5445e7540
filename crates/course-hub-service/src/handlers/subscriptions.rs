//! Course subscription handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use course_hub_core::CourseId;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Message returned when the course reference is missing.
pub const MISSING_COURSE_ID: &str = "Не указан ID курса";

/// Body naming the course to (un)subscribe.
#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    /// Course ID.
    #[serde(default)]
    pub course_id: Option<String>,
}

/// Toggle outcome.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Whether the caller is now subscribed.
    pub subscribed: bool,
}

/// Parse a required course reference from a request body.
pub fn required_course_id(raw: Option<&str>) -> Result<CourseId, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(MISSING_COURSE_ID.into()))?;
    Ok(raw.parse()?)
}

/// Subscribe to a course, or unsubscribe if already subscribed.
pub async fn toggle_subscription(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<SubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let course_id = required_course_id(req.course_id.as_deref())?;
    let user_id = current.principal.user_id;

    let outcome = state
        .store
        .toggle_subscription(&user_id, &course_id, Utc::now())?;

    tracing::info!(
        user_id = %user_id,
        course_id = %course_id,
        subscribed = outcome.is_subscribed(),
        "Subscription toggled"
    );

    Ok(Json(SubscriptionResponse {
        message: outcome.message().to_string(),
        subscribed: outcome.is_subscribed(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_course_id_is_rejected() {
        for raw in [None, Some(""), Some("   ")] {
            match required_course_id(raw) {
                Err(ApiError::BadRequest(msg)) => assert_eq!(msg, MISSING_COURSE_ID),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_course_id_is_rejected() {
        assert!(matches!(
            required_course_id(Some("not-a-uuid")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
