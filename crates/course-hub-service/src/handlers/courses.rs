//! Course handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use course_hub_core::{
    authorize, authorize_object, validate_price, validate_rating, validate_title, Action, Course,
    CourseId, Principal, UserId,
};

use super::lessons::LessonResponse;
use super::{PageQuery, Paginated};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Course representation returned by the API.
#[derive(Debug, Serialize)]
pub struct CourseResponse {
    /// Course ID.
    pub id: CourseId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Creator.
    pub owner: Option<UserId>,
    /// Price in major units, if set.
    pub price: Option<Decimal>,
    /// Rating, 0 when unrated.
    pub rating: u8,
    /// Number of lessons.
    pub lessons_count: usize,
    /// Lessons, oldest first.
    pub lessons: Vec<LessonResponse>,
    /// Whether the caller created the course.
    pub is_owner: bool,
    /// Whether the caller is subscribed.
    pub is_subscribed: bool,
    /// Last time subscribers were notified.
    pub last_notification_sent: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl CourseResponse {
    fn build(state: &AppState, principal: &Principal, course: Course) -> Result<Self, ApiError> {
        let lessons: Vec<LessonResponse> = state
            .store
            .list_lessons_by_course(&course.id)?
            .into_iter()
            .map(LessonResponse::from)
            .collect();
        let is_subscribed = state.store.is_subscribed(&principal.user_id, &course.id)?;

        Ok(Self {
            id: course.id,
            is_owner: course.owner == Some(principal.user_id),
            title: course.title,
            description: course.description,
            owner: course.owner,
            price: course.price,
            rating: course.rating,
            lessons_count: lessons.len(),
            lessons,
            is_subscribed,
            last_notification_sent: course.last_notification_sent,
            created_at: course.created_at,
        })
    }
}

/// Create or replace a course.
#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    /// Title, 1 to 150 characters.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Price in major units.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Rating, 1 to 5.
    #[serde(default)]
    pub rating: Option<u8>,
}

/// Partial course update.
#[derive(Debug, Deserialize)]
pub struct CoursePatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New price.
    pub price: Option<Decimal>,
    /// New rating.
    pub rating: Option<u8>,
}

fn checked_price(price: Option<Decimal>) -> Result<Option<Decimal>, ApiError> {
    Ok(price.map(validate_price).transpose()?)
}

fn checked_rating(rating: Option<u8>) -> Result<u8, ApiError> {
    Ok(rating.map(validate_rating).transpose()?.unwrap_or(0))
}

fn load_course(state: &AppState, id: &str) -> Result<Course, ApiError> {
    let course_id: CourseId = id.parse()?;
    state
        .store
        .get_course(&course_id)?
        .ok_or_else(|| ApiError::NotFound(format!("course not found: {course_id}")))
}

/// Stamp the course and enqueue a notification unless one went out recently.
pub(crate) fn notify_course_updated(state: &AppState, course_id: &CourseId) -> Result<(), ApiError> {
    state
        .notifier
        .course_updated(state.store.as_ref(), course_id, Utc::now())?;
    Ok(())
}

/// List courses.
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CourseResponse>>, ApiError> {
    authorize(&current.principal, Action::ViewCourse).into_result()?;

    let (limit, offset) = query.window()?;
    let page = state.store.list_courses(limit, offset)?;

    let courses = page
        .items
        .into_iter()
        .map(|course| CourseResponse::build(&state, &current.principal, course))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Paginated::from_page(
        query,
        course_hub_store::Page {
            items: courses,
            total: page.total,
        },
        |c| c,
    )?))
}

/// Create a course owned by the caller.
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ApiError> {
    authorize(&current.principal, Action::CreateCourse).into_result()?;

    let mut course = Course::new(
        current.principal.user_id,
        &req.title,
        req.description,
        Utc::now(),
    )?;
    course.price = checked_price(req.price)?;
    course.rating = checked_rating(req.rating)?;

    state.store.put_course(&course)?;

    tracing::info!(
        course_id = %course.id,
        user_id = %current.principal.user_id,
        "Course created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse::build(&state, &current.principal, course)?),
    ))
}

/// Retrieve one course.
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CourseResponse>, ApiError> {
    let course = load_course(&state, &id)?;
    authorize_object(&current.principal, Action::ViewCourse, &course).into_result()?;

    Ok(Json(CourseResponse::build(&state, &current.principal, course)?))
}

/// Replace a course.
pub async fn replace_course(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CourseRequest>,
) -> Result<Json<CourseResponse>, ApiError> {
    let course = load_course(&state, &id)?;
    authorize_object(&current.principal, Action::UpdateCourse, &course).into_result()?;

    let title = validate_title(&req.title)?;
    let price = checked_price(req.price)?;
    let rating = checked_rating(req.rating)?;

    let course = state.store.update_course(&course.id, &mut |course| {
        course.title.clone_from(&title);
        course.description.clone_from(&req.description);
        course.price = price;
        course.rating = rating;
    })?;
    tracing::info!(course_id = %course.id, user_id = %current.principal.user_id, "Course replaced");

    notify_course_updated(&state, &course.id)?;
    let course = state.store.get_course(&course.id)?.unwrap_or(course);
    Ok(Json(CourseResponse::build(&state, &current.principal, course)?))
}

/// Partially update a course.
pub async fn update_course(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<CoursePatch>,
) -> Result<Json<CourseResponse>, ApiError> {
    let course = load_course(&state, &id)?;
    authorize_object(&current.principal, Action::UpdateCourse, &course).into_result()?;

    let title = patch.title.as_deref().map(validate_title).transpose()?;
    let price = patch.price.map(|price| checked_price(Some(price))).transpose()?;
    let rating = patch.rating.map(validate_rating).transpose()?;

    let course = state.store.update_course(&course.id, &mut |course| {
        if let Some(title) = &title {
            course.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            course.description.clone_from(description);
        }
        if let Some(price) = price {
            course.price = price;
        }
        if let Some(rating) = rating {
            course.rating = rating;
        }
    })?;
    tracing::info!(course_id = %course.id, user_id = %current.principal.user_id, "Course updated");

    notify_course_updated(&state, &course.id)?;
    let course = state.store.get_course(&course.id)?.unwrap_or(course);
    Ok(Json(CourseResponse::build(&state, &current.principal, course)?))
}

/// Delete a course with its lessons, subscriptions and payments.
pub async fn delete_course(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let course = load_course(&state, &id)?;
    authorize_object(&current.principal, Action::DeleteCourse, &course).into_result()?;

    state.store.delete_course(&course.id)?;
    tracing::info!(course_id = %course.id, user_id = %current.principal.user_id, "Course deleted");

    Ok(StatusCode::NO_CONTENT)
}
