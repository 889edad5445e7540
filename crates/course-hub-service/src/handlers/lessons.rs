//! Lesson handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use course_hub_core::{
    authorize, authorize_object, validate_title, validate_video_url, Action, CourseId, Lesson,
    LessonId, UserId,
};

use super::courses::notify_course_updated;
use super::{PageQuery, Paginated};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Lesson representation returned by the API.
#[derive(Debug, Serialize)]
pub struct LessonResponse {
    /// Lesson ID.
    pub id: LessonId,
    /// Parent course.
    pub course: CourseId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Video link.
    pub video_url: String,
    /// Creator.
    pub owner: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Lesson> for LessonResponse {
    fn from(lesson: Lesson) -> Self {
        Self {
            id: lesson.id,
            course: lesson.course,
            title: lesson.title,
            description: lesson.description,
            video_url: lesson.video_url,
            owner: lesson.owner,
            created_at: lesson.created_at,
        }
    }
}

/// Create or replace a lesson.
#[derive(Debug, Deserialize)]
pub struct LessonRequest {
    /// Parent course ID.
    pub course: String,
    /// Title, 1 to 150 characters.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Video link on an allowed host.
    pub video_url: String,
}

/// Partial lesson update.
#[derive(Debug, Deserialize)]
pub struct LessonPatch {
    /// New parent course ID.
    pub course: Option<String>,
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New video link.
    pub video_url: Option<String>,
}

/// Resolve a course reference from a request body.
///
/// An unknown course is a validation error here, not a missing resource.
fn existing_course(state: &AppState, raw: &str) -> Result<CourseId, ApiError> {
    let course_id: CourseId = raw.parse()?;
    if state.store.get_course(&course_id)?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "course: no course with id {course_id}"
        )));
    }
    Ok(course_id)
}

fn load_lesson(state: &AppState, id: &str) -> Result<Lesson, ApiError> {
    let lesson_id: LessonId = id.parse()?;
    state
        .store
        .get_lesson(&lesson_id)?
        .ok_or_else(|| ApiError::NotFound(format!("lesson not found: {lesson_id}")))
}

/// List lessons across all courses.
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<LessonResponse>>, ApiError> {
    authorize(&current.principal, Action::ViewLesson).into_result()?;

    let (limit, offset) = query.window()?;
    let page = state.store.list_lessons(limit, offset)?;

    Ok(Json(Paginated::from_page(query, page, LessonResponse::from)?))
}

/// Create a lesson owned by the caller.
pub async fn create_lesson(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<LessonRequest>,
) -> Result<(StatusCode, Json<LessonResponse>), ApiError> {
    authorize(&current.principal, Action::CreateLesson).into_result()?;

    let course_id = existing_course(&state, &req.course)?;
    let lesson = Lesson::new(
        current.principal.user_id,
        course_id,
        &req.title,
        req.description,
        &req.video_url,
        Utc::now(),
    )?;

    state.store.put_lesson(&lesson)?;

    tracing::info!(
        lesson_id = %lesson.id,
        course_id = %course_id,
        user_id = %current.principal.user_id,
        "Lesson created"
    );

    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

/// Retrieve one lesson.
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<LessonResponse>, ApiError> {
    let lesson = load_lesson(&state, &id)?;
    authorize_object(&current.principal, Action::ViewLesson, &lesson).into_result()?;

    Ok(Json(LessonResponse::from(lesson)))
}

/// Replace a lesson.
pub async fn replace_lesson(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<LessonRequest>,
) -> Result<Json<LessonResponse>, ApiError> {
    let lesson = load_lesson(&state, &id)?;
    authorize_object(&current.principal, Action::UpdateLesson, &lesson).into_result()?;

    let course = existing_course(&state, &req.course)?;
    let title = validate_title(&req.title)?;
    let video_url = validate_video_url(&req.video_url)?;

    let lesson = state.store.update_lesson(&lesson.id, &mut |lesson| {
        lesson.course = course;
        lesson.title.clone_from(&title);
        lesson.description.clone_from(&req.description);
        lesson.video_url.clone_from(&video_url);
    })?;
    tracing::info!(lesson_id = %lesson.id, user_id = %current.principal.user_id, "Lesson replaced");

    notify_course_updated(&state, &lesson.course)?;
    Ok(Json(LessonResponse::from(lesson)))
}

/// Partially update a lesson.
pub async fn update_lesson(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<LessonPatch>,
) -> Result<Json<LessonResponse>, ApiError> {
    let lesson = load_lesson(&state, &id)?;
    authorize_object(&current.principal, Action::UpdateLesson, &lesson).into_result()?;

    let course = patch
        .course
        .as_deref()
        .map(|course| existing_course(&state, course))
        .transpose()?;
    let title = patch.title.as_deref().map(validate_title).transpose()?;
    let video_url = patch.video_url.as_deref().map(validate_video_url).transpose()?;

    let lesson = state.store.update_lesson(&lesson.id, &mut |lesson| {
        if let Some(course) = course {
            lesson.course = course;
        }
        if let Some(title) = &title {
            lesson.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            lesson.description.clone_from(description);
        }
        if let Some(video_url) = &video_url {
            lesson.video_url.clone_from(video_url);
        }
    })?;
    tracing::info!(lesson_id = %lesson.id, user_id = %current.principal.user_id, "Lesson updated");

    notify_course_updated(&state, &lesson.course)?;
    Ok(Json(LessonResponse::from(lesson)))
}

/// Delete a lesson. Only its owner may do this.
pub async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let lesson = load_lesson(&state, &id)?;
    authorize_object(&current.principal, Action::DeleteLesson, &lesson).into_result()?;

    state.store.delete_lesson(&lesson.id)?;
    tracing::info!(lesson_id = %lesson.id, user_id = %current.principal.user_id, "Lesson deleted");

    Ok(StatusCode::NO_CONTENT)
}
