//! Lesson API integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

#[tokio::test]
async fn any_user_can_add_lesson_to_existing_course() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let student = harness.seed_user("student@example.com");
    let course = harness.seed_course(&owner, "Rust", None);

    let response = TestHarness::as_user(harness.server.post("/v1/lessons"), &student)
        .json(&json!({
            "course": course.id.to_string(),
            "title": "My notes",
            "video_url": "https://www.youtube.com/watch?v=abc"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["owner"], student.id.to_string());
    assert_eq!(body["course"], course.id.to_string());
}

#[tokio::test]
async fn non_youtube_video_is_rejected() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let course = harness.seed_course(&owner, "Rust", None);

    let response = TestHarness::as_user(harness.server.post("/v1/lessons"), &owner)
        .json(&json!({
            "course": course.id.to_string(),
            "title": "Intro",
            "video_url": "https://vimeo.com/12345"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lesson_for_unknown_course_is_rejected() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");

    TestHarness::as_user(harness.server.post("/v1/lessons"), &owner)
        .json(&json!({
            "course": course_hub_core::CourseId::generate().to_string(),
            "title": "Intro",
            "video_url": "https://youtube.com/watch?v=abc"
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn moderator_can_update_but_not_delete_lesson() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let moderator = harness.seed_moderator("mod@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    let lesson = harness.seed_lesson(&owner, &course, "Intro");
    let url = format!("/v1/lessons/{}", lesson.id);

    let body: Value = TestHarness::as_user(harness.server.patch(&url), &moderator)
        .json(&json!({ "title": "Introduction" }))
        .await
        .json();
    assert_eq!(body["title"], "Introduction");

    TestHarness::as_user(harness.server.delete(&url), &moderator)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stranger_cannot_touch_lesson() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let stranger = harness.seed_user("stranger@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    let lesson = harness.seed_lesson(&owner, &course, "Intro");
    let url = format!("/v1/lessons/{}", lesson.id);

    TestHarness::as_user(harness.server.put(&url), &stranger)
        .json(&json!({
            "course": course.id.to_string(),
            "title": "Mine now",
            "video_url": "https://youtube.com/watch?v=abc"
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    TestHarness::as_user(harness.server.delete(&url), &stranger)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_deletes_lesson() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    let lesson = harness.seed_lesson(&owner, &course, "Intro");
    let url = format!("/v1/lessons/{}", lesson.id);

    TestHarness::as_user(harness.server.delete(&url), &owner)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    TestHarness::as_user(harness.server.get(&url), &owner)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lessons_are_listed_with_pagination() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    for i in 0..6 {
        harness.seed_lesson(&owner, &course, &format!("Lesson {i}"));
    }

    let body: Value = TestHarness::as_user(harness.server.get("/v1/lessons?page_size=4"), &owner)
        .await
        .json();

    assert_eq!(body["count"], 6);
    assert_eq!(body["page_size"], 4);
    assert_eq!(body["results"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn lesson_update_notifies_course_subscribers() {
    let harness = TestHarness::new().await;
    harness.mount_mail().await;

    let owner = harness.seed_user("owner@example.com");
    let fan = harness.seed_user("fan@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    let lesson = harness.seed_lesson(&owner, &course, "Intro");

    TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&json!({ "course_id": course.id.to_string() }))
        .await
        .assert_status_ok();

    TestHarness::as_user(
        harness.server.patch(&format!("/v1/lessons/{}", lesson.id)),
        &owner,
    )
    .json(&json!({ "description": "Updated slides" }))
    .await
    .assert_status_ok();

    let received = harness.wait_for_mail(1).await;
    assert_eq!(received.len(), 1);
    let mail: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(mail["To"], "fan@example.com");
}
