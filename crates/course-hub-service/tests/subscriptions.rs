//! Subscription toggle integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

#[tokio::test]
async fn toggle_alternates_between_subscribed_and_unsubscribed() {
    let harness = TestHarness::new().await;
    let owner = harness.seed_user("owner@example.com");
    let fan = harness.seed_user("fan@example.com");
    let course = harness.seed_course(&owner, "Rust", None);
    let body = json!({ "course_id": course.id.to_string() });

    let first: Value = TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&body)
        .await
        .json();
    assert_eq!(first["subscribed"], true);
    assert_eq!(first["message"], "подписка добавлена");

    let second: Value = TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&body)
        .await
        .json();
    assert_eq!(second["subscribed"], false);
    assert_eq!(second["message"], "подписка удалена");

    let third: Value = TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&body)
        .await
        .json();
    assert_eq!(third["subscribed"], true);

    let course_view: Value = TestHarness::as_user(
        harness.server.get(&format!("/v1/courses/{}", course.id)),
        &fan,
    )
    .await
    .json();
    assert_eq!(course_view["is_subscribed"], true);
}

#[tokio::test]
async fn missing_course_id_is_rejected() {
    let harness = TestHarness::new().await;
    let fan = harness.seed_user("fan@example.com");

    let response = TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Не указан ID курса");
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let harness = TestHarness::new().await;
    let fan = harness.seed_user("fan@example.com");

    TestHarness::as_user(harness.server.post("/v1/course/subscription"), &fan)
        .json(&json!({ "course_id": course_hub_core::CourseId::generate().to_string() }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
