//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin, courses, health, lessons, payments, subscriptions, users, webhooks,
};
use crate::state::AppState;

/// Maximum concurrent requests for API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Users (JWT auth)
/// - `POST /v1/users` - Register the token subject
/// - `GET|PATCH|DELETE /v1/users/me` - Own profile
///
/// ## Catalog (JWT auth, policy-checked)
/// - `GET|POST /v1/courses`, `GET|PUT|PATCH|DELETE /v1/courses/:id`
/// - `GET|POST /v1/lessons`, `GET|PUT|PATCH|DELETE /v1/lessons/:id`
/// - `POST /v1/course/subscription` - Toggle subscription
///
/// ## Payments (JWT auth)
/// - `POST /v1/payment/create` - Open a checkout session
/// - `GET /v1/payment/check-status?payment_id=` - Detailed status
/// - `GET /v1/payment/:id/status` - Simple status
/// - `GET /v1/payment` - History
///
/// ## Admin (`X-Admin-Key`)
/// - `PUT /v1/admin/users/:id/moderator` - Moderator membership
/// - `POST /v1/admin/sweep` - Run the inactive-user sweep
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Users
        .route("/users", post(users::register))
        .route(
            "/users/me",
            get(users::me).patch(users::update_me).delete(users::delete_me),
        )
        // Courses
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/:id",
            get(courses::get_course)
                .put(courses::replace_course)
                .patch(courses::update_course)
                .delete(courses::delete_course),
        )
        // Lessons
        .route(
            "/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route(
            "/lessons/:id",
            get(lessons::get_lesson)
                .put(lessons::replace_lesson)
                .patch(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        // Subscriptions
        .route(
            "/course/subscription",
            post(subscriptions::toggle_subscription),
        )
        // Payments
        .route("/payment", get(payments::list))
        .route("/payment/create", post(payments::create))
        .route("/payment/check-status", get(payments::check_status))
        .route("/payment/:id/status", get(payments::status))
        // Admin
        .route("/admin/users/:id/moderator", put(admin::set_moderator))
        .route("/admin/sweep", post(admin::run_sweep))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by external services)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}
