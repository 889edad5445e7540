//! Common test utilities for course hub integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rust_decimal::Decimal;
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use course_hub_core::{Course, Lesson, User, UserId};
use course_hub_service::auth::JwtClaims;
use course_hub_service::crypto::hmac_sha256_hex;
use course_hub_service::{create_router, AppState, ServiceConfig};
use course_hub_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const AUDIENCE: &str = "course-hub";
pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for seeding and inspection.
    pub store: Arc<MemoryStore>,
    /// Mock Stripe API.
    pub stripe: MockServer,
    /// Mock mail API.
    pub mail: MockServer,
}

impl TestHarness {
    /// Create a new test harness with a fresh store and mock providers.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestHarness::new`], with the configuration adjusted first.
    pub async fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let stripe = MockServer::start().await;
        let mail = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            jwt_secret: Some(Secret::new(JWT_SECRET.to_string())),
            auth_audience: AUDIENCE.into(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            stripe_api_key: Some(Secret::new("sk_test_integration".to_string())),
            stripe_api_base: stripe.uri(),
            stripe_webhook_secret: Some(Secret::new(WEBHOOK_SECRET.to_string())),
            stripe_currency: "rub".into(),
            stripe_timeout_seconds: 5,
            frontend_url: "http://localhost:3000".into(),
            mail_api_url: Some(mail.uri()),
            mail_api_token: Some(Secret::new("mail-token".to_string())),
            mail_sender: "noreply@course-hub.test".into(),
            mail_timeout_milliseconds: 2_000,
            notification_cooldown_minutes: 240,
            inactivity_days: 30,
            sweep_interval_seconds: 86_400,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        adjust(&mut config);

        let shared: Arc<dyn Store> = store.clone();
        let state = AppState::new(shared, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            stripe,
            mail,
        }
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Mint a valid token for `user_id`.
    pub fn token_for(user_id: &UserId) -> String {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            aud: AUDIENCE.to_string(),
            exp: Utc::now().timestamp() + 3600,
            iat: Some(Utc::now().timestamp()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to encode token")
    }

    /// Authorization header for `user_id`.
    pub fn auth(user_id: &UserId) -> (HeaderName, HeaderValue) {
        let value = format!("Bearer {}", Self::token_for(user_id));
        (
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).expect("valid header"),
        )
    }

    /// Admin key header.
    pub fn admin() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-admin-key"),
            HeaderValue::from_static(ADMIN_KEY),
        )
    }

    /// Send `request` as `user`.
    pub fn as_user(request: TestRequest, user: &User) -> TestRequest {
        let (name, value) = Self::auth(&user.id);
        request.add_header(name, value)
    }

    /// Send `request` with the admin key.
    pub fn as_admin(request: TestRequest) -> TestRequest {
        let (name, value) = Self::admin();
        request.add_header(name, value)
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Store an active user.
    pub fn seed_user(&self, email: &str) -> User {
        let user = User::new(UserId::generate(), email, Utc::now()).expect("valid user");
        self.store.put_user(&user).expect("put user");
        user
    }

    /// Store an active moderator.
    pub fn seed_moderator(&self, email: &str) -> User {
        let mut user = User::new(UserId::generate(), email, Utc::now()).expect("valid user");
        user.set_moderator(true);
        self.store.put_user(&user).expect("put user");
        user
    }

    /// Store a course owned by `owner`.
    pub fn seed_course(&self, owner: &User, title: &str, price: Option<Decimal>) -> Course {
        let mut course =
            Course::new(owner.id, title, "About the course".into(), Utc::now()).expect("valid");
        course.price = price;
        self.store.put_course(&course).expect("put course");
        course
    }

    /// Store a lesson owned by `owner` in `course`.
    pub fn seed_lesson(&self, owner: &User, course: &Course, title: &str) -> Lesson {
        let lesson = Lesson::new(
            owner.id,
            course.id,
            title,
            String::new(),
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            Utc::now(),
        )
        .expect("valid lesson");
        self.store.put_lesson(&lesson).expect("put lesson");
        lesson
    }

    // ========================================================================
    // Stripe mocks
    // ========================================================================

    /// Mount successful product, price and checkout session creation.
    pub async fn mount_checkout(&self, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "prod_test",
                "name": "Course"
            })))
            .mount(&self.stripe)
            .await;

        Mock::given(method("POST"))
            .and(path("/prices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "price_test",
                "unit_amount": 10000,
                "currency": "rub",
                "product": "prod_test"
            })))
            .mount(&self.stripe)
            .await;

        Mock::given(method("POST"))
            .and(path("/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": session_id,
                "url": format!("https://checkout.stripe.com/c/pay/{session_id}"),
                "status": "open",
                "payment_status": "unpaid"
            })))
            .mount(&self.stripe)
            .await;
    }

    /// Mount a session retrieval answering with the given states.
    pub async fn mount_session(&self, session_id: &str, payment_status: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/checkout/sessions/{session_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": session_id,
                "url": format!("https://checkout.stripe.com/c/pay/{session_id}"),
                "status": status,
                "payment_status": payment_status,
                "amount_total": 10000,
                "currency": "rub",
                "customer": "cus_test",
                "payment_intent": "pi_test",
                "created": 1_700_000_000,
                "expires_at": 1_700_086_400
            })))
            .mount(&self.stripe)
            .await;
    }

    // ========================================================================
    // Webhooks and mail
    // ========================================================================

    /// A valid `Stripe-Signature` header value for `payload`, signed now.
    pub fn stripe_signature(payload: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let sig = hmac_sha256_hex(WEBHOOK_SECRET, &format!("{timestamp}.{payload}"));
        format!("t={timestamp},v1={sig}")
    }

    /// Accept every mail.
    pub async fn mount_mail(&self) {
        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.mail)
            .await;
    }

    /// Wait until the mail API has received `count` requests, or give up.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<Request> {
        for _ in 0..100 {
            let received = self.mail.received_requests().await.unwrap_or_default();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.mail.received_requests().await.unwrap_or_default()
    }
}
