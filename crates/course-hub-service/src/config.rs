//! Service configuration.

use std::path::Path;
use std::str::FromStr;

use secrecy::Secret;
use serde::Deserialize;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/course-hub").
    /// Only used when built with the `rocksdb-backend` feature.
    pub data_dir: String,

    /// HS256 secret used to validate bearer tokens. Without it every
    /// authenticated request is refused.
    pub jwt_secret: Option<Secret<String>>,

    /// Expected JWT audience (default: "course-hub").
    pub auth_audience: String,

    /// Key expected in `X-Admin-Key` for admin endpoints.
    pub admin_api_key: Option<String>,

    /// Stripe secret API key (optional).
    pub stripe_api_key: Option<Secret<String>>,

    /// Stripe API base URL (default: `<https://api.stripe.com/v1>`).
    pub stripe_api_base: String,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<Secret<String>>,

    /// Currency for checkout prices (default: "rub").
    pub stripe_currency: String,

    /// Timeout for Stripe API calls in seconds.
    pub stripe_timeout_seconds: u64,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// Mail API base URL. Notifications are skipped when unset.
    pub mail_api_url: Option<String>,

    /// Mail API server token.
    pub mail_api_token: Option<Secret<String>>,

    /// Sender address for notification emails.
    pub mail_sender: String,

    /// Timeout for mail API calls in milliseconds.
    pub mail_timeout_milliseconds: u64,

    /// Minimum minutes between two update notifications for one course.
    pub notification_cooldown_minutes: i64,

    /// Days without login after which a user is deactivated.
    pub inactivity_days: i64,

    /// Seconds between two inactive-user sweeps.
    pub sweep_interval_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        Self {
            listen_addr: env_or("LISTEN_ADDR", defaults.listen_addr),
            data_dir: env_or("DATA_DIR", defaults.data_dir),
            jwt_secret: secret_env("AUTH_JWT_SECRET"),
            auth_audience: env_or("AUTH_AUDIENCE", defaults.auth_audience),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            stripe_api_key,
            stripe_api_base: env_or("STRIPE_API_BASE", defaults.stripe_api_base),
            stripe_webhook_secret,
            stripe_currency: env_or("STRIPE_CURRENCY", defaults.stripe_currency),
            stripe_timeout_seconds: positive_env_or(
                "STRIPE_TIMEOUT_SECONDS",
                defaults.stripe_timeout_seconds,
            ),
            frontend_url: env_or("FRONTEND_URL", defaults.frontend_url),
            mail_api_url: std::env::var("MAIL_API_URL").ok(),
            mail_api_token: secret_env("MAIL_API_TOKEN"),
            mail_sender: env_or("MAIL_SENDER", defaults.mail_sender),
            mail_timeout_milliseconds: positive_env_or(
                "MAIL_TIMEOUT_MILLISECONDS",
                defaults.mail_timeout_milliseconds,
            ),
            notification_cooldown_minutes: env_or(
                "NOTIFICATION_COOLDOWN_MINUTES",
                defaults.notification_cooldown_minutes,
            ),
            inactivity_days: env_or("INACTIVITY_DAYS", defaults.inactivity_days),
            sweep_interval_seconds: positive_env_or(
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            ),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: positive_env_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
        }
    }

    /// Where Stripe sends the buyer after a successful checkout.
    #[must_use]
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url.trim_end_matches('/')
        )
    }

    /// Where Stripe sends the buyer after abandoning checkout.
    #[must_use]
    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/payment/cancel", self.frontend_url.trim_end_matches('/'))
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Like [`env_or`] for durations, which are never allowed to be zero.
fn positive_env_or(key: &str, default: u64) -> u64 {
    env_or(key, default).max(1)
}

fn secret_env(key: &str) -> Option<Secret<String>> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(Secret::new)
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<Secret<String>>, Option<Secret<String>>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "course-hub/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (
                Some(Secret::new(secrets.api_key)),
                secrets.webhook_secret.map(Secret::new),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        secret_env("STRIPE_API_KEY"),
        secret_env("STRIPE_WEBHOOK_SECRET"),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/course-hub".into(),
            jwt_secret: None,
            auth_audience: "course-hub".into(),
            admin_api_key: None,
            stripe_api_key: None,
            stripe_api_base: "https://api.stripe.com/v1".into(),
            stripe_webhook_secret: None,
            stripe_currency: "rub".into(),
            stripe_timeout_seconds: 30,
            frontend_url: "http://localhost:3000".into(),
            mail_api_url: None,
            mail_api_token: None,
            mail_sender: "noreply@course-hub.local".into(),
            mail_timeout_milliseconds: 10_000,
            notification_cooldown_minutes: 4 * 60,
            inactivity_days: 30,
            sweep_interval_seconds: 24 * 60 * 60,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
