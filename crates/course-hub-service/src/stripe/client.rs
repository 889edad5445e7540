//! Stripe API client implementation.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use super::types::{CheckoutSession, Price, Product, StripeErrorResponse};
use crate::crypto::verify_hmac_sha256_hex;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECONDS: u64 = 300;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Parameters for a single-item Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    /// Stripe price to sell.
    pub price_id: &'a str,
    /// Redirect after payment.
    pub success_url: &'a str,
    /// Redirect after abandoning checkout.
    pub cancel_url: &'a str,
    /// Our buyer ID, echoed back as `client_reference_id`.
    pub user_id: &'a str,
    /// Our course ID, stored in session metadata.
    pub course_id: &'a str,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
    webhook_secret: Option<Secret<String>>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, normally `https://api.stripe.com/v1`
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `webhook_secret` - Optional webhook signing secret (`whsec_...`)
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Secret<String>,
        webhook_secret: Option<Secret<String>>,
        timeout: Duration,
    ) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            webhook_secret,
        })
    }

    /// Whether webhook payloads can be verified.
    #[must_use]
    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Create a product.
    pub async fn create_product(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Product, StripeError> {
        let params = [("name", name), ("description", description)];

        let response = self
            .client
            .post(format!("{}/products", self.base_url))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a one-off price for a product.
    ///
    /// # Arguments
    ///
    /// * `product_id` - Stripe product ID
    /// * `unit_amount` - Amount in minor units
    /// * `currency` - ISO currency code, lowercase
    pub async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Result<Price, StripeError> {
        let params = [
            ("product", product_id.to_string()),
            ("unit_amount", unit_amount.to_string()),
            ("currency", currency.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/prices", self.base_url))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a card-only Checkout session for one unit of a price.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let params = [
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", request.user_id),
            ("metadata[user_id]", request.user_id),
            ("metadata[course_id]", request.course_id),
        ];

        tracing::debug!(
            user_id = %request.user_id,
            course_id = %request.course_id,
            price_id = %request.price_id,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Retrieve a Checkout session by ID.
    pub async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, session_id))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Verify a webhook signature.
    ///
    /// # Arguments
    ///
    /// * `payload` - Raw request body
    /// * `signature` - Value of the `Stripe-Signature` header
    /// * `now` - Current Unix time, for the replay window
    pub fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
        now: i64,
    ) -> Result<(), StripeError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or_else(|| StripeError::Configuration("Webhook secret not configured".into()))?;

        // Format: t=timestamp,v1=signature,v1=signature2,...
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", ts)) => timestamp = Some(ts),
                Some(("v1", sig)) => signatures.push(sig),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(StripeError::InvalidSignature)?;
        let issued: i64 = timestamp
            .parse()
            .map_err(|_| StripeError::InvalidSignature)?;

        if now.abs_diff(issued) > SIGNATURE_TOLERANCE_SECONDS {
            return Err(StripeError::InvalidSignature);
        }

        let signed_payload = format!("{timestamp}.{payload}");
        let valid = signatures
            .iter()
            .any(|sig| verify_hmac_sha256_hex(secret.expose_secret(), &signed_payload, sig));

        if valid {
            Ok(())
        } else {
            Err(StripeError::InvalidSignature)
        }
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}
