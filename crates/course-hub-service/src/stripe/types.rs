//! Stripe API types.

use serde::Deserialize;

/// Stripe product object.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: String,
    /// Product name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Stripe price object.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Amount in minor units.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Currency (e.g., "rub").
    #[serde(default)]
    pub currency: Option<String>,
    /// Product the price belongs to.
    #[serde(default)]
    pub product: Option<String>,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Payment status (`paid`, `unpaid`, `no_payment_required`).
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Session status (`open`, `complete`, `expired`).
    #[serde(default)]
    pub status: Option<String>,
    /// Total amount in minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Payment intent ID.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: Option<i64>,
    /// Expiry timestamp (Unix).
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CheckoutSession {
    /// Session state in the shape the reconcile rule reads.
    #[must_use]
    pub fn observation(&self) -> course_hub_core::ProviderObservation<'_> {
        course_hub_core::ProviderObservation {
            payment_status: self.payment_status.as_deref(),
            session_status: self.status.as_deref(),
        }
    }
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
