//! Stripe webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::error::ApiError;
use crate::payments::reconcile_session;
use crate::state::AppState;
use crate::stripe::{CheckoutSession, WebhookEvent};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    // Only events with a verifiable signature are accepted.
    let stripe = match &state.stripe {
        Some(stripe) if stripe.has_webhook_secret() => stripe,
        _ => {
            tracing::warn!("Stripe webhook_secret not configured - rejecting webhook");
            return Err(ApiError::BadRequest(
                "Webhook signing secret not configured".into(),
            ));
        }
    };

    let sig = signature.ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;
    stripe
        .verify_webhook_signature(&body, sig, Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(error = %e, "Invalid Stripe webhook signature");
            ApiError::BadRequest("Invalid webhook signature".into())
        })?;

    let event: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    match event.event_type.as_str() {
        "checkout.session.completed"
        | "checkout.session.async_payment_succeeded"
        | "checkout.session.expired" => {
            handle_session_event(&state, event.data.object)?;
        }
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

fn handle_session_event(state: &AppState, object: serde_json::Value) -> Result<(), ApiError> {
    let session: CheckoutSession =
        serde_json::from_value(object).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let Some(payment) = state.store.find_payment_by_session(&session.id)? else {
        tracing::warn!(session_id = %session.id, "Webhook for unknown checkout session");
        return Ok(());
    };

    reconcile_session(state, payment, &session)?;
    Ok(())
}
