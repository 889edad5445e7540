//! Payment lifecycle: checkout creation and reconciliation.
//!
//! A purchase opens a Stripe product, price and Checkout session, then
//! records a local [`Payment`] in `created`. From there the only way
//! forward is [`reconcile_session`], which every status path (simple poll,
//! detailed poll, webhook) goes through.

use chrono::Utc;
use course_hub_core::{reconcile, to_minor_units, CourseId, Payment, PaymentId, UserId};

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::client::CheckoutRequest;
use crate::stripe::{CheckoutSession, StripeClient};

/// Product description used when the course has none.
pub const DEFAULT_PRODUCT_DESCRIPTION: &str = "Курс на платформе LMS";

/// The configured Stripe client, or a bad request when payments are off.
pub fn stripe_client(state: &AppState) -> Result<&StripeClient, ApiError> {
    state
        .stripe
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Payments are not configured".into()))
}

/// Open a checkout session for `course_id` and record the payment.
///
/// Nothing is persisted unless all three provider calls succeed.
pub async fn create_payment(
    state: &AppState,
    user_id: UserId,
    course_id: &CourseId,
) -> Result<Payment, ApiError> {
    let course = state
        .store
        .get_course(course_id)?
        .ok_or_else(|| ApiError::NotFound(format!("course not found: {course_id}")))?;

    let amount = course.sale_price()?;
    let unit_amount = to_minor_units(amount)?;
    let stripe = stripe_client(state)?;

    let description = if course.description.trim().is_empty() {
        DEFAULT_PRODUCT_DESCRIPTION
    } else {
        course.description.as_str()
    };

    let product = stripe.create_product(&course.title, description).await?;

    let price = match stripe
        .create_price(&product.id, unit_amount, &state.config.stripe_currency)
        .await
    {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!(product_id = %product.id, "Stripe product orphaned by failed price creation");
            return Err(e.into());
        }
    };

    let success_url = state.config.checkout_success_url();
    let cancel_url = state.config.checkout_cancel_url();
    let user = user_id.to_string();
    let course_ref = course.id.to_string();

    let session = match stripe
        .create_checkout_session(&CheckoutRequest {
            price_id: &price.id,
            success_url: &success_url,
            cancel_url: &cancel_url,
            user_id: &user,
            course_id: &course_ref,
        })
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(
                product_id = %product.id,
                price_id = %price.id,
                "Stripe product and price orphaned by failed checkout session"
            );
            return Err(e.into());
        }
    };

    let payment = Payment::created(
        user_id,
        course.id,
        amount,
        session.id,
        session.url,
        Utc::now(),
    );
    state.store.insert_payment(&payment)?;

    tracing::info!(
        payment_id = %payment.id,
        user_id = %user_id,
        course_id = %course.id,
        amount = %amount,
        "Checkout session created"
    );

    Ok(payment)
}

/// Load a payment owned by `user_id`.
///
/// Someone else's payment is reported as missing.
pub fn owned_payment(
    state: &AppState,
    user_id: &UserId,
    payment_id: &PaymentId,
) -> Result<Payment, ApiError> {
    state
        .store
        .get_payment(payment_id)?
        .filter(|p| &p.user == user_id)
        .ok_or_else(|| ApiError::NotFound(format!("payment not found: {payment_id}")))
}

/// Apply what the provider says about `session` to `payment`.
///
/// Returns the payment as it stands afterwards. When the store reports a
/// concurrent transition, the stored record wins.
pub fn reconcile_session(
    state: &AppState,
    payment: Payment,
    session: &CheckoutSession,
) -> Result<Payment, ApiError> {
    let Some(next) = reconcile(payment.status, session.observation()) else {
        return Ok(payment);
    };

    match state.store.transition_payment(&payment.id, next)? {
        Some(updated) => {
            tracing::info!(
                payment_id = %updated.id,
                session_id = %session.id,
                status = %updated.status,
                "Payment reconciled"
            );
            Ok(updated)
        }
        None => {
            tracing::debug!(payment_id = %payment.id, "Payment already settled elsewhere");
            Ok(state.store.get_payment(&payment.id)?.unwrap_or(payment))
        }
    }
}

/// Poll the provider for `payment` and reconcile.
///
/// Payments without a session are returned unchanged, as are settled ones.
pub async fn refresh_payment(state: &AppState, payment: Payment) -> Result<Payment, ApiError> {
    if payment.status.is_terminal() {
        return Ok(payment);
    }
    let Some(session_id) = payment.session_id.clone() else {
        return Ok(payment);
    };

    let session = stripe_client(state)?
        .get_checkout_session(&session_id)
        .await?;
    reconcile_session(state, payment, &session)
}

/// Fetch the full provider session for `payment` and reconcile.
pub async fn inspect_payment(
    state: &AppState,
    payment: Payment,
) -> Result<(Payment, CheckoutSession), ApiError> {
    let session_id = payment
        .session_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Payment has no checkout session".into()))?;

    let session = stripe_client(state)?
        .get_checkout_session(&session_id)
        .await?;
    let payment = reconcile_session(state, payment, &session)?;
    Ok((payment, session))
}
