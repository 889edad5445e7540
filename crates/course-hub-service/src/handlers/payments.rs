//! Payment handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use course_hub_core::{from_minor_units, CourseId, Payment, PaymentId, PaymentStatus};

use super::subscriptions::required_course_id;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::payments::{create_payment, inspect_payment, owned_payment, refresh_payment};
use crate::state::AppState;
use crate::stripe::CheckoutSession;

fn course_title(state: &AppState, course_id: &CourseId) -> Result<String, ApiError> {
    Ok(state
        .store
        .get_course(course_id)?
        .map(|c| c.title)
        .unwrap_or_default())
}

fn epoch_to_datetime(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

// ============================================================================
// Create
// ============================================================================

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Course to buy.
    #[serde(default)]
    pub course_id: Option<String>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    /// Payment ID.
    pub id: PaymentId,
    /// Hosted checkout page.
    pub payment_link: Option<String>,
    /// Always `created`.
    pub status: PaymentStatus,
}

/// Open a checkout session for a course.
pub async fn create(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let course_id = required_course_id(req.course_id.as_deref())?;
    let payment = create_payment(&state, current.principal.user_id, &course_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            id: payment.id,
            payment_link: payment.payment_link,
            status: payment.status,
        }),
    ))
}

// ============================================================================
// Status
// ============================================================================

/// Simple status payload.
#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    /// Payment ID.
    pub id: PaymentId,
    /// Course title.
    pub course: String,
    /// Amount in major units.
    pub amount: Decimal,
    /// Status after reconciliation.
    pub status: PaymentStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Poll the provider for one payment and report its status.
pub async fn status(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let payment_id: PaymentId = id.parse()?;
    let payment = owned_payment(&state, &current.principal.user_id, &payment_id)?;
    let payment = refresh_payment(&state, payment).await?;

    Ok(Json(PaymentStatusResponse {
        id: payment.id,
        course: course_title(&state, &payment.course)?,
        amount: payment.amount,
        status: payment.status,
        created_at: payment.created_at,
    }))
}

/// Detailed status query.
#[derive(Debug, Deserialize)]
pub struct CheckStatusQuery {
    /// Payment ID.
    #[serde(default)]
    pub payment_id: Option<String>,
}

/// Provider-side view of a checkout session.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    /// Session ID.
    pub id: String,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,
    /// `open`, `complete` or `expired`.
    pub status: Option<String>,
    /// Total in major units.
    pub amount_total: Option<Decimal>,
    /// Currency.
    pub currency: Option<String>,
    /// Stripe customer.
    pub customer: Option<String>,
    /// Stripe payment intent.
    pub payment_intent: Option<String>,
    /// Checkout URL.
    pub url: Option<String>,
    /// Session creation time.
    pub created: Option<DateTime<Utc>>,
    /// Session expiry time.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CheckoutSession> for SessionInfo {
    fn from(session: CheckoutSession) -> Self {
        Self {
            id: session.id,
            payment_status: session.payment_status,
            status: session.status,
            amount_total: session.amount_total.map(from_minor_units),
            currency: session.currency,
            customer: session.customer,
            payment_intent: session.payment_intent,
            url: session.url,
            created: epoch_to_datetime(session.created),
            expires_at: epoch_to_datetime(session.expires_at),
        }
    }
}

/// Detailed status payload.
#[derive(Debug, Serialize)]
pub struct DetailedStatusResponse {
    /// Payment ID.
    pub id: PaymentId,
    /// Course ID.
    pub course_id: CourseId,
    /// Course title.
    pub course: String,
    /// Amount in major units.
    pub amount: Decimal,
    /// Status after reconciliation.
    pub status: PaymentStatus,
    /// Hosted checkout page.
    pub payment_link: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Provider session.
    pub session: SessionInfo,
}

/// Fetch the full provider session for a payment and reconcile.
pub async fn check_status(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<CheckStatusQuery>,
) -> Result<Json<DetailedStatusResponse>, ApiError> {
    let raw = query
        .payment_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("payment_id is required".into()))?;
    let payment_id: PaymentId = raw.parse()?;

    let payment = owned_payment(&state, &current.principal.user_id, &payment_id)?;
    let (payment, session) = inspect_payment(&state, payment).await?;

    Ok(Json(DetailedStatusResponse {
        id: payment.id,
        course_id: payment.course,
        course: course_title(&state, &payment.course)?,
        amount: payment.amount,
        status: payment.status,
        payment_link: payment.payment_link,
        created_at: payment.created_at,
        session: SessionInfo::from(session),
    }))
}

// ============================================================================
// History
// ============================================================================

/// History filter.
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    /// Only payments for this course.
    #[serde(default)]
    pub course_id: Option<String>,
    /// Only payments in this status.
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}

/// Payment history entry.
#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    /// Payment ID.
    pub id: PaymentId,
    /// Course ID.
    pub course_id: CourseId,
    /// Course title.
    pub course: String,
    /// Amount in major units.
    pub amount: Decimal,
    /// Stored status (not reconciled).
    pub status: PaymentStatus,
    /// Hosted checkout page.
    pub payment_link: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// List the caller's payments, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentSummary>>, ApiError> {
    let course_filter = query
        .course_id
        .as_deref()
        .map(str::parse::<CourseId>)
        .transpose()?;

    let payments: Vec<Payment> = state
        .store
        .list_payments_by_user(&current.principal.user_id)?
        .into_iter()
        .filter(|p| course_filter.map_or(true, |c| p.course == c))
        .filter(|p| query.status.map_or(true, |s| p.status == s))
        .collect();

    let summaries = payments
        .into_iter()
        .map(|p| {
            Ok(PaymentSummary {
                id: p.id,
                course_id: p.course,
                course: course_title(&state, &p.course)?,
                amount: p.amount,
                status: p.status,
                payment_link: p.payment_link,
                created_at: p.created_at,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(summaries))
}
