//! Payments and their reconciliation against the checkout provider.
//!
//! A payment starts in [`PaymentStatus::Created`] when a checkout session is
//! opened and moves at most once, to either `Succeeded` or `Canceled`. The
//! provider is authoritative; [`reconcile`] is the single rule that turns a
//! provider observation into a local transition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CourseId, PaymentId, UserId};

/// Provider `payment_status` value for a settled session.
pub const PROVIDER_PAID: &str = "paid";

/// Provider session `status` value for an abandoned session.
pub const PROVIDER_EXPIRED: &str = "expired";

/// A purchase attempt for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment identifier (ULID, time-ordered).
    pub id: PaymentId,
    /// Buyer.
    pub user: UserId,
    /// Course being bought.
    pub course: CourseId,
    /// Course price at the time the session was opened.
    pub amount: Decimal,
    /// Hosted checkout page the buyer is sent to.
    pub payment_link: Option<String>,
    /// Provider checkout session id.
    pub session_id: Option<String>,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Record a freshly opened checkout session.
    #[must_use]
    pub fn created(
        user: UserId,
        course: CourseId,
        amount: Decimal,
        session_id: String,
        payment_link: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            user,
            course,
            amount,
            payment_link,
            session_id: Some(session_id),
            status: PaymentStatus::Created,
            created_at: now,
        }
    }
}

/// Payment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout session opened, outcome unknown.
    Created,
    /// Provider reported the session as paid.
    Succeeded,
    /// Provider reported the session as expired.
    Canceled,
}

impl PaymentStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the provider currently says about a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderObservation<'a> {
    /// Session `payment_status` (`paid`, `unpaid`, `no_payment_required`).
    pub payment_status: Option<&'a str>,
    /// Session `status` (`open`, `complete`, `expired`).
    pub session_status: Option<&'a str>,
}

/// Decide the transition implied by a provider observation.
///
/// Returns `None` when the local status must stay as it is: either it is
/// already terminal, or the provider has not settled the session yet.
#[must_use]
pub fn reconcile(current: PaymentStatus, observed: ProviderObservation<'_>) -> Option<PaymentStatus> {
    if current.is_terminal() {
        return None;
    }

    if observed.payment_status == Some(PROVIDER_PAID) {
        Some(PaymentStatus::Succeeded)
    } else if observed.session_status == Some(PROVIDER_EXPIRED) {
        Some(PaymentStatus::Canceled)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAID: ProviderObservation<'static> = ProviderObservation {
        payment_status: Some("paid"),
        session_status: Some("complete"),
    };

    const EXPIRED: ProviderObservation<'static> = ProviderObservation {
        payment_status: Some("unpaid"),
        session_status: Some("expired"),
    };

    const OPEN: ProviderObservation<'static> = ProviderObservation {
        payment_status: Some("unpaid"),
        session_status: Some("open"),
    };

    #[test]
    fn paid_session_succeeds_created_payment() {
        assert_eq!(
            reconcile(PaymentStatus::Created, PAID),
            Some(PaymentStatus::Succeeded)
        );
    }

    #[test]
    fn expired_session_cancels_created_payment() {
        assert_eq!(
            reconcile(PaymentStatus::Created, EXPIRED),
            Some(PaymentStatus::Canceled)
        );
    }

    #[test]
    fn open_session_leaves_payment_alone() {
        assert_eq!(reconcile(PaymentStatus::Created, OPEN), None);
    }

    #[test]
    fn terminal_states_never_move() {
        for terminal in [PaymentStatus::Succeeded, PaymentStatus::Canceled] {
            for observed in [PAID, EXPIRED, OPEN] {
                assert_eq!(reconcile(terminal, observed), None);
            }
        }
    }

    #[test]
    fn applying_a_transition_twice_is_a_no_op() {
        let next = reconcile(PaymentStatus::Created, PAID).unwrap();
        assert_eq!(reconcile(next, PAID), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        assert_eq!(PaymentStatus::Canceled.to_string(), "canceled");
    }
}
