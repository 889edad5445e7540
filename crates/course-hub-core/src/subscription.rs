//! Course subscriptions.
//!
//! The existence of a subscription row is the subscribed state; toggling
//! either creates or deletes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CourseId, UserId};

/// A user's subscription to course update notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscriber.
    pub user: UserId,
    /// Course subscribed to.
    pub course: CourseId,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// Outcome of a subscription toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionToggle {
    /// A subscription was created.
    Subscribed,
    /// An existing subscription was removed.
    Unsubscribed,
}

impl SubscriptionToggle {
    /// Message shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Subscribed => "подписка добавлена",
            Self::Unsubscribed => "подписка удалена",
        }
    }

    /// Whether the user is subscribed after the toggle.
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}
