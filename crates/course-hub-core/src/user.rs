//! User profiles.
//!
//! Identity comes from the bearer token; the profile stored here carries the
//! contact details, group memberships and activity timestamps.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::UserId;

/// Group whose members act as moderators.
pub const MODERATOR_GROUP: &str = "moderators";

/// Minimum minutes between two `last_login` refreshes for the same user.
pub const LOGIN_REFRESH_MINUTES: i64 = 60;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier (token subject).
    pub id: UserId,
    /// Contact email, used for notifications.
    pub email: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Group memberships.
    pub groups: BTreeSet<String>,
    /// Inactive users are refused by the API.
    pub is_active: bool,
    /// Registration time.
    pub date_joined: DateTime<Utc>,
    /// Last authenticated request, refreshed at most hourly.
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create an active user with no groups.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the email is malformed.
    pub fn new(id: UserId, email: &str, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id,
            email: validate_email(email)?,
            first_name: None,
            last_name: None,
            phone: None,
            city: None,
            groups: BTreeSet::new(),
            is_active: true,
            date_joined: now,
            last_login: None,
        })
    }

    /// Whether the user belongs to the moderator group.
    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.groups.contains(MODERATOR_GROUP)
    }

    /// Add or remove moderator group membership.
    pub fn set_moderator(&mut self, moderator: bool) {
        if moderator {
            self.groups.insert(MODERATOR_GROUP.to_string());
        } else {
            self.groups.remove(MODERATOR_GROUP);
        }
    }

    /// Whether `last_login` is stale enough to be rewritten at `now`.
    #[must_use]
    pub fn needs_login_refresh(&self, now: DateTime<Utc>) -> bool {
        self.last_login
            .map_or(true, |seen| now - seen >= Duration::minutes(LOGIN_REFRESH_MINUTES))
    }

    /// Whether an active user has been idle since before `cutoff`.
    ///
    /// Users who never logged in are judged by their registration time.
    #[must_use]
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_active && self.last_login.unwrap_or(self.date_joined) < cutoff
    }
}

/// Trim and validate an email address.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the address is malformed.
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if EMAIL.is_match(email) {
        Ok(email.to_lowercase())
    } else {
        Err(DomainError::validation("email", "invalid email address"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::assert_err;

    fn user() -> User {
        User::new(UserId::generate(), "student@example.com", Utc::now()).unwrap()
    }

    #[test]
    fn moderator_membership_toggles() {
        let mut user = user();
        assert!(!user.is_moderator());
        user.set_moderator(true);
        assert!(user.is_moderator());
        user.set_moderator(false);
        assert!(!user.is_moderator());
    }

    #[test]
    fn malformed_emails_are_rejected() {
        assert_err!(validate_email("no-at-sign"));
        assert_err!(validate_email("two@@example.com"));
        assert_err!(validate_email("spaces in@example.com"));
    }

    #[test]
    fn login_refresh_waits_an_hour() {
        let now = Utc::now();
        let mut user = user();
        assert!(user.needs_login_refresh(now));

        user.last_login = Some(now - Duration::minutes(10));
        assert!(!user.needs_login_refresh(now));

        user.last_login = Some(now - Duration::minutes(61));
        assert!(user.needs_login_refresh(now));
    }

    #[test]
    fn idleness_falls_back_to_join_date() {
        let now = Utc::now();
        let cutoff = now - Duration::days(30);
        let mut user = user();

        user.date_joined = now - Duration::days(31);
        assert!(user.is_idle_since(cutoff));

        user.last_login = Some(now - Duration::days(2));
        assert!(!user.is_idle_since(cutoff));

        user.last_login = Some(now - Duration::days(40));
        user.is_active = false;
        assert!(!user.is_idle_since(cutoff));
    }
}
