//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User profiles, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: lowercase email to `user_id`, enforcing uniqueness.
    pub const USERS_BY_EMAIL: &str = "users_by_email";

    /// Courses, keyed by `course_id`.
    pub const COURSES: &str = "courses";

    /// Lessons, keyed by `lesson_id`.
    pub const LESSONS: &str = "lessons";

    /// Index: lessons by course, keyed by `course_id || lesson_id`.
    /// Value is empty (index only).
    pub const LESSONS_BY_COURSE: &str = "lessons_by_course";

    /// Subscriptions, keyed by `user_id || course_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: subscribers by course, keyed by `course_id || user_id`.
    /// Value is empty (index only).
    pub const SUBSCRIBERS_BY_COURSE: &str = "subscribers_by_course";

    /// Payments, keyed by `payment_id` (ULID).
    pub const PAYMENTS: &str = "payments";

    /// Index: payments by user, keyed by `user_id || payment_id`.
    /// Value is empty (index only).
    pub const PAYMENTS_BY_USER: &str = "payments_by_user";

    /// Index: payments by course, keyed by `course_id || payment_id`.
    /// Value is empty (index only).
    pub const PAYMENTS_BY_COURSE: &str = "payments_by_course";

    /// Index: checkout session id to `payment_id`.
    pub const PAYMENTS_BY_SESSION: &str = "payments_by_session";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_EMAIL,
        cf::COURSES,
        cf::LESSONS,
        cf::LESSONS_BY_COURSE,
        cf::SUBSCRIPTIONS,
        cf::SUBSCRIBERS_BY_COURSE,
        cf::PAYMENTS,
        cf::PAYMENTS_BY_USER,
        cf::PAYMENTS_BY_COURSE,
        cf::PAYMENTS_BY_SESSION,
    ]
}
