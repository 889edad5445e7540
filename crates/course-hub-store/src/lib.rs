//! Storage layer for the course hub.
//!
//! Two backends implement the [`Store`] trait:
//!
//! - [`MemoryStore`]: everything behind one `RwLock`, the default.
//! - `RocksStore`: `RocksDB` column families with CBOR values, behind the
//!   `rocksdb-backend` feature (needs libclang at build time).
//!
//! Compound operations (subscription toggle, payment status compare-and-set,
//! notification stamp, field edits, cascading deletes) are atomic in both
//! backends.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use course_hub_core::{Course, SubscriptionToggle, User, UserId};
//! use course_hub_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user = User::new(UserId::generate(), "student@example.com", Utc::now()).unwrap();
//! store.put_user(&user).unwrap();
//!
//! let course = Course::new(user.id, "Rust", String::new(), Utc::now()).unwrap();
//! store.put_course(&course).unwrap();
//!
//! let outcome = store.toggle_subscription(&user.id, &course.id, Utc::now()).unwrap();
//! assert_eq!(outcome, SubscriptionToggle::Subscribed);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Duration, Utc};
use course_hub_core::{
    Course, CourseId, Lesson, LessonId, Payment, PaymentId, PaymentStatus, SubscriptionToggle,
    User, UserId,
};

/// One page of a listing plus the total number of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,
    /// Records across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice a fully sorted listing.
    #[must_use]
    pub fn slice(all: Vec<T>, limit: usize, offset: usize) -> Self {
        let total = all.len();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self { items, total }
    }
}

/// Apply `edit` to a copy of `stored`, keeping what callers may not change.
pub(crate) fn edited_user(stored: &User, edit: &mut dyn FnMut(&mut User)) -> User {
    let mut user = stored.clone();
    edit(&mut user);
    user.id = stored.id;
    user.is_active = stored.is_active;
    user.date_joined = stored.date_joined;
    user.last_login = stored.last_login;
    user
}

pub(crate) fn edited_course(stored: &Course, edit: &mut dyn FnMut(&mut Course)) -> Course {
    let mut course = stored.clone();
    edit(&mut course);
    course.id = stored.id;
    course.owner = stored.owner;
    course.created_at = stored.created_at;
    course.last_notification_sent = stored.last_notification_sent;
    course
}

pub(crate) fn edited_lesson(stored: &Lesson, edit: &mut dyn FnMut(&mut Lesson)) -> Lesson {
    let mut lesson = stored.clone();
    edit(&mut lesson);
    lesson.id = stored.id;
    lesson.owner = stored.owner;
    lesson.created_at = stored.created_at;
    lesson
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if another user already has the email.
    fn put_user(&self, user: &User) -> Result<()>;

    /// Insert a user that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the ID or the email is already taken.
    fn insert_user(&self, user: &User) -> Result<()>;

    /// Edit a stored user inside one write section and return the result.
    ///
    /// `edit` may change the profile and group membership. The ID, activity
    /// flag, join date and last login are kept as stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist, or
    /// `StoreError::Conflict` if the new email belongs to someone else.
    fn update_user(&self, user_id: &UserId, edit: &mut dyn FnMut(&mut User)) -> Result<User>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Delete a user together with everything they own: their courses
    /// (with those courses' lessons, subscriptions and payments), their
    /// lessons, subscriptions and payments.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    fn delete_user(&self, user_id: &UserId) -> Result<()>;

    /// Set `last_login` to `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    fn record_login(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<()>;

    /// Deactivate every active user idle since before `cutoff`.
    ///
    /// Returns the number of users deactivated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn deactivate_idle_users(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    // =========================================================================
    // Course Operations
    // =========================================================================

    /// Insert or update a course.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_course(&self, course: &Course) -> Result<()>;

    /// Edit a stored course inside one write section and return the result.
    ///
    /// The ID, owner, creation time and `last_notification_sent` are kept as
    /// stored, so an edit never undoes a concurrent notification stamp.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the course doesn't exist.
    fn update_course(
        &self,
        course_id: &CourseId,
        edit: &mut dyn FnMut(&mut Course),
    ) -> Result<Course>;

    /// Get a course by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_course(&self, course_id: &CourseId) -> Result<Option<Course>>;

    /// List courses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_courses(&self, limit: usize, offset: usize) -> Result<Page<Course>>;

    /// Delete a course with its lessons, subscriptions and payments.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the course doesn't exist.
    fn delete_course(&self, course_id: &CourseId) -> Result<()>;

    /// Atomically set `last_notification_sent` to `now` if it is unset or
    /// older than `now - cooldown`.
    ///
    /// Returns the stamped course, or `None` when the cooldown has not
    /// elapsed or the course no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn stamp_notification(
        &self,
        course_id: &CourseId,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<Option<Course>>;

    // =========================================================================
    // Lesson Operations
    // =========================================================================

    /// Insert or update a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the lesson's course doesn't exist.
    fn put_lesson(&self, lesson: &Lesson) -> Result<()>;

    /// Edit a stored lesson inside one write section and return the result.
    ///
    /// The ID, owner and creation time are kept as stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the lesson or its (new) course
    /// doesn't exist.
    fn update_lesson(
        &self,
        lesson_id: &LessonId,
        edit: &mut dyn FnMut(&mut Lesson),
    ) -> Result<Lesson>;

    /// Get a lesson by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_lesson(&self, lesson_id: &LessonId) -> Result<Option<Lesson>>;

    /// List lessons across all courses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_lessons(&self, limit: usize, offset: usize) -> Result<Page<Lesson>>;

    /// List every lesson of one course, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_lessons_by_course(&self, course_id: &CourseId) -> Result<Vec<Lesson>>;

    /// Delete a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the lesson doesn't exist.
    fn delete_lesson(&self, lesson_id: &LessonId) -> Result<()>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Subscribe if not subscribed, unsubscribe otherwise, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the course doesn't exist.
    fn toggle_subscription(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionToggle>;

    /// Whether the user is subscribed to the course.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_subscribed(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool>;

    /// Every user subscribed to the course.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_subscribers(&self, course_id: &CourseId) -> Result<Vec<User>>;

    // =========================================================================
    // Payment Operations
    // =========================================================================

    /// Insert a new payment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the payment ID is already taken.
    fn insert_payment(&self, payment: &Payment) -> Result<()>;

    /// Get a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>>;

    /// Find the payment opened for a checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>>;

    /// List a user's payments, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<Payment>>;

    /// Move a payment out of `created`, atomically.
    ///
    /// Returns the updated payment, or `None` when the payment had already
    /// left `created` and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the payment doesn't exist.
    fn transition_payment(&self, payment_id: &PaymentId, to: PaymentStatus)
        -> Result<Option<Payment>>;
}
