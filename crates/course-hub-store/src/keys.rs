//! Key encoding utilities for `RocksDB`.
//!
//! Entity keys are the raw 16 id bytes. Index keys concatenate two ids so a
//! prefix scan over the first one yields the second.

use course_hub_core::{CourseId, LessonId, PaymentId, UserId};

/// Length of every id encoding.
pub const ID_LEN: usize = 16;

/// Concatenate two 16-byte ids into a 32-byte index key.
#[must_use]
pub fn pair_key(first: &[u8; ID_LEN], second: &[u8; ID_LEN]) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(first);
    key.extend_from_slice(second);
    key
}

/// Split the trailing id out of a 32-byte index key.
///
/// Returns `None` when the key has the wrong length.
#[must_use]
pub fn pair_suffix(key: &[u8]) -> Option<[u8; ID_LEN]> {
    if key.len() != ID_LEN * 2 {
        return None;
    }
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[ID_LEN..]);
    Some(bytes)
}

/// Key of a user record.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Key of the email uniqueness index.
#[must_use]
pub fn email_key(email: &str) -> Vec<u8> {
    email.to_lowercase().into_bytes()
}

/// Key of a course record.
#[must_use]
pub fn course_key(course_id: &CourseId) -> Vec<u8> {
    course_id.as_bytes().to_vec()
}

/// Key of a lesson record.
#[must_use]
pub fn lesson_key(lesson_id: &LessonId) -> Vec<u8> {
    lesson_id.as_bytes().to_vec()
}

/// Index key: `course_id || lesson_id`.
#[must_use]
pub fn course_lesson_key(course_id: &CourseId, lesson_id: &LessonId) -> Vec<u8> {
    pair_key(course_id.as_bytes(), lesson_id.as_bytes())
}

/// Subscription key: `user_id || course_id`.
#[must_use]
pub fn subscription_key(user_id: &UserId, course_id: &CourseId) -> Vec<u8> {
    pair_key(user_id.as_bytes(), course_id.as_bytes())
}

/// Index key: `course_id || user_id`.
#[must_use]
pub fn course_subscriber_key(course_id: &CourseId, user_id: &UserId) -> Vec<u8> {
    pair_key(course_id.as_bytes(), user_id.as_bytes())
}

/// Key of a payment record.
#[must_use]
pub fn payment_key(payment_id: &PaymentId) -> Vec<u8> {
    payment_id.to_bytes().to_vec()
}

/// Index key: `user_id || payment_id`.
///
/// ULIDs are time-ordered, so a user's payments sort by creation time.
#[must_use]
pub fn user_payment_key(user_id: &UserId, payment_id: &PaymentId) -> Vec<u8> {
    pair_key(user_id.as_bytes(), &payment_id.to_bytes())
}

/// Index key: `course_id || payment_id`.
#[must_use]
pub fn course_payment_key(course_id: &CourseId, payment_id: &PaymentId) -> Vec<u8> {
    pair_key(course_id.as_bytes(), &payment_id.to_bytes())
}

/// Key of the checkout session index.
#[must_use]
pub fn session_key(session_id: &str) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}
