//! Courses and lessons.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::{CourseId, LessonId, UserId};

/// Maximum length of course and lesson titles, in characters.
pub const TITLE_MAX_CHARS: usize = 150;

/// Lowest rating a course can be given. Zero means "unrated".
pub const RATING_MIN: u8 = 1;

/// Highest rating a course can be given.
pub const RATING_MAX: u8 = 5;

/// Only videos hosted on YouTube may be attached to lessons.
static VIDEO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?(?:youtube\.com|youtu\.be)/")
        .expect("video url pattern compiles")
});

/// A course: the unit that is sold and subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course identifier.
    pub id: CourseId,
    /// Title, 1 to 150 characters.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Creator of the course, if still known.
    pub owner: Option<UserId>,
    /// Price in major units. `None` means the course cannot be bought.
    pub price: Option<Decimal>,
    /// Rating from 1 to 5, or 0 when unrated.
    pub rating: u8,
    /// When subscribers were last notified about an update.
    pub last_notification_sent: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Course {
    /// Create an unpriced, unrated course owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is empty or too long.
    pub fn new(
        owner: UserId,
        title: &str,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: CourseId::generate(),
            title: validate_title(title)?,
            description,
            owner: Some(owner),
            price: None,
            rating: 0,
            last_notification_sent: None,
            created_at: now,
        })
    }

    /// The amount a buyer pays for this course.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PriceNotSet` when the price is missing or zero.
    pub fn sale_price(&self) -> Result<Decimal> {
        match self.price {
            Some(price) if !price.is_zero() => Ok(price),
            _ => Err(DomainError::PriceNotSet),
        }
    }

    /// Whether subscribers may be notified again at `now`.
    #[must_use]
    pub fn notification_due(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_notification_sent
            .map_or(true, |sent| sent < now - cooldown)
    }
}

/// A lesson belonging to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson identifier.
    pub id: LessonId,
    /// Parent course.
    pub course: CourseId,
    /// Title, 1 to 150 characters.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Link to the lesson video.
    pub video_url: String,
    /// Creator of the lesson, if still known.
    pub owner: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    /// Create a lesson owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a bad title or video URL.
    pub fn new(
        owner: UserId,
        course: CourseId,
        title: &str,
        description: String,
        video_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: LessonId::generate(),
            course,
            title: validate_title(title)?,
            description,
            video_url: validate_video_url(video_url)?,
            owner: Some(owner),
            created_at: now,
        })
    }
}

/// Trim and validate a title.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the title is blank or longer than
/// 150 characters.
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title", "must not be blank"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation(
            "title",
            format!("must be at most {TITLE_MAX_CHARS} characters"),
        ));
    }
    Ok(title.to_string())
}

/// Validate an explicitly supplied rating.
///
/// # Errors
///
/// Returns `DomainError::Validation` unless the rating is between 1 and 5.
pub fn validate_rating(rating: u8) -> Result<u8> {
    if (RATING_MIN..=RATING_MAX).contains(&rating) {
        Ok(rating)
    } else {
        Err(DomainError::validation(
            "rating",
            format!("must be between {RATING_MIN} and {RATING_MAX}"),
        ))
    }
}

/// Check that a video link points at YouTube.
///
/// # Errors
///
/// Returns `DomainError::Validation` for any other host.
pub fn validate_video_url(url: &str) -> Result<String> {
    let url = url.trim();
    if VIDEO_URL.is_match(url) {
        Ok(url.to_string())
    } else {
        Err(DomainError::validation(
            "video_url",
            "only youtube.com links are allowed",
        ))
    }
}
