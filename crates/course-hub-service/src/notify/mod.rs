//! Course update notifications.
//!
//! Updating a course or one of its lessons stamps the course and enqueues a
//! [`NotificationJob`], at most once per cooldown window. A background
//! worker drains the queue and mails every active subscriber.

pub mod email_client;
pub mod worker;

use chrono::{DateTime, Duration, Utc};
use course_hub_core::CourseId;
use course_hub_store::Store;
use tokio::sync::mpsc;

pub use email_client::{EmailClient, MailError};
pub use worker::{deliver, run_worker};

/// A pending "course was updated" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    /// Updated course.
    pub course_id: CourseId,
    /// Course title at stamp time.
    pub title: String,
}

/// Rate-limited producer side of the notification queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<NotificationJob>,
    cooldown: Duration,
}

impl Notifier {
    /// Create a notifier and the receiving end for the worker.
    #[must_use]
    pub fn channel(cooldown: Duration) -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cooldown }, rx)
    }

    /// Record that `course_id` changed at `now`.
    ///
    /// Returns `true` if a job was enqueued, `false` when the course was
    /// notified within the cooldown (or no longer exists). Never waits for
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if stamping the course fails.
    pub fn course_updated(
        &self,
        store: &dyn Store,
        course_id: &CourseId,
        now: DateTime<Utc>,
    ) -> course_hub_store::Result<bool> {
        let Some(course) = store.stamp_notification(course_id, now, self.cooldown)? else {
            tracing::debug!(course_id = %course_id, "Notification suppressed by cooldown");
            return Ok(false);
        };

        let job = NotificationJob {
            course_id: course.id,
            title: course.title,
        };

        if self.tx.send(job).is_err() {
            tracing::warn!(course_id = %course_id, "Notification worker is gone; job dropped");
            return Ok(false);
        }

        tracing::info!(course_id = %course_id, "Course update notification enqueued");
        Ok(true)
    }
}
