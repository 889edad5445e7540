//! Background delivery of course update notifications.

use std::sync::Arc;

use course_hub_store::Store;
use tokio::sync::mpsc;

use super::{EmailClient, NotificationJob};

fn subject(title: &str) -> String {
    format!("Обновление в курсе \"{title}\"")
}

fn body(greeting_name: &str, title: &str) -> String {
    format!(
        "Здравствуйте, {greeting_name}!\n\n\
         В курсе \"{title}\", на который вы подписаны, появилось обновление.\n\n\
         С уважением,\nКоманда LMS"
    )
}

/// Mail every active subscriber of the job's course.
///
/// Returns the number of emails accepted by the mail API. Failures are
/// logged per recipient and not retried.
pub async fn deliver(store: &dyn Store, mailer: &EmailClient, job: &NotificationJob) -> usize {
    let subscribers = match store.list_subscribers(&job.course_id) {
        Ok(subscribers) => subscribers,
        Err(e) => {
            tracing::error!(course_id = %job.course_id, error = %e, "Failed to load subscribers");
            return 0;
        }
    };

    let subject = subject(&job.title);
    let mut sent = 0;

    for user in subscribers.iter().filter(|u| u.is_active) {
        let name = user.first_name.as_deref().unwrap_or(&user.email);
        match mailer
            .send_email(&user.email, &subject, &body(name, &job.title))
            .await
        {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(
                    course_id = %job.course_id,
                    user_id = %user.id,
                    error = %e,
                    "Failed to send course update email"
                );
            }
        }
    }

    tracing::info!(
        course_id = %job.course_id,
        sent,
        subscribers = subscribers.len(),
        "Course update notifications sent"
    );
    sent
}

/// Consume jobs until every sender is dropped.
///
/// Without a mail client, jobs are drained and logged only.
pub async fn run_worker(
    store: Arc<dyn Store>,
    mailer: Option<EmailClient>,
    mut rx: mpsc::UnboundedReceiver<NotificationJob>,
) {
    while let Some(job) = rx.recv().await {
        match &mailer {
            Some(mailer) => {
                deliver(store.as_ref(), mailer, &job).await;
            }
            None => {
                tracing::debug!(
                    course_id = %job.course_id,
                    "Mail API not configured; skipping course update notification"
                );
            }
        }
    }
    tracing::debug!("Notification worker stopped");
}
