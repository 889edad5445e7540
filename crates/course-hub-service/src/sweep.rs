//! Periodic deactivation of idle users.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use course_hub_store::Store;

/// Deactivate active users idle for more than `inactivity_days` at `now`.
///
/// Users who never logged in are judged by their registration time.
///
/// # Errors
///
/// Returns an error if the store operation fails.
pub fn deactivate_inactive_users(
    store: &dyn Store,
    inactivity_days: i64,
    now: DateTime<Utc>,
) -> course_hub_store::Result<usize> {
    let cutoff = now - chrono::Duration::days(inactivity_days);
    let count = store.deactivate_idle_users(cutoff)?;
    tracing::info!(deactivated = count, cutoff = %cutoff, "Inactive users deactivated");
    Ok(count)
}

/// Run the sweep every `every` until the runtime shuts down.
///
/// The first run happens one full interval after start. A zero interval is
/// treated as one second.
pub async fn run_sweeper(store: Arc<dyn Store>, inactivity_days: i64, every: Duration) {
    let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        if let Err(e) = deactivate_inactive_users(store.as_ref(), inactivity_days, Utc::now()) {
            tracing::error!(error = %e, "Inactive-user sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use course_hub_core::{User, UserId};
    use course_hub_store::MemoryStore;

    #[test]
    fn only_users_idle_past_threshold_are_deactivated() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut stale = User::new(UserId::generate(), "stale@example.com", now - ChronoDuration::days(90))
            .unwrap();
        stale.last_login = Some(now - ChronoDuration::days(31));

        let mut fresh = User::new(UserId::generate(), "fresh@example.com", now - ChronoDuration::days(90))
            .unwrap();
        fresh.last_login = Some(now - ChronoDuration::days(2));

        let never_old =
            User::new(UserId::generate(), "never-old@example.com", now - ChronoDuration::days(45))
                .unwrap();
        let never_new =
            User::new(UserId::generate(), "never-new@example.com", now - ChronoDuration::days(3))
                .unwrap();

        for user in [&stale, &fresh, &never_old, &never_new] {
            store.put_user(user).unwrap();
        }

        assert_eq!(deactivate_inactive_users(&store, 30, now).unwrap(), 2);

        let active = |id: &UserId| store.get_user(id).unwrap().unwrap().is_active;
        assert!(!active(&stale.id));
        assert!(active(&fresh.id));
        assert!(!active(&never_old.id));
        assert!(active(&never_new.id));

        // Already inactive users are not counted again.
        assert_eq!(deactivate_inactive_users(&store, 30, now).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_after_one_interval() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let idle = User::new(UserId::generate(), "idle@example.com", now - ChronoDuration::days(60))
            .unwrap();
        store.put_user(&idle).unwrap();

        let handle = tokio::spawn(run_sweeper(
            store.clone(),
            30,
            Duration::from_secs(60),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        // Let the sweeper task observe the tick.
        tokio::task::yield_now().await;

        assert!(!store.get_user(&idle.id).unwrap().unwrap().is_active);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_does_not_panic() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let idle = User::new(UserId::generate(), "idle@example.com", now - ChronoDuration::days(60))
            .unwrap();
        store.put_user(&idle).unwrap();

        let handle = tokio::spawn(run_sweeper(store.clone(), 30, Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert!(!handle.is_finished());
        assert!(!store.get_user(&idle.id).unwrap().unwrap().is_active);
        handle.abort();
    }
}
