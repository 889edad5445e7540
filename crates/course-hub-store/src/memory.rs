//! In-memory storage implementation.
//!
//! All tables live behind a single `RwLock`, so every compound operation runs
//! inside one write section and is atomic with respect to other callers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use course_hub_core::{
    Course, CourseId, Lesson, LessonId, Payment, PaymentId, PaymentStatus, Subscription,
    SubscriptionToggle, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{edited_course, edited_lesson, edited_user, Page, Store};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    subscriptions: BTreeMap<(UserId, CourseId), Subscription>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl Tables {
    fn check_email_free(&self, user: &User) -> Result<()> {
        let taken = self
            .users
            .values()
            .any(|other| other.id != user.id && other.email == user.email);
        if taken {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        Ok(())
    }

    fn remove_course_cascade(&mut self, course_id: &CourseId) {
        self.courses.remove(course_id);
        self.lessons.retain(|_, lesson| lesson.course != *course_id);
        self.subscriptions.retain(|(_, course), _| course != course_id);
        self.payments.retain(|_, payment| payment.course != *course_id);
    }
}

/// Storage backed by process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

fn oldest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

impl Store for MemoryStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        let mut tables = self.write()?;
        tables.check_email_free(user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!(
                "user already registered: {}",
                user.id
            )));
        }
        tables.check_email_free(user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    fn update_user(&self, user_id: &UserId, edit: &mut dyn FnMut(&mut User)) -> Result<User> {
        let mut tables = self.write()?;
        let stored = tables
            .users
            .get(user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        let user = edited_user(stored, edit);
        tables.check_email_free(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let mut tables = self.write()?;
        if tables.users.remove(user_id).is_none() {
            return Err(StoreError::not_found("user", user_id));
        }

        let owned: Vec<CourseId> = tables
            .courses
            .values()
            .filter(|course| course.owner == Some(*user_id))
            .map(|course| course.id)
            .collect();
        for course_id in &owned {
            tables.remove_course_cascade(course_id);
        }

        tables.lessons.retain(|_, lesson| lesson.owner != Some(*user_id));
        tables.subscriptions.retain(|(user, _), _| user != user_id);
        tables.payments.retain(|_, payment| payment.user != *user_id);
        Ok(())
    }

    fn record_login(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<()> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        user.last_login = Some(now);
        Ok(())
    }

    fn deactivate_idle_users(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write()?;
        let mut count = 0;
        for user in tables.users.values_mut() {
            if user.is_idle_since(cutoff) {
                user.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    // =========================================================================
    // Course Operations
    // =========================================================================

    fn put_course(&self, course: &Course) -> Result<()> {
        self.write()?.courses.insert(course.id, course.clone());
        Ok(())
    }

    fn update_course(
        &self,
        course_id: &CourseId,
        edit: &mut dyn FnMut(&mut Course),
    ) -> Result<Course> {
        let mut tables = self.write()?;
        let stored = tables
            .courses
            .get_mut(course_id)
            .ok_or_else(|| StoreError::not_found("course", course_id))?;
        *stored = edited_course(stored, edit);
        Ok(stored.clone())
    }

    fn get_course(&self, course_id: &CourseId) -> Result<Option<Course>> {
        Ok(self.read()?.courses.get(course_id).cloned())
    }

    fn list_courses(&self, limit: usize, offset: usize) -> Result<Page<Course>> {
        let all: Vec<Course> = self.read()?.courses.values().cloned().collect();
        let all = oldest_first(all, |c: &Course| (c.created_at, c.id));
        Ok(Page::slice(all, limit, offset))
    }

    fn delete_course(&self, course_id: &CourseId) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.courses.contains_key(course_id) {
            return Err(StoreError::not_found("course", course_id));
        }
        tables.remove_course_cascade(course_id);
        Ok(())
    }

    fn stamp_notification(
        &self,
        course_id: &CourseId,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<Option<Course>> {
        let mut tables = self.write()?;
        let Some(course) = tables.courses.get_mut(course_id) else {
            return Ok(None);
        };
        if !course.notification_due(now, cooldown) {
            return Ok(None);
        }
        course.last_notification_sent = Some(now);
        Ok(Some(course.clone()))
    }

    // =========================================================================
    // Lesson Operations
    // =========================================================================

    fn put_lesson(&self, lesson: &Lesson) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.courses.contains_key(&lesson.course) {
            return Err(StoreError::not_found("course", lesson.course));
        }
        tables.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    fn update_lesson(
        &self,
        lesson_id: &LessonId,
        edit: &mut dyn FnMut(&mut Lesson),
    ) -> Result<Lesson> {
        let mut tables = self.write()?;
        let stored = tables
            .lessons
            .get(lesson_id)
            .ok_or_else(|| StoreError::not_found("lesson", lesson_id))?;
        let lesson = edited_lesson(stored, edit);
        if !tables.courses.contains_key(&lesson.course) {
            return Err(StoreError::not_found("course", lesson.course));
        }
        tables.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    fn get_lesson(&self, lesson_id: &LessonId) -> Result<Option<Lesson>> {
        Ok(self.read()?.lessons.get(lesson_id).cloned())
    }

    fn list_lessons(&self, limit: usize, offset: usize) -> Result<Page<Lesson>> {
        let all: Vec<Lesson> = self.read()?.lessons.values().cloned().collect();
        let all = oldest_first(all, |l: &Lesson| (l.created_at, l.id));
        Ok(Page::slice(all, limit, offset))
    }

    fn list_lessons_by_course(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        let rows: Vec<Lesson> = self
            .read()?
            .lessons
            .values()
            .filter(|lesson| lesson.course == *course_id)
            .cloned()
            .collect();
        Ok(oldest_first(rows, |l: &Lesson| (l.created_at, l.id)))
    }

    fn delete_lesson(&self, lesson_id: &LessonId) -> Result<()> {
        self.write()?
            .lessons
            .remove(lesson_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("lesson", lesson_id))
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn toggle_subscription(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionToggle> {
        let mut tables = self.write()?;
        if !tables.courses.contains_key(course_id) {
            return Err(StoreError::not_found("course", course_id));
        }

        let key = (*user_id, *course_id);
        if tables.subscriptions.remove(&key).is_some() {
            return Ok(SubscriptionToggle::Unsubscribed);
        }

        tables.subscriptions.insert(
            key,
            Subscription {
                user: *user_id,
                course: *course_id,
                created_at: now,
            },
        );
        Ok(SubscriptionToggle::Subscribed)
    }

    fn is_subscribed(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool> {
        Ok(self
            .read()?
            .subscriptions
            .contains_key(&(*user_id, *course_id)))
    }

    fn list_subscribers(&self, course_id: &CourseId) -> Result<Vec<User>> {
        let tables = self.read()?;
        let subscribers: BTreeSet<UserId> = tables
            .subscriptions
            .keys()
            .filter(|(_, course)| course == course_id)
            .map(|(user, _)| *user)
            .collect();
        Ok(subscribers
            .iter()
            .filter_map(|user_id| tables.users.get(user_id).cloned())
            .collect())
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut tables = self.write()?;
        if tables.payments.contains_key(&payment.id) {
            return Err(StoreError::Conflict(format!(
                "payment already exists: {}",
                payment.id
            )));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>> {
        Ok(self.read()?.payments.get(payment_id).cloned())
    }

    fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .read()?
            .payments
            .values()
            .find(|payment| payment.session_id.as_deref() == Some(session_id))
            .cloned())
    }

    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<Payment>> {
        // ULID keys iterate oldest first
        Ok(self
            .read()?
            .payments
            .values()
            .rev()
            .filter(|payment| payment.user == *user_id)
            .cloned()
            .collect())
    }

    fn transition_payment(
        &self,
        payment_id: &PaymentId,
        to: PaymentStatus,
    ) -> Result<Option<Payment>> {
        let mut tables = self.write()?;
        let payment = tables
            .payments
            .get_mut(payment_id)
            .ok_or_else(|| StoreError::not_found("payment", payment_id))?;
        if payment.status != PaymentStatus::Created {
            return Ok(None);
        }
        payment.status = to;
        Ok(Some(payment.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_none, assert_ok, assert_some};
    use rust_decimal::Decimal;

    fn user(store: &MemoryStore, email: &str) -> User {
        let user = User::new(UserId::generate(), email, Utc::now()).unwrap();
        store.put_user(&user).unwrap();
        user
    }

    fn course(store: &MemoryStore, owner: UserId) -> Course {
        let course = Course::new(owner, "Rust", "Systems".into(), Utc::now()).unwrap();
        store.put_course(&course).unwrap();
        course
    }

    fn lesson(store: &MemoryStore, owner: UserId, course: CourseId) -> Lesson {
        let lesson = Lesson::new(
            owner,
            course,
            "Borrowing",
            String::new(),
            "https://youtu.be/dQw4w9WgXcQ",
            Utc::now(),
        )
        .unwrap();
        store.put_lesson(&lesson).unwrap();
        lesson
    }

    fn payment(store: &MemoryStore, user: UserId, course: CourseId, session: &str) -> Payment {
        let payment = Payment::created(
            user,
            course,
            Decimal::new(10000, 2),
            session.into(),
            Some(format!("https://checkout.stripe.com/{session}")),
            Utc::now(),
        );
        store.insert_payment(&payment).unwrap();
        payment
    }

    #[test]
    fn toggle_cycles_between_subscribed_and_unsubscribed() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let now = Utc::now();

        let first = store.toggle_subscription(&owner.id, &course.id, now).unwrap();
        let second = store.toggle_subscription(&owner.id, &course.id, now).unwrap();
        let third = store.toggle_subscription(&owner.id, &course.id, now).unwrap();

        assert_eq!(first, SubscriptionToggle::Subscribed);
        assert_eq!(second, SubscriptionToggle::Unsubscribed);
        assert_eq!(third, SubscriptionToggle::Subscribed);
        assert!(store.is_subscribed(&owner.id, &course.id).unwrap());
        assert_eq!(store.list_subscribers(&course.id).unwrap().len(), 1);
    }

    #[test]
    fn toggle_on_missing_course_is_not_found() {
        let store = MemoryStore::new();
        let result =
            store.toggle_subscription(&UserId::generate(), &CourseId::generate(), Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound { entity: "course", .. })));
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        user(&store, "same@example.com");
        let other = User::new(UserId::generate(), "same@example.com", Utc::now()).unwrap();
        assert!(matches!(store.put_user(&other), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn lesson_needs_existing_course() {
        let store = MemoryStore::new();
        let lesson = Lesson::new(
            UserId::generate(),
            CourseId::generate(),
            "Orphan",
            String::new(),
            "https://youtube.com/watch?v=x",
            Utc::now(),
        )
        .unwrap();
        assert_err!(store.put_lesson(&lesson));
    }

    #[test]
    fn notification_stamp_is_compare_and_swap() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let now = Utc::now();
        let cooldown = Duration::hours(4);

        assert_some!(store.stamp_notification(&course.id, now, cooldown).unwrap());
        assert_none!(store
            .stamp_notification(&course.id, now + Duration::hours(1), cooldown)
            .unwrap());
        assert_some!(store
            .stamp_notification(&course.id, now + Duration::hours(5), cooldown)
            .unwrap());
        assert_none!(store
            .stamp_notification(&CourseId::generate(), now, cooldown)
            .unwrap());
    }

    #[test]
    fn course_edit_keeps_notification_stamp() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let now = Utc::now();
        let cooldown = Duration::hours(4);

        // An editor holding a copy loaded before the stamp.
        let stale = store.get_course(&course.id).unwrap().unwrap();
        assert_some!(store.stamp_notification(&course.id, now, cooldown).unwrap());

        let edited = store
            .update_course(&course.id, &mut |c| {
                c.title = "Rust 2024".into();
                c.last_notification_sent = stale.last_notification_sent;
            })
            .unwrap();

        assert_eq!(edited.title, "Rust 2024");
        assert_eq!(edited.last_notification_sent, Some(now));
        assert_none!(store
            .stamp_notification(&course.id, now + Duration::minutes(1), cooldown)
            .unwrap());
    }

    #[test]
    fn edit_of_deleted_rows_is_not_found() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let lesson = lesson(&store, owner.id, course.id);
        store.delete_course(&course.id).unwrap();

        let result = store.update_course(&course.id, &mut |c| c.title = "Back".into());
        assert!(matches!(result, Err(StoreError::NotFound { entity: "course", .. })));
        assert_none!(store.get_course(&course.id).unwrap());

        let result = store.update_lesson(&lesson.id, &mut |l| l.title = "Back".into());
        assert!(matches!(result, Err(StoreError::NotFound { entity: "lesson", .. })));
    }

    #[test]
    fn lesson_edit_needs_existing_course() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let lesson = lesson(&store, owner.id, course.id);

        let result = store.update_lesson(&lesson.id, &mut |l| l.course = CourseId::generate());
        assert!(matches!(result, Err(StoreError::NotFound { entity: "course", .. })));
        assert_eq!(store.get_lesson(&lesson.id).unwrap().unwrap().course, course.id);
    }

    #[test]
    fn user_edit_keeps_swept_account_inactive() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let idle = User::new(UserId::generate(), "idle@example.com", now - Duration::days(60))
            .unwrap();
        store.put_user(&idle).unwrap();
        assert_eq!(store.deactivate_idle_users(now - Duration::days(30)).unwrap(), 1);

        // `idle` still says active; the edit must not write that back.
        let edited = store
            .update_user(&idle.id, &mut |u| {
                *u = idle.clone();
                u.city = Some("Kazan".into());
            })
            .unwrap();

        assert!(!edited.is_active);
        assert_eq!(edited.city.as_deref(), Some("Kazan"));
        assert!(!store.get_user(&idle.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn user_edit_checks_email_and_existence() {
        let store = MemoryStore::new();
        user(&store, "taken@example.com");
        let me = user(&store, "me@example.com");

        let result = store.update_user(&me.id, &mut |u| u.email = "taken@example.com".into());
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.get_user(&me.id).unwrap().unwrap().email, "me@example.com");

        let result = store.update_user(&UserId::generate(), &mut |u| u.city = None);
        assert!(matches!(result, Err(StoreError::NotFound { entity: "user", .. })));
    }

    #[test]
    fn insert_user_never_overwrites() {
        let store = MemoryStore::new();
        let me = user(&store, "me@example.com");

        let mut again = User::new(me.id, "other@example.com", Utc::now()).unwrap();
        again.city = Some("Omsk".into());
        assert!(matches!(store.insert_user(&again), Err(StoreError::Conflict(_))));
        assert_eq!(store.get_user(&me.id).unwrap().unwrap().email, "me@example.com");

        let fresh = User::new(UserId::generate(), "fresh@example.com", Utc::now()).unwrap();
        assert_ok!(store.insert_user(&fresh));
    }

    #[test]
    fn payment_transition_applies_once() {
        let store = MemoryStore::new();
        let buyer = user(&store, "buyer@example.com");
        let course = course(&store, buyer.id);
        let payment = payment(&store, buyer.id, course.id, "cs_test_1");

        let applied = store
            .transition_payment(&payment.id, PaymentStatus::Succeeded)
            .unwrap();
        assert_eq!(applied.unwrap().status, PaymentStatus::Succeeded);

        assert_none!(store
            .transition_payment(&payment.id, PaymentStatus::Canceled)
            .unwrap());
        let stored = store.get_payment(&payment.id).unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn payments_list_newest_first_and_by_session() {
        let store = MemoryStore::new();
        let buyer = user(&store, "buyer@example.com");
        let course = course(&store, buyer.id);
        let older = payment(&store, buyer.id, course.id, "cs_old");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer = payment(&store, buyer.id, course.id, "cs_new");
        payment(&store, UserId::generate(), course.id, "cs_other");

        let listed = store.list_payments_by_user(&buyer.id).unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let found = store.find_payment_by_session("cs_old").unwrap().unwrap();
        assert_eq!(found.id, older.id);
        assert_none!(store.find_payment_by_session("cs_missing").unwrap());
    }

    #[test]
    fn deleting_course_cascades() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let course = course(&store, owner.id);
        let lesson = lesson(&store, owner.id, course.id);
        let payment = payment(&store, owner.id, course.id, "cs_1");
        store.toggle_subscription(&owner.id, &course.id, Utc::now()).unwrap();

        assert_ok!(store.delete_course(&course.id));

        assert_none!(store.get_lesson(&lesson.id).unwrap());
        assert_none!(store.get_payment(&payment.id).unwrap());
        assert!(!store.is_subscribed(&owner.id, &course.id).unwrap());
        assert_err!(store.delete_course(&course.id));
    }

    #[test]
    fn deleting_user_cascades_to_owned_content() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let other = user(&store, "other@example.com");
        let owned = course(&store, owner.id);
        let foreign = course(&store, other.id);
        let lesson_in_foreign = lesson(&store, owner.id, foreign.id);
        let kept = lesson(&store, other.id, foreign.id);

        store.delete_user(&owner.id).unwrap();

        assert_none!(store.get_user(&owner.id).unwrap());
        assert_none!(store.get_course(&owned.id).unwrap());
        assert_none!(store.get_lesson(&lesson_in_foreign.id).unwrap());
        assert_some!(store.get_course(&foreign.id).unwrap());
        assert_some!(store.get_lesson(&kept.id).unwrap());
    }

    #[test]
    fn idle_users_are_deactivated() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut idle = User::new(UserId::generate(), "idle@example.com", now - Duration::days(60))
            .unwrap();
        idle.last_login = Some(now - Duration::days(45));
        let never = User::new(UserId::generate(), "never@example.com", now - Duration::days(31))
            .unwrap();
        let mut recent =
            User::new(UserId::generate(), "recent@example.com", now - Duration::days(90)).unwrap();
        recent.last_login = Some(now - Duration::days(1));
        let fresh = User::new(UserId::generate(), "fresh@example.com", now).unwrap();
        for u in [&idle, &never, &recent, &fresh] {
            store.put_user(u).unwrap();
        }

        let count = store.deactivate_idle_users(now - Duration::days(30)).unwrap();

        assert_eq!(count, 2);
        assert!(!store.get_user(&idle.id).unwrap().unwrap().is_active);
        assert!(!store.get_user(&never.id).unwrap().unwrap().is_active);
        assert!(store.get_user(&recent.id).unwrap().unwrap().is_active);
        assert!(store.get_user(&fresh.id).unwrap().unwrap().is_active);
        assert_eq!(store.deactivate_idle_users(now - Duration::days(30)).unwrap(), 0);
    }

    #[test]
    fn course_listing_is_paginated_oldest_first() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com");
        let base = Utc::now();
        for i in 0..7 {
            let mut c = Course::new(owner.id, &format!("Course {i}"), String::new(), base).unwrap();
            c.created_at = base + Duration::seconds(i);
            store.put_course(&c).unwrap();
        }

        let page = store.list_courses(5, 5).unwrap();
        assert_eq!(page.total, 7);
        let titles: Vec<_> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Course 5", "Course 6"]);
    }
}
