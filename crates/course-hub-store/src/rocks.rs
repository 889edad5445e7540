//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Values are CBOR-encoded. Every mutation runs under `write_lock` and lands
//! in a single `WriteBatch`, so compound operations are atomic and
//! check-then-act sequences cannot interleave.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use course_hub_core::{
    Course, CourseId, Lesson, LessonId, Payment, PaymentId, PaymentStatus, Subscription,
    SubscriptionToggle, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys::{self, ID_LEN};
use crate::schema::{all_column_families, cf};
use crate::{edited_course, edited_lesson, edited_user, Page, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    // =========================================================================
    // Read helpers
    // =========================================================================

    fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db.get_cf(&cf, key).map_err(db_err)
    }

    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        self.get_raw(cf_name, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(db_err)?;
            rows.push(Self::deserialize(&value)?);
        }
        Ok(rows)
    }

    /// Trailing ids of every index key under `prefix`, in key order.
    fn index_suffixes(&self, cf_name: &str, prefix: &[u8; ID_LEN]) -> Result<Vec<[u8; ID_LEN]>> {
        let cf = self.cf(cf_name)?;
        let mut suffixes = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(suffix) = keys::pair_suffix(&key) {
                suffixes.push(suffix);
            }
        }
        Ok(suffixes)
    }

    // =========================================================================
    // Batch helpers
    // =========================================================================

    fn stage_put<T: serde::Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(&cf, key, Self::serialize(value)?);
        Ok(())
    }

    fn stage_raw(&self, batch: &mut WriteBatch, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(&cf, key, value);
        Ok(())
    }

    fn stage_delete(&self, batch: &mut WriteBatch, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.delete_cf(&cf, key);
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch).map_err(db_err)
    }

    fn stage_lesson_delete(&self, batch: &mut WriteBatch, lesson: &Lesson) -> Result<()> {
        self.stage_delete(batch, cf::LESSONS, &keys::lesson_key(&lesson.id))?;
        self.stage_delete(
            batch,
            cf::LESSONS_BY_COURSE,
            &keys::course_lesson_key(&lesson.course, &lesson.id),
        )
    }

    fn stage_subscription_delete(
        &self,
        batch: &mut WriteBatch,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<()> {
        self.stage_delete(
            batch,
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(user_id, course_id),
        )?;
        self.stage_delete(
            batch,
            cf::SUBSCRIBERS_BY_COURSE,
            &keys::course_subscriber_key(course_id, user_id),
        )
    }

    fn stage_payment_delete(&self, batch: &mut WriteBatch, payment: &Payment) -> Result<()> {
        self.stage_delete(batch, cf::PAYMENTS, &keys::payment_key(&payment.id))?;
        self.stage_delete(
            batch,
            cf::PAYMENTS_BY_USER,
            &keys::user_payment_key(&payment.user, &payment.id),
        )?;
        self.stage_delete(
            batch,
            cf::PAYMENTS_BY_COURSE,
            &keys::course_payment_key(&payment.course, &payment.id),
        )?;
        if let Some(session_id) = &payment.session_id {
            self.stage_delete(batch, cf::PAYMENTS_BY_SESSION, &keys::session_key(session_id))?;
        }
        Ok(())
    }

    fn stage_course_delete(&self, batch: &mut WriteBatch, course_id: &CourseId) -> Result<()> {
        self.stage_delete(batch, cf::COURSES, &keys::course_key(course_id))?;

        for suffix in self.index_suffixes(cf::LESSONS_BY_COURSE, course_id.as_bytes())? {
            let lesson_id = LessonId::from_bytes(suffix);
            self.stage_delete(batch, cf::LESSONS, &keys::lesson_key(&lesson_id))?;
            self.stage_delete(
                batch,
                cf::LESSONS_BY_COURSE,
                &keys::course_lesson_key(course_id, &lesson_id),
            )?;
        }

        for suffix in self.index_suffixes(cf::SUBSCRIBERS_BY_COURSE, course_id.as_bytes())? {
            self.stage_subscription_delete(batch, &UserId::from_bytes(suffix), course_id)?;
        }

        for suffix in self.index_suffixes(cf::PAYMENTS_BY_COURSE, course_id.as_bytes())? {
            if let Some(payment) = self.get_payment(&PaymentId::from_bytes(suffix))? {
                self.stage_payment_delete(batch, &payment)?;
            }
        }
        Ok(())
    }

    /// Write a user and its email index entry. Caller holds `write_lock`.
    fn write_user(&self, user: &User) -> Result<()> {
        let user_key = keys::user_key(&user.id);
        let email_key = keys::email_key(&user.email);

        if let Some(owner) = self.get_raw(cf::USERS_BY_EMAIL, &email_key)? {
            if owner != user_key {
                return Err(StoreError::Conflict(format!(
                    "email already registered: {}",
                    user.email
                )));
            }
        }

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_user(&user.id)? {
            if keys::email_key(&previous.email) != email_key {
                self.stage_delete(
                    &mut batch,
                    cf::USERS_BY_EMAIL,
                    &keys::email_key(&previous.email),
                )?;
            }
        }
        self.stage_put(&mut batch, cf::USERS, &user_key, user)?;
        self.stage_raw(&mut batch, cf::USERS_BY_EMAIL, &email_key, &user_key)?;
        self.commit(batch)
    }

    /// Write a lesson and move its course index entry. Caller holds `write_lock`.
    fn write_lesson(&self, lesson: &Lesson) -> Result<()> {
        if self.get_course(&lesson.course)?.is_none() {
            return Err(StoreError::not_found("course", lesson.course));
        }

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_lesson(&lesson.id)? {
            if previous.course != lesson.course {
                self.stage_delete(
                    &mut batch,
                    cf::LESSONS_BY_COURSE,
                    &keys::course_lesson_key(&previous.course, &previous.id),
                )?;
            }
        }
        self.stage_put(&mut batch, cf::LESSONS, &keys::lesson_key(&lesson.id), lesson)?;
        self.stage_raw(
            &mut batch,
            cf::LESSONS_BY_COURSE,
            &keys::course_lesson_key(&lesson.course, &lesson.id),
            &[],
        )?;
        self.commit(batch)
    }
}

fn oldest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock()?;
        self.write_user(user)
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock()?;
        if self.get_user(&user.id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "user already registered: {}",
                user.id
            )));
        }
        self.write_user(user)
    }

    fn update_user(&self, user_id: &UserId, edit: &mut dyn FnMut(&mut User)) -> Result<User> {
        let _guard = self.lock()?;
        let stored = self
            .get_user(user_id)?
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        let user = edited_user(&stored, edit);
        self.write_user(&user)?;
        Ok(user)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get(cf::USERS, &keys::user_key(user_id))
    }

    fn delete_user(&self, user_id: &UserId) -> Result<()> {
        let _guard = self.lock()?;
        let user = self
            .get_user(user_id)?
            .ok_or_else(|| StoreError::not_found("user", user_id))?;

        let mut batch = WriteBatch::default();
        self.stage_delete(&mut batch, cf::USERS, &keys::user_key(user_id))?;
        self.stage_delete(&mut batch, cf::USERS_BY_EMAIL, &keys::email_key(&user.email))?;

        for course in self.scan::<Course>(cf::COURSES)? {
            if course.owner == Some(*user_id) {
                self.stage_course_delete(&mut batch, &course.id)?;
            }
        }
        for lesson in self.scan::<Lesson>(cf::LESSONS)? {
            if lesson.owner == Some(*user_id) {
                self.stage_lesson_delete(&mut batch, &lesson)?;
            }
        }
        for suffix in self.index_suffixes(cf::SUBSCRIPTIONS, user_id.as_bytes())? {
            self.stage_subscription_delete(&mut batch, user_id, &CourseId::from_bytes(suffix))?;
        }
        for suffix in self.index_suffixes(cf::PAYMENTS_BY_USER, user_id.as_bytes())? {
            if let Some(payment) = self.get_payment(&PaymentId::from_bytes(suffix))? {
                self.stage_payment_delete(&mut batch, &payment)?;
            }
        }

        self.commit(batch)
    }

    fn record_login(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock()?;
        let mut user = self
            .get_user(user_id)?
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        user.last_login = Some(now);

        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::USERS, &keys::user_key(user_id), &user)?;
        self.commit(batch)
    }

    fn deactivate_idle_users(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let mut count = 0;

        for mut user in self.scan::<User>(cf::USERS)? {
            if user.is_idle_since(cutoff) {
                user.is_active = false;
                self.stage_put(&mut batch, cf::USERS, &keys::user_key(&user.id), &user)?;
                count += 1;
            }
        }

        self.commit(batch)?;
        Ok(count)
    }

    // =========================================================================
    // Course Operations
    // =========================================================================

    fn put_course(&self, course: &Course) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::COURSES, &keys::course_key(&course.id), course)?;
        self.commit(batch)
    }

    fn update_course(
        &self,
        course_id: &CourseId,
        edit: &mut dyn FnMut(&mut Course),
    ) -> Result<Course> {
        let _guard = self.lock()?;
        let stored = self
            .get_course(course_id)?
            .ok_or_else(|| StoreError::not_found("course", course_id))?;
        let course = edited_course(&stored, edit);

        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::COURSES, &keys::course_key(course_id), &course)?;
        self.commit(batch)?;
        Ok(course)
    }

    fn get_course(&self, course_id: &CourseId) -> Result<Option<Course>> {
        self.get(cf::COURSES, &keys::course_key(course_id))
    }

    fn list_courses(&self, limit: usize, offset: usize) -> Result<Page<Course>> {
        let all = oldest_first(self.scan::<Course>(cf::COURSES)?, |c| (c.created_at, c.id));
        Ok(Page::slice(all, limit, offset))
    }

    fn delete_course(&self, course_id: &CourseId) -> Result<()> {
        let _guard = self.lock()?;
        if self.get_course(course_id)?.is_none() {
            return Err(StoreError::not_found("course", course_id));
        }
        let mut batch = WriteBatch::default();
        self.stage_course_delete(&mut batch, course_id)?;
        self.commit(batch)
    }

    fn stamp_notification(
        &self,
        course_id: &CourseId,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<Option<Course>> {
        let _guard = self.lock()?;
        let Some(mut course) = self.get_course(course_id)? else {
            return Ok(None);
        };
        if !course.notification_due(now, cooldown) {
            return Ok(None);
        }
        course.last_notification_sent = Some(now);

        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::COURSES, &keys::course_key(course_id), &course)?;
        self.commit(batch)?;
        Ok(Some(course))
    }

    // =========================================================================
    // Lesson Operations
    // =========================================================================

    fn put_lesson(&self, lesson: &Lesson) -> Result<()> {
        let _guard = self.lock()?;
        self.write_lesson(lesson)
    }

    fn update_lesson(
        &self,
        lesson_id: &LessonId,
        edit: &mut dyn FnMut(&mut Lesson),
    ) -> Result<Lesson> {
        let _guard = self.lock()?;
        let stored = self
            .get_lesson(lesson_id)?
            .ok_or_else(|| StoreError::not_found("lesson", lesson_id))?;
        let lesson = edited_lesson(&stored, edit);
        self.write_lesson(&lesson)?;
        Ok(lesson)
    }

    fn get_lesson(&self, lesson_id: &LessonId) -> Result<Option<Lesson>> {
        self.get(cf::LESSONS, &keys::lesson_key(lesson_id))
    }

    fn list_lessons(&self, limit: usize, offset: usize) -> Result<Page<Lesson>> {
        let all = oldest_first(self.scan::<Lesson>(cf::LESSONS)?, |l| (l.created_at, l.id));
        Ok(Page::slice(all, limit, offset))
    }

    fn list_lessons_by_course(&self, course_id: &CourseId) -> Result<Vec<Lesson>> {
        let mut lessons = Vec::new();
        for suffix in self.index_suffixes(cf::LESSONS_BY_COURSE, course_id.as_bytes())? {
            if let Some(lesson) = self.get_lesson(&LessonId::from_bytes(suffix))? {
                lessons.push(lesson);
            }
        }
        Ok(oldest_first(lessons, |l| (l.created_at, l.id)))
    }

    fn delete_lesson(&self, lesson_id: &LessonId) -> Result<()> {
        let _guard = self.lock()?;
        let lesson = self
            .get_lesson(lesson_id)?
            .ok_or_else(|| StoreError::not_found("lesson", lesson_id))?;
        let mut batch = WriteBatch::default();
        self.stage_lesson_delete(&mut batch, &lesson)?;
        self.commit(batch)
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
        let _guard = self.lock()?;
        if self.get_course(course_id)?.is_none() {
            return Err(StoreError::not_found("course", course_id));
        }

        let key = keys::subscription_key(user_id, course_id);
        let mut batch = WriteBatch::default();

        let outcome = if self.get_raw(cf::SUBSCRIPTIONS, &key)?.is_some() {
            self.stage_subscription_delete(&mut batch, user_id, course_id)?;
            SubscriptionToggle::Unsubscribed
        } else {
            let subscription = Subscription {
                user: *user_id,
                course: *course_id,
                created_at: now,
            };
            self.stage_put(&mut batch, cf::SUBSCRIPTIONS, &key, &subscription)?;
            self.stage_raw(
                &mut batch,
                cf::SUBSCRIBERS_BY_COURSE,
                &keys::course_subscriber_key(course_id, user_id),
                &[],
            )?;
            SubscriptionToggle::Subscribed
        };

        self.commit(batch)?;
        Ok(outcome)
    }

    fn is_subscribed(&self, user_id: &UserId, course_id: &CourseId) -> Result<bool> {
        Ok(self
            .get_raw(cf::SUBSCRIPTIONS, &keys::subscription_key(user_id, course_id))?
            .is_some())
    }

    fn list_subscribers(&self, course_id: &CourseId) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for suffix in self.index_suffixes(cf::SUBSCRIBERS_BY_COURSE, course_id.as_bytes())? {
            if let Some(user) = self.get_user(&UserId::from_bytes(suffix))? {
                users.push(user);
            }
        }
        Ok(users)
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let _guard = self.lock()?;
        let payment_key = keys::payment_key(&payment.id);
        if self.get_raw(cf::PAYMENTS, &payment_key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "payment already exists: {}",
                payment.id
            )));
        }

        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::PAYMENTS, &payment_key, payment)?;
        self.stage_raw(
            &mut batch,
            cf::PAYMENTS_BY_USER,
            &keys::user_payment_key(&payment.user, &payment.id),
            &[],
        )?;
        self.stage_raw(
            &mut batch,
            cf::PAYMENTS_BY_COURSE,
            &keys::course_payment_key(&payment.course, &payment.id),
            &[],
        )?;
        if let Some(session_id) = &payment.session_id {
            self.stage_raw(
                &mut batch,
                cf::PAYMENTS_BY_SESSION,
                &keys::session_key(session_id),
                &payment_key,
            )?;
        }
        self.commit(batch)
    }

    fn get_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>> {
        self.get(cf::PAYMENTS, &keys::payment_key(payment_id))
    }

    fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>> {
        let Some(raw) = self.get_raw(cf::PAYMENTS_BY_SESSION, &keys::session_key(session_id))?
        else {
            return Ok(None);
        };
        let bytes: [u8; ID_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed session index entry".into()))?;
        self.get_payment(&PaymentId::from_bytes(bytes))
    }

    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<Payment>> {
        let mut payments = Vec::new();
        // Index keys ascend by ULID, so walk them backwards for newest first
        for suffix in self
            .index_suffixes(cf::PAYMENTS_BY_USER, user_id.as_bytes())?
            .into_iter()
            .rev()
        {
            if let Some(payment) = self.get_payment(&PaymentId::from_bytes(suffix))? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    fn transition_payment(
        &self,
        payment_id: &PaymentId,
        to: PaymentStatus,
    ) -> Result<Option<Payment>> {
        let _guard = self.lock()?;
        let mut payment = self
            .get_payment(payment_id)?
            .ok_or_else(|| StoreError::not_found("payment", payment_id))?;
        if payment.status != PaymentStatus::Created {
            return Ok(None);
        }
        payment.status = to;

        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, cf::PAYMENTS, &keys::payment_key(payment_id), &payment)?;
        self.commit(batch)?;
        Ok(Some(payment))
    }
}
