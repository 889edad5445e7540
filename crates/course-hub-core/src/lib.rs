//! Core types and rules for the course hub.
//!
//! This crate holds everything that does not touch I/O:
//!
//! - **Identifiers**: `UserId`, `CourseId`, `LessonId`, `PaymentId`
//! - **Catalog**: `Course`, `Lesson` and their field validators
//! - **Users**: `User` with group membership and activity tracking
//! - **Access policy**: `Principal`, `Action`, `Decision`
//! - **Subscriptions**: `Subscription`, `SubscriptionToggle`
//! - **Payments**: `Payment`, `PaymentStatus` and the `reconcile` rule
//! - **Money**: decimal prices and minor-unit conversion
//!
//! # Money
//!
//! Prices are `rust_decimal::Decimal` in major units with two decimal places.
//! The checkout provider receives `trunc(price * 100)` minor units.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod course;
pub mod error;
pub mod ids;
pub mod money;
pub mod payment;
pub mod policy;
pub mod subscription;
pub mod user;

pub use course::{validate_rating, validate_title, validate_video_url, Course, Lesson};
pub use error::{DomainError, Result};
pub use ids::{CourseId, IdError, LessonId, PaymentId, UserId};
pub use money::{from_minor_units, to_minor_units, validate_price};
pub use payment::{reconcile, Payment, PaymentStatus, ProviderObservation};
pub use policy::{authorize, authorize_object, Action, Decision, Denial, Owned, Principal, RoleSet};
pub use subscription::{Subscription, SubscriptionToggle};
pub use user::{validate_email, User, MODERATOR_GROUP};
