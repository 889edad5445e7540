//! Course Hub HTTP API Service.
//!
//! This crate provides the HTTP API for the course hub, including:
//!
//! - Course and lesson CRUD behind an owner/moderator access policy
//! - Course subscriptions
//! - Course purchases through Stripe Checkout, with status reconciliation
//!   by polling and by webhook
//! - Rate-limited "course updated" emails to subscribers
//! - A periodic sweep deactivating idle users
//!
//! # Authentication
//!
//! End users send an HS256 JWT whose `sub` is their user id. Admin endpoints
//! take an `X-Admin-Key` header instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for the router

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod payments;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod sweep;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use notify::{EmailClient, NotificationJob, Notifier};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
