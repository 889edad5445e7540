//! Stripe integration for course checkout.
//!
//! Every purchase creates its own product and price, then a hosted Checkout
//! session; the session is later polled or pushed (webhook) back into the
//! payment record.

pub mod client;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::*;
