//! Application state.

use std::sync::Arc;
use std::time::Duration;

use course_hub_store::Store;

use crate::config::ServiceConfig;
use crate::notify::{run_worker, EmailClient, Notifier};
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Stripe client for payments (optional).
    pub stripe: Option<Arc<StripeClient>>,

    /// Course update notification queue.
    pub notifier: Notifier,
}

impl AppState {
    /// Create a new application state and start the notification worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        // Create Stripe client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(
                config.stripe_api_base.clone(),
                key.clone(),
                config.stripe_webhook_secret.clone(),
                Duration::from_secs(config.stripe_timeout_seconds),
            ) {
                Ok(client) => {
                    tracing::info!(base_url = %config.stripe_api_base, "Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - payments will not be available");
        }

        // Create mail client if configured
        let mailer = config
            .mail_api_url
            .as_ref()
            .zip(config.mail_api_token.as_ref())
            .and_then(|(url, token)| {
                match EmailClient::new(
                    url.clone(),
                    config.mail_sender.clone(),
                    token.clone(),
                    Duration::from_millis(config.mail_timeout_milliseconds),
                ) {
                    Ok(client) => {
                        tracing::info!(mail_url = %url, "Mail delivery enabled");
                        Some(client)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create mail client");
                        None
                    }
                }
            });

        if mailer.is_none() {
            tracing::warn!("Mail API not configured - update notifications will not be sent");
        }

        let (notifier, rx) = Notifier::channel(chrono::Duration::minutes(
            config.notification_cooldown_minutes,
        ));
        tokio::spawn(run_worker(Arc::clone(&store), mailer, rx));

        Self {
            store,
            config,
            stripe,
            notifier,
        }
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }
}
