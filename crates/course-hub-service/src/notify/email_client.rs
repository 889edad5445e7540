//! Transactional mail API client.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;

/// Error type for mail delivery.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// HTTP request failed or the API answered with an error status.
    #[error("mail API error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for a Postmark-compatible mail API.
#[derive(Debug, Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: String,
    authorization_token: Secret<String>,
}

impl EmailClient {
    /// Create a new mail client.
    ///
    /// # Errors
    ///
    /// Returns `MailError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        sender: impl Into<String>,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sender: sender.into(),
            authorization_token,
        })
    }

    /// Send a plain-text email to one recipient.
    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        text_content: &str,
    ) -> Result<(), MailError> {
        let url = format!("{}/email", self.base_url);
        let request_body = SendEmailRequest {
            from: &self.sender,
            to: recipient,
            subject,
            text_body: text_content,
        };

        self.http_client
            .post(&url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}
