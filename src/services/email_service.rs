//! Outbound email for one-time codes.

use async_trait::async_trait;

use crate::{error::IntegrationError, services::http_client::expect_success};

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), IntegrationError>;
}

/// Sends plain-text email through the Mailgun messages API.
pub struct MailgunSender {
    client: reqwest::Client,
    api_base: String,
    domain: String,
    api_key: String,
    from: String,
}

impl MailgunSender {
    pub fn new(
        client: reqwest::Client,
        api_base: String,
        domain: String,
        api_key: String,
        from: String,
    ) -> Self {
        Self {
            client,
            api_base,
            domain,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl EmailSender for MailgunSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), IntegrationError> {
        let url = format!(
            "{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.domain
        );

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", to),
                ("subject", subject),
                ("text", body),
            ])
            .send()
            .await?;

        expect_success("Mailgun", response).await?;
        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}

/// Used when Mailgun is not configured: the message goes to the log so
/// codes can still be read during local development.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), IntegrationError> {
        tracing::warn!(%to, %subject, %body, "email delivery disabled, message logged instead");
        Ok(())
    }
}
