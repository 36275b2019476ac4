//! Shared plumbing for the outbound HTTP clients.

use std::time::Duration;

use crate::error::IntegrationError;

/// Build the HTTP client shared by every vendor integration.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, IntegrationError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Pass 2xx responses through; turn anything else into
/// [`IntegrationError::Status`] carrying the response body.
pub async fn expect_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}
