//! Stripe Checkout sessions for letter payments.
//!
//! Payment completes asynchronously: Stripe redirects the user to the
//! success URL and separately calls `POST /stripe-webhook`, which is what
//! actually marks the letter paid (see `webhook_service`).

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::{error::IntegrationError, services::http_client::expect_success};

/// Product name shown on the Stripe checkout page.
pub const PRODUCT_NAME: &str = "Letter Mailing Service";

/// Everything Stripe needs to build a checkout page for one letter.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub letter_request_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Subset of a Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, IntegrationError>;
}

/// Talks to the Stripe REST API with form-encoded requests.
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(client: reqwest::Client, api_base: String, secret_key: String) -> Self {
        Self {
            client,
            api_base,
            secret_key,
        }
    }
}

/// Form fields of `POST /v1/checkout/sessions`, using Stripe's bracket
/// notation for nested parameters.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        (
            "line_items[0][price_data][currency]",
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            PRODUCT_NAME.to_string(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount_cents.to_string(),
        ),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        (
            "metadata[letter_request_id]",
            request.letter_request_id.to_string(),
        ),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, IntegrationError> {
        let url = format!("{}/checkout/sessions", self.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(request))
            .send()
            .await?;

        let session = expect_success("Stripe", response).await?.json().await?;
        Ok(session)
    }
}

/// `{public_base_url}/{page}?letter_id=...`, keeping any path prefix of
/// the base URL.
fn redirect_url(base: &Url, page: &str, letter_id: &str) -> Result<Url, url::ParseError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(page);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("letter_id", letter_id);
    Ok(url)
}

/// Success and cancel redirect URLs for a letter, under `public_base_url`.
pub fn checkout_urls(
    public_base_url: &str,
    letter_request_id: Uuid,
) -> Result<(String, String), url::ParseError> {
    let base = Url::parse(public_base_url)?;
    let id = letter_request_id.to_string();

    let success = redirect_url(&base, "payment-success", &id)?;
    let cancel = redirect_url(&base, "payment-cancel", &id)?;

    Ok((success.into(), cancel.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_urls_carry_the_letter_id() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let (success, cancel) = checkout_urls("http://localhost:8000", id).unwrap();

        assert_eq!(
            success,
            "http://localhost:8000/payment-success?letter_id=550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            cancel,
            "http://localhost:8000/payment-cancel?letter_id=550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn redirect_urls_keep_the_base_path() {
        let id = Uuid::nil();

        for base in ["https://example.org/app", "https://example.org/app/"] {
            let (success, cancel) = checkout_urls(base, id).unwrap();
            assert_eq!(
                success,
                format!("https://example.org/app/payment-success?letter_id={id}")
            );
            assert_eq!(
                cancel,
                format!("https://example.org/app/payment-cancel?letter_id={id}")
            );
        }
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        assert!(checkout_urls("mailto:billing@example.org", Uuid::new_v4()).is_err());
        assert!(checkout_urls("not a url", Uuid::new_v4()).is_err());
    }

    #[test]
    fn form_includes_amount_and_metadata() {
        let id = Uuid::new_v4();
        let form = checkout_form(&CheckoutRequest {
            letter_request_id: id,
            amount_cents: 500,
            currency: "usd".to_string(),
            success_url: "https://example.org/ok".to_string(),
            cancel_url: "https://example.org/cancel".to_string(),
        });

        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("line_items[0][price_data][unit_amount]"), "500");
        assert_eq!(get("line_items[0][price_data][currency]"), "usd");
        assert_eq!(get("metadata[letter_request_id]"), id.to_string());
        assert_eq!(get("mode"), "payment");
    }
}
