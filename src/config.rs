//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// Required:
/// - `DATABASE_URL`: PostgreSQL connection string
/// - `STRIPE_SECRET_KEY`: Stripe API key used to create checkout sessions
/// - `STRIPE_ENDPOINT_SECRET`: signing secret of the Stripe webhook endpoint
/// - `LOB_API_KEY`: Lob API key used to mail letters
///
/// Everything else has a default, see the `default_*` functions below.
/// `MAILGUN_DOMAIN` and `MAILGUN_API_KEY` are optional; without them
/// one-time codes are written to the log instead of emailed.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Base URL used for Stripe success/cancel redirects
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    pub stripe_secret_key: String,
    pub stripe_endpoint_secret: String,

    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,

    /// Maximum age of a Stripe webhook signature timestamp
    #[serde(default = "default_stripe_webhook_tolerance_secs")]
    pub stripe_webhook_tolerance_secs: i64,

    /// Price of mailing one letter, in cents
    #[serde(default = "default_letter_price_cents")]
    pub letter_price_cents: i64,

    #[serde(default = "default_letter_currency")]
    pub letter_currency: String,

    pub lob_api_key: String,

    #[serde(default = "default_lob_api_base")]
    pub lob_api_base: String,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    #[serde(default = "default_mailgun_api_base")]
    pub mailgun_api_base: String,

    pub mailgun_domain: Option<String>,
    pub mailgun_api_key: Option<String>,

    #[serde(default = "default_email_from")]
    pub email_from: String,

    #[serde(default = "default_cups_server_host")]
    pub cups_server_host: String,

    #[serde(default = "default_cups_server_port")]
    pub cups_server_port: u16,

    /// Path or name of the wkhtmltopdf binary
    #[serde(default = "default_wkhtmltopdf_path")]
    pub wkhtmltopdf_path: String,

    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,

    #[serde(default = "default_otp_expire_minutes")]
    pub otp_expire_minutes: i64,

    /// Timeout applied to every outbound HTTP call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_stripe_webhook_tolerance_secs() -> i64 {
    300
}

fn default_letter_price_cents() -> i64 {
    500
}

fn default_letter_currency() -> String {
    "usd".to_string()
}

fn default_lob_api_base() -> String {
    "https://api.lob.com/v1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_mailgun_api_base() -> String {
    "https://api.mailgun.net/v3".to_string()
}

fn default_email_from() -> String {
    "letterlobby@serviceorchard.com".to_string()
}

fn default_cups_server_host() -> String {
    "localhost".to_string()
}

fn default_cups_server_port() -> u16 {
    631
}

fn default_wkhtmltopdf_path() -> String {
    "wkhtmltopdf".to_string()
}

fn default_access_token_expire_minutes() -> i64 {
    60
}

fn default_otp_expire_minutes() -> i64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Whether Mailgun credentials are configured.
    pub fn email_enabled(&self) -> bool {
        self.mailgun_domain.is_some() && self.mailgun_api_key.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn required_vars() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/letterlobby_test"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_ENDPOINT_SECRET", "whsec_test"),
            ("LOB_API_KEY", "test_lob"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Configuration used by tests across the crate.
    pub(crate) fn test_config() -> Config {
        envy::from_iter(required_vars()).unwrap()
    }

    #[test]
    fn defaults_fill_optional_settings() {
        let config = test_config();

        assert_eq!(config.server_port, 8000);
        assert_eq!(config.letter_price_cents, 500);
        assert_eq!(config.letter_currency, "usd");
        assert_eq!(config.ollama_model, "llama3.2");
        assert_eq!(config.cups_server_port, 631);
        assert_eq!(config.stripe_webhook_tolerance_secs, 300);
        assert!(!config.email_enabled());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = required_vars();
        vars.push(("SERVER_PORT".into(), "9090".into()));
        vars.push(("LETTER_PRICE_CENTS".into(), "750".into()));
        vars.push(("MAILGUN_DOMAIN".into(), "mg.example.org".into()));
        vars.push(("MAILGUN_API_KEY".into(), "key-1".into()));

        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.server_port, 9090);
        assert_eq!(config.letter_price_cents, 750);
        assert!(config.email_enabled());
    }

    #[test]
    fn missing_stripe_secret_is_an_error() {
        let vars = required_vars()
            .into_iter()
            .filter(|(k, _)| k != "STRIPE_SECRET_KEY");

        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }
}
