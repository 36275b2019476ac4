//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::DbPool,
    error::IntegrationError,
    services::{
        drafting_service::{LetterDrafter, OllamaDrafter},
        email_service::{EmailSender, LogEmailSender, MailgunSender},
        http_client::build_client,
        mailing_service::{LobCarrier, MailCarrier},
        payment_service::{PaymentGateway, StripeGateway},
        printing_service::{CupsSpooler, PrintSpooler},
    },
};

/// Outbound integrations, behind traits so tests can swap them out.
#[derive(Clone)]
pub struct Integrations {
    pub payments: Arc<dyn PaymentGateway>,
    pub carrier: Arc<dyn MailCarrier>,
    pub drafter: Arc<dyn LetterDrafter>,
    pub email: Arc<dyn EmailSender>,
    pub spooler: Arc<dyn PrintSpooler>,
}

impl Integrations {
    /// Real vendor clients configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, IntegrationError> {
        let client = build_client(config.http_timeout_secs)?;

        let email: Arc<dyn EmailSender> =
            match (config.mailgun_domain.clone(), config.mailgun_api_key.clone()) {
                (Some(domain), Some(api_key)) => Arc::new(MailgunSender::new(
                    client.clone(),
                    config.mailgun_api_base.clone(),
                    domain,
                    api_key,
                    config.email_from.clone(),
                )),
                _ => {
                    tracing::warn!("MAILGUN_DOMAIN or MAILGUN_API_KEY not set, emails will be logged");
                    Arc::new(LogEmailSender)
                }
            };

        Ok(Self {
            payments: Arc::new(StripeGateway::new(
                client.clone(),
                config.stripe_api_base.clone(),
                config.stripe_secret_key.clone(),
            )),
            carrier: Arc::new(LobCarrier::new(
                client.clone(),
                config.lob_api_base.clone(),
                config.lob_api_key.clone(),
            )),
            drafter: Arc::new(OllamaDrafter::new(
                client,
                config.ollama_base_url.clone(),
                config.ollama_model.clone(),
            )),
            email,
            spooler: Arc::new(CupsSpooler::new(
                config.wkhtmltopdf_path.clone(),
                &config.cups_server_host,
                config.cups_server_port,
            )),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub integrations: Integrations,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, integrations: Integrations) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            integrations,
        }
    }
}

/// Lets handlers and the auth middleware extract `State<DbPool>` directly.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
