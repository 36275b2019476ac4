//! LetterLobby - Main Application Entry Point
//!
//! A REST API for writing letters to politicians about pending bills and
//! having them printed and mailed. Users draft a letter (optionally with a
//! local language model), pay through Stripe Checkout, and the letter is
//! sent through Lob or queued for in-house printing over CUPS.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: opaque bearer tokens stored as SHA-256 hashes
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the vendor clients and the HTTP router
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(email_enabled = config.email_enabled(), "Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let integrations = state::Integrations::from_config(&config)?;
    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = routes::build_router(state::AppState::new(pool, config, integrations));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
