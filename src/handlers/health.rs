//! Liveness and readiness for load balancers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: &'static str,

    /// `connected` or `unreachable`
    pub database: &'static str,

    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
///
/// Pings the database. Answers 200 when it responds and 503 otherwise, with
/// the same body shape in both cases:
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "version": "0.1.0",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(pool): State<DbPool>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            false
        }
    };

    let (code, status, database) = if database_ok {
        (StatusCode::OK, "healthy", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        }),
    )
}
