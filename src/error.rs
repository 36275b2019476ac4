//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::letter_request::LetterStatus;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing, unknown or expired bearer tokens
/// - **Authorization Errors**: Authenticated caller lacks the role or ownership
/// - **Resource Errors**: Requested resources not found
/// - **Lifecycle Errors**: Letter status transitions that are not allowed
/// - **Integration Errors**: Stripe, Lob, Ollama, Mailgun or CUPS failed
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Credentials or bearer token are missing, invalid, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed to perform the operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("{0}")]
    Forbidden(String),

    /// Requested resource does not exist or is not visible to the caller.
    ///
    /// Returns HTTP 404 Not Found. The String names the resource, e.g.
    /// "Letter request not found".
    #[error("{0}")]
    NotFound(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// A letter status change that the lifecycle does not permit.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Cannot move letter from {from} to {to}")]
    InvalidTransition { from: LetterStatus, to: LetterStatus },

    /// An outbound call to a third-party service failed.
    ///
    /// Returns HTTP 500. The String is the client-facing message; the
    /// underlying cause is logged where the failure is handled.
    #[error("{0}")]
    Integration(String),

    /// Unexpected failure that is not the client's fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::InvalidRequest(message.into())
    }
}

/// Failures from the vendor clients (HTTP APIs and CUPS/wkhtmltopdf commands).
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Printer {0} not found")]
    PrinterNotFound(String),

    #[error("Command {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A missing printer is the caller's mistake; every other integration
/// failure is logged and reported without vendor details.
impl From<IntegrationError> for AppError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::PrinterNotFound(_) => AppError::InvalidRequest(err.to_string()),
            other => {
                tracing::error!(error = %other, "integration call failed");
                AppError::Integration("External service request failed".to_string())
            }
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Unauthorized` → 401
/// - `Forbidden` → 403
/// - `NotFound` → 404
/// - `InvalidRequest`, `InvalidTransition` → 400
/// - `Database`, `Integration`, `Internal` → 500 (details hidden for database and internal errors)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvalidTransition { .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_transition",
                self.to_string(),
            ),
            AppError::Integration(ref msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "external_service_error",
                msg.clone(),
            ),
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_maps_to_404_with_message() {
        let response = AppError::not_found("Bill").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["message"], "Bill not found");
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn invalid_transition_is_a_bad_request() {
        let response = AppError::InvalidTransition {
            from: LetterStatus::Drafting,
            to: LetterStatus::Mailed,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_transition");
        assert_eq!(
            body["error"]["message"],
            "Cannot move letter from drafting to mailed"
        );
    }

    #[test]
    fn auth_errors_use_401_and_403() {
        assert_eq!(
            AppError::Unauthorized("Invalid token".into())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("Admin privileges required".into())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
