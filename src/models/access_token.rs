//! Bearer token lookup model for authentication.
//!
//! Tokens are random 32-byte values handed to the client once at login.
//! Only their SHA-256 hash is stored in `access_tokens`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Owner of a bearer token, as loaded by the authentication middleware.
///
/// Produced by joining `access_tokens` with `users` on the token hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenOwner {
    pub user_id: Uuid,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,

    /// Tokens past this instant are rejected
    pub expires_at: DateTime<Utc>,
}
