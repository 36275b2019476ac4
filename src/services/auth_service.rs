//! Password hashing and bearer token management.
//!
//! - Passwords are stored as Argon2id PHC strings.
//! - Bearer tokens are 32 random bytes, hex encoded, handed out once at
//!   login. Only their SHA-256 hash is stored, the same way the
//!   authentication middleware looks them up.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::user::TokenResponse};

/// Shortest password accepted at registration and reset.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Trim and lowercase an email, rejecting values without a domain.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AppError::bad_request("Invalid email address"))
    }
}

/// Generate a new random bearer token (64 hex characters).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hex digest of a bearer token, as stored in `access_tokens`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create and store a token for `user_id` valid for `ttl_minutes`.
pub async fn issue_token(
    pool: &DbPool,
    user_id: Uuid,
    ttl_minutes: i64,
) -> Result<TokenResponse, AppError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    sqlx::query("INSERT INTO access_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(pool)
        .await?;

    // Expired tokens of this user are dead weight; drop them while we're here
    sqlx::query("DELETE FROM access_tokens WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_at,
    })
}

/// Revoke every token of a user (logout, password reset, deactivation).
pub async fn revoke_tokens(pool: &DbPool, user_id: Uuid) -> Result<u64, AppError> {
    let revoked = sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    tracing::info!(%user_id, revoked, "revoked access tokens");
    Ok(revoked)
}
