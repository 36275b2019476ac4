//! One-time codes for email verification and password resets.

use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        otp_code::{OtpCode, OtpPurpose},
        user::User,
    },
};

/// Number of digits in a one-time code.
pub const OTP_LENGTH: usize = 6;

/// Generate a random numeric code of `length` digits.
pub fn generate_otp_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Create a code for `user_id` and return it so it can be emailed.
///
/// Older codes with the same purpose are discarded, so only the most
/// recently sent code works.
pub async fn create_otp_code(
    pool: &DbPool,
    user_id: Uuid,
    purpose: OtpPurpose,
    expires_in_minutes: i64,
) -> Result<String, AppError> {
    let code = generate_otp_code(OTP_LENGTH);
    let expires_at = Utc::now() + Duration::minutes(expires_in_minutes);

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM otp_codes WHERE user_id = $1 AND purpose = $2")
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO otp_codes (user_id, code, purpose, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(&code)
        .bind(purpose.as_str())
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(%user_id, %purpose, "created one-time code");
    Ok(code)
}

/// Consume a code sent to `email`.
///
/// Returns the user when the code matches, has the right purpose and has
/// not expired. The code is deleted in the same statement that finds it,
/// so it cannot be used twice.
pub async fn verify_otp_code(
    pool: &DbPool,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
) -> Result<Option<User>, AppError> {
    let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    // Deleting before the expiry check also burns expired codes
    let consumed = sqlx::query_as::<_, OtpCode>(
        r#"
        DELETE FROM otp_codes
        WHERE user_id = $1 AND code = $2 AND purpose = $3
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(code.trim())
    .bind(purpose.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(consumed
        .filter(|otp| !otp.is_expired(Utc::now()))
        .map(|_| user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_otp_code(OTP_LENGTH);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn length_is_respected() {
        assert_eq!(generate_otp_code(4).len(), 4);
        assert!(generate_otp_code(0).is_empty());
    }
}
