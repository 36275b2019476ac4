//! One-time codes for email verification and password resets.

use chrono::{DateTime, Utc};
use uuid::Uuid;

text_enum! {
    /// What a one-time code unlocks.
    pub enum OtpPurpose {
        VerifyEmail => "verify_email",
        ResetPassword => "reset_password",
    }
}

/// Represents a row of the `otp_codes` table.
///
/// A code is deleted as soon as it is used.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpCode {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Six decimal digits
    pub code: String,

    #[sqlx(try_from = "String")]
    pub purpose: OtpPurpose,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
