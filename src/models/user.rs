//! User account models and API request/response types.
//!
//! This module defines:
//! - `User`: Database entity representing a registered user and profile
//! - Request bodies for registration, login, verification, password reset
//!   and profile updates
//! - `UserResponse`: Response body returned to clients (never includes the
//!   password hash)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::address::MailingAddress;

text_enum! {
    /// Authorization role of a user.
    pub enum UserRole {
        User => "user",
        /// Full access: catalog management, every letter, the print queue
        Administrator => "administrator",
    }
}

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. Only verified, active users can obtain
/// bearer tokens.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique login email
    pub email: String,

    /// Argon2 PHC string
    pub password_hash: String,

    /// Set once the `verify_email` one-time code is confirmed
    pub is_verified: bool,

    /// Deactivated users cannot log in and their tokens stop working
    pub is_active: bool,

    #[sqlx(try_from = "String")]
    pub role: UserRole,

    /// True when the profile holds a complete return address
    pub profile_complete: bool,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub personal_description: Option<String>,
    pub political_party: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub employer: Option<String>,
    pub cell_phone: Option<String>,
    pub preferred_language: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Administrator
    }

    /// The user's own address, if the profile has every field a letter needs.
    pub fn return_address(&self) -> Option<MailingAddress> {
        let first = filled(&self.first_name)?;
        let last = filled(&self.last_name)?;

        Some(MailingAddress {
            name: format!("{first} {last}"),
            line1: filled(&self.address_line1)?.to_string(),
            line2: filled(&self.address_line2).map(str::to_string),
            city: filled(&self.city)?.to_string(),
            state: filled(&self.state)?.to_string(),
            zip: filled(&self.zipcode)?.to_string(),
        })
    }

    pub fn profile_is_complete(&self) -> bool {
        self.return_address().is_some()
    }
}

/// Request body for `POST /users/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /users/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /users/verify-email`.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

/// Request body for `POST /users/request-password-reset`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Request body for `POST /users/reset-password`.
#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Bearer token issued by `POST /users/login`.
///
/// ```json
/// {
///   "access_token": "9f86d081884c7d65...",
///   "token_type": "bearer",
///   "expires_at": "2025-12-20T11:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Request body for `PATCH /users/me`.
///
/// Absent fields are left unchanged; `null` clears a field.
///
/// ```json
/// { "address_line2": null, "occupation": "Teacher" }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address_line1: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address_line2: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub zipcode: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub personal_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub political_party: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub employer: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cell_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub preferred_language: Option<Option<String>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn patch<T>(field: &mut Option<T>, value: Option<Option<T>>) {
    if let Some(value) = value {
        *field = value;
    }
}

impl UpdateProfileRequest {
    /// Apply the changes to `user` and recompute `profile_complete`.
    pub fn apply(self, user: &mut User) {
        patch(&mut user.first_name, self.first_name);
        patch(&mut user.last_name, self.last_name);
        patch(&mut user.address_line1, self.address_line1);
        patch(&mut user.address_line2, self.address_line2);
        patch(&mut user.city, self.city);
        patch(&mut user.state, self.state);
        patch(&mut user.zipcode, self.zipcode);
        patch(&mut user.personal_description, self.personal_description);
        patch(&mut user.political_party, self.political_party);
        patch(&mut user.date_of_birth, self.date_of_birth);
        patch(&mut user.occupation, self.occupation);
        patch(&mut user.employer, self.employer);
        patch(&mut user.cell_phone, self.cell_phone);
        patch(&mut user.preferred_language, self.preferred_language);
        user.profile_complete = user.profile_is_complete();
    }
}

/// Request body for the administrator-only `PATCH /users/{id}`.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// Response body for user endpoints.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    pub profile_complete: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub personal_description: Option<String>,
    pub political_party: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub employer: Option<String>,
    pub cell_phone: Option<String>,
    pub preferred_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert database User to API UserResponse, dropping the password hash.
impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_verified: user.is_verified,
            is_active: user.is_active,
            profile_complete: user.profile_complete,
            first_name: user.first_name,
            last_name: user.last_name,
            address_line1: user.address_line1,
            address_line2: user.address_line2,
            city: user.city,
            state: user.state,
            zipcode: user.zipcode,
            personal_description: user.personal_description,
            political_party: user.political_party,
            date_of_birth: user.date_of_birth,
            occupation: user.occupation,
            employer: user.employer,
            cell_phone: user.cell_phone,
            preferred_language: user.preferred_language,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "voter@example.org".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            is_verified: true,
            is_active: true,
            role: UserRole::User,
            profile_complete: false,
            first_name: None,
            last_name: None,
            address_line1: None,
            address_line2: None,
            city: None,
            state: None,
            zipcode: None,
            personal_description: None,
            political_party: None,
            date_of_birth: None,
            occupation: None,
            employer: None,
            cell_phone: None,
            preferred_language: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn user_with_address() -> User {
        User {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            address_line1: Some("12 Elm St".into()),
            city: Some("Austin".into()),
            state: Some("TX".into()),
            zipcode: Some("78701".into()),
            ..sample_user()
        }
    }

    #[test]
    fn complete_profile_yields_return_address() {
        let address = user_with_address().return_address().unwrap();
        assert_eq!(address.name, "Ada Lovelace");
        assert_eq!(address.line1, "12 Elm St");
        assert_eq!(address.line2, None);
        assert_eq!(address.zip, "78701");
    }

    #[test]
    fn profile_patch_distinguishes_null_from_absent() {
        let mut user = User {
            address_line2: Some("Apt 4".into()),
            occupation: Some("Nurse".into()),
            ..user_with_address()
        };
        let request: UpdateProfileRequest = serde_json::from_value(serde_json::json!({
            "address_line2": null,
            "employer": "County Hospital"
        }))
        .unwrap();

        request.apply(&mut user);

        assert_eq!(user.address_line2, None);
        assert_eq!(user.occupation.as_deref(), Some("Nurse"));
        assert_eq!(user.employer.as_deref(), Some("County Hospital"));
        assert!(user.profile_complete);
    }

    #[test]
    fn clearing_a_required_address_field_marks_profile_incomplete() {
        let mut user = User {
            profile_complete: true,
            ..user_with_address()
        };
        let request: UpdateProfileRequest =
            serde_json::from_value(serde_json::json!({ "city": null })).unwrap();

        request.apply(&mut user);

        assert_eq!(user.city, None);
        assert!(!user.profile_complete);
    }

    #[test]
    fn blank_fields_make_profile_incomplete() {
        let user = User {
            city: Some("   ".into()),
            ..user_with_address()
        };
        assert!(!user.profile_is_complete());
        assert!(!sample_user().profile_is_complete());
    }

    #[test]
    fn response_never_carries_password_hash() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }
}
