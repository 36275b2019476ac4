//! Registration, login, one-time code flows and profile management.

use uuid::Uuid;

use crate::{
    config::Config,
    db::{self, DbPool},
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        otp_code::OtpPurpose,
        user::{
            AdminUpdateUserRequest, LoginRequest, PasswordResetConfirm, PasswordResetRequest,
            RegisterRequest, TokenResponse, UpdateProfileRequest, User, UserRole,
            VerifyEmailRequest,
        },
    },
    services::{auth_service, email_service::EmailSender, otp_service},
};

fn invalid_code() -> AppError {
    AppError::bad_request("Invalid or expired code")
}

pub async fn find_user(pool: &DbPool, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Create an unverified user and email them a verification code.
///
/// A failed email does not undo the registration; the failure is logged.
pub async fn register(
    pool: &DbPool,
    mailer: &dyn EmailSender,
    config: &Config,
    request: RegisterRequest,
) -> Result<User, AppError> {
    let email = auth_service::normalize_email(&request.email)?;
    auth_service::validate_password(&request.password)?;

    if find_by_email(pool, &email).await?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let password_hash = auth_service::hash_password(&request.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, is_verified, is_active, role)
        VALUES ($1, $2, FALSE, TRUE, $3)
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(UserRole::User.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::bad_request("Email already registered")
        } else {
            AppError::Database(e)
        }
    })?;

    let code = otp_service::create_otp_code(
        pool,
        user.id,
        OtpPurpose::VerifyEmail,
        config.otp_expire_minutes,
    )
    .await?;

    if let Err(e) = mailer
        .send(
            &user.email,
            "Verify your account",
            &format!("Your OTP code is: {code}"),
        )
        .await
    {
        tracing::error!(user_id = %user.id, error = %e, "failed to send verification email");
    }

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn verify_email(pool: &DbPool, request: VerifyEmailRequest) -> Result<(), AppError> {
    let email = auth_service::normalize_email(&request.email).map_err(|_| invalid_code())?;

    let user = otp_service::verify_otp_code(pool, &email, &request.code, OtpPurpose::VerifyEmail)
        .await?
        .ok_or_else(invalid_code)?;

    sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(())
}

pub async fn login(
    pool: &DbPool,
    config: &Config,
    request: LoginRequest,
) -> Result<TokenResponse, AppError> {
    let bad_credentials = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = auth_service::normalize_email(&request.email).map_err(|_| bad_credentials())?;
    let user = find_by_email(pool, &email).await?.ok_or_else(bad_credentials)?;

    if !auth_service::verify_password(&request.password, &user.password_hash) {
        return Err(bad_credentials());
    }
    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }
    if !user.is_verified {
        return Err(AppError::Forbidden("Email not verified".to_string()));
    }

    let token = auth_service::issue_token(pool, user.id, config.access_token_expire_minutes).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub async fn request_password_reset(
    pool: &DbPool,
    mailer: &dyn EmailSender,
    config: &Config,
    request: PasswordResetRequest,
) -> Result<(), AppError> {
    let no_user = || AppError::NotFound("No user with that email".to_string());

    let email = auth_service::normalize_email(&request.email).map_err(|_| no_user())?;
    let user = find_by_email(pool, &email).await?.ok_or_else(no_user)?;

    let code = otp_service::create_otp_code(
        pool,
        user.id,
        OtpPurpose::ResetPassword,
        config.otp_expire_minutes,
    )
    .await?;

    mailer
        .send(
            &user.email,
            "Reset your password",
            &format!("Your reset code is: {code}"),
        )
        .await?;

    Ok(())
}

/// Set a new password with a reset code. Every existing token is revoked.
pub async fn reset_password(pool: &DbPool, request: PasswordResetConfirm) -> Result<(), AppError> {
    auth_service::validate_password(&request.new_password)?;
    let email = auth_service::normalize_email(&request.email).map_err(|_| invalid_code())?;

    let user = otp_service::verify_otp_code(pool, &email, &request.code, OtpPurpose::ResetPassword)
        .await?
        .ok_or_else(invalid_code)?;

    let password_hash = auth_service::hash_password(&request.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(&password_hash)
        .execute(pool)
        .await?;

    auth_service::revoke_tokens(pool, user.id).await?;
    tracing::info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Apply profile changes and recompute `profile_complete`.
///
/// The row is locked while the patch is applied so concurrent edits of
/// different fields do not overwrite each other.
pub async fn update_profile(
    pool: &DbPool,
    user_id: Uuid,
    request: UpdateProfileRequest,
) -> Result<User, AppError> {
    let mut tx = pool.begin().await?;

    let mut user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    request.apply(&mut user);

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = $2,
            last_name = $3,
            address_line1 = $4,
            address_line2 = $5,
            city = $6,
            state = $7,
            zipcode = $8,
            personal_description = $9,
            political_party = $10,
            date_of_birth = $11,
            occupation = $12,
            employer = $13,
            cell_phone = $14,
            preferred_language = $15,
            profile_complete = $16,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.address_line1)
    .bind(&user.address_line2)
    .bind(&user.city)
    .bind(&user.state)
    .bind(&user.zipcode)
    .bind(&user.personal_description)
    .bind(&user.political_party)
    .bind(&user.date_of_birth)
    .bind(&user.occupation)
    .bind(&user.employer)
    .bind(&user.cell_phone)
    .bind(&user.preferred_language)
    .bind(user.profile_complete)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user)
}

pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Administrators cannot demote or deactivate their own account.
pub fn check_admin_update(
    auth: &AuthContext,
    target: Uuid,
    request: &AdminUpdateUserRequest,
) -> Result<(), AppError> {
    auth.require_admin()?;

    let demotes = request.role.is_some_and(|role| role != UserRole::Administrator);
    let deactivates = request.is_active == Some(false);
    if target == auth.user_id && (demotes || deactivates) {
        return Err(AppError::bad_request(
            "Administrators cannot demote or deactivate themselves",
        ));
    }
    Ok(())
}

/// Change a user's role or active flag. Deactivation revokes their tokens.
pub async fn admin_update_user(
    pool: &DbPool,
    auth: &AuthContext,
    id: Uuid,
    request: AdminUpdateUserRequest,
) -> Result<User, AppError> {
    check_admin_update(auth, id, &request)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET role = COALESCE($2, role),
            is_active = COALESCE($3, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(request.role.map(|role| role.as_str()))
    .bind(request.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("User"))?;

    if !user.is_active {
        auth_service::revoke_tokens(pool, user.id).await?;
    }

    tracing::info!(user_id = %id, role = %user.role, is_active = user.is_active, by = %auth.user_id, "user updated by administrator");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::tests::{admin_context, user_context};

    #[test]
    fn only_admins_manage_users() {
        let request = AdminUpdateUserRequest {
            role: Some(UserRole::Administrator),
            is_active: None,
        };
        assert!(matches!(
            check_admin_update(&user_context(), Uuid::new_v4(), &request),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_admin_update(&admin_context(), Uuid::new_v4(), &request).is_ok());
    }

    #[test]
    fn admins_cannot_lock_themselves_out() {
        let admin = admin_context();

        let demote = AdminUpdateUserRequest {
            role: Some(UserRole::User),
            is_active: None,
        };
        assert!(check_admin_update(&admin, admin.user_id, &demote).is_err());

        let deactivate = AdminUpdateUserRequest {
            role: None,
            is_active: Some(false),
        };
        assert!(check_admin_update(&admin, admin.user_id, &deactivate).is_err());
        assert!(check_admin_update(&admin, Uuid::new_v4(), &deactivate).is_ok());
    }
}
