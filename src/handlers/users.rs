//! User account HTTP handlers.
//!
//! Public:
//! - POST /users/register
//! - POST /users/verify-email
//! - POST /users/login
//! - POST /users/request-password-reset
//! - POST /users/reset-password
//!
//! Authenticated:
//! - POST /users/logout
//! - GET /users/me, PATCH /users/me
//! - GET /users, PATCH /users/{id} (administrators)

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        MessageResponse,
        user::{
            AdminUpdateUserRequest, LoginRequest, PasswordResetConfirm, PasswordResetRequest,
            RegisterRequest, TokenResponse, UpdateProfileRequest, UserResponse,
            VerifyEmailRequest,
        },
    },
    services::{auth_service, user_service},
    state::AppState,
};

/// Register a new account.
///
/// # Endpoint
///
/// `POST /users/register`
///
/// # Request Body
///
/// ```json
/// { "email": "voter@example.org", "password": "at least 8 chars" }
/// ```
///
/// # Response
///
/// - **201 Created**: the new, unverified user. A six-digit code is emailed.
/// - **400**: email already registered, malformed email or short password
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = user_service::register(
        &state.pool,
        state.integrations.email.as_ref(),
        &state.config,
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `POST /users/verify-email` with `{ "email", "code" }`.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    user_service::verify_email(&state.pool, request).await?;
    Ok(Json(MessageResponse::new("Email verified")))
}

/// Exchange credentials for a bearer token.
///
/// # Response
///
/// - **200 OK**: `{ "access_token", "token_type": "bearer", "expires_at" }`
/// - **401**: unknown email or wrong password (indistinguishable)
/// - **403**: email not verified or account deactivated
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = user_service::login(&state.pool, &state.config, request).await?;
    Ok(Json(token))
}

/// Revoke every bearer token of the caller, on every device.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_service::revoke_tokens(&state.pool, auth.user_id).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    user_service::request_password_reset(
        &state.pool,
        state.integrations.email.as_ref(),
        &state.config,
        request,
    )
    .await?;

    Ok(Json(MessageResponse::new(
        "Check your email for a reset code",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, AppError> {
    user_service::reset_password(&state.pool, request).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::find_user(&state.pool, auth.user_id).await?;
    Ok(Json(user.into()))
}

/// Update profile fields of the caller. Absent fields are left alone and
/// `null` clears a field;
/// `profile_complete` is recomputed from the result.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::update_profile(&state.pool, auth.user_id, request).await?;
    Ok(Json(user.into()))
}

/// `GET /users` (administrators)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    auth.require_admin()?;

    let users = user_service::list_users(&state.pool).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// `PATCH /users/{id}` (administrators)
///
/// ```json
/// { "role": "administrator", "is_active": true }
/// ```
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::admin_update_user(&state.pool, &auth, user_id, request).await?;
    Ok(Json(user.into()))
}
