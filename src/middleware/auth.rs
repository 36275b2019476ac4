//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Hash it and look up the owning user
//! 3. Reject expired tokens, deactivated users and unverified emails
//! 4. Inject [`AuthContext`] into the request for handlers

use crate::{
    db::DbPool,
    error::AppError,
    models::{access_token::TokenOwner, user::UserRole},
    services::auth_service,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>` and use it for both
/// ownership checks and role checks.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated user
    ///
    /// Letter requests and queue entries are filtered by this id unless
    /// the caller is an administrator.
    pub user_id: Uuid,

    pub email: String,

    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Administrator
    }

    /// Fail with 403 unless the caller is an administrator.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin privileges required".to_string()))
        }
    }

    /// Owners see their own records; administrators see everything.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user_id == owner_id
    }

    /// Records of other users are reported as missing, not forbidden, so
    /// ids of other users stay hidden.
    pub fn ensure_visible(&self, owner_id: Uuid, what: &str) -> Result<(), AppError> {
        if self.can_access(owner_id) {
            Ok(())
        } else {
            Err(AppError::not_found(what))
        }
    }
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the token using SHA-256
/// 3. Join `access_tokens` with `users` on the hash
/// 4. Check expiry, `is_active` and `is_verified`
/// 5. Inject `AuthContext` into the request and call the next handler
///
/// # Returns
///
/// - `Err(AppError::Unauthorized)` for missing, unknown or expired tokens
///   and deactivated users (401)
/// - `Err(AppError::Forbidden)` when the email is not verified (403)
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?;
    let token_hash = auth_service::hash_token(token);

    let owner = sqlx::query_as::<_, TokenOwner>(
        r#"
        SELECT t.user_id, u.email, u.role, u.is_active, u.is_verified, t.expires_at
        FROM access_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token_hash = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    let auth_context = authorize_owner(owner)?;

    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
}

fn authorize_owner(owner: TokenOwner) -> Result<AuthContext, AppError> {
    if owner.expires_at <= Utc::now() {
        return Err(AppError::Unauthorized("Token expired".to_string()));
    }
    if !owner.is_active {
        return Err(AppError::Unauthorized("Invalid user".to_string()));
    }
    if !owner.is_verified {
        return Err(AppError::Forbidden("Email not verified".to_string()));
    }

    Ok(AuthContext {
        user_id: owner.user_id,
        email: owner.email,
        role: owner.role,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn user_context() -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "voter@example.org".to_string(),
            role: UserRole::User,
        }
    }

    pub(crate) fn admin_context() -> AuthContext {
        AuthContext {
            role: UserRole::Administrator,
            ..user_context()
        }
    }

    fn owner() -> TokenOwner {
        TokenOwner {
            user_id: Uuid::new_v4(),
            email: "voter@example.org".to_string(),
            role: UserRole::User,
            is_active: true,
            is_verified: true,
            expires_at: Utc::now() + Duration::minutes(10),
        }
    }

    #[test]
    fn owners_and_admins_can_access_records() {
        let user = user_context();
        let admin = admin_context();
        let someone_else = Uuid::new_v4();

        assert!(user.can_access(user.user_id));
        assert!(!user.can_access(someone_else));
        assert!(admin.can_access(someone_else));
    }

    #[test]
    fn other_users_records_look_missing() {
        let user = user_context();

        assert!(user.ensure_visible(user.user_id, "Letter request").is_ok());
        match user.ensure_visible(Uuid::new_v4(), "Letter request") {
            Err(AppError::NotFound(message)) => assert_eq!(message, "Letter request not found"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(admin_context()
            .ensure_visible(Uuid::new_v4(), "Queued letter")
            .is_ok());
    }

    #[test]
    fn require_admin_rejects_regular_users() {
        assert!(matches!(
            user_context().require_admin(),
            Err(AppError::Forbidden(_))
        ));
        assert!(admin_context().require_admin().is_ok());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let expired = TokenOwner {
            expires_at: Utc::now() - Duration::seconds(1),
            ..owner()
        };
        assert!(matches!(
            authorize_owner(expired),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn inactive_and_unverified_users_are_rejected() {
        let inactive = TokenOwner {
            is_active: false,
            ..owner()
        };
        assert!(matches!(
            authorize_owner(inactive),
            Err(AppError::Unauthorized(_))
        ));

        let unverified = TokenOwner {
            is_verified: false,
            ..owner()
        };
        assert!(matches!(
            authorize_owner(unverified),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn valid_owner_becomes_context() {
        let owner = owner();
        let id = owner.user_id;
        let context = authorize_owner(owner).unwrap();
        assert_eq!(context.user_id, id);
        assert!(!context.is_admin());
    }
}
