//! Organization-wide return address handlers (administrators only).
//!
//! - GET /global-return-address
//! - POST /global-return-address
//! - PATCH /global-return-address
//! - DELETE /global-return-address
//!
//! There is at most one address. Letters fall back to it when the owner's
//! profile address is missing or not wanted.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    db::{self, DbPool},
    error::AppError,
    middleware::auth::AuthContext,
    models::return_address::{
        CreateReturnAddressRequest, GlobalReturnAddress, UpdateReturnAddressRequest,
    },
};

fn not_set() -> AppError {
    AppError::NotFound("No global return address set.".to_string())
}

fn already_exists() -> AppError {
    AppError::bad_request("Global return address already exists.")
}

/// The single-row index turns a concurrent second insert into a unique violation.
fn map_insert_error(err: sqlx::Error) -> AppError {
    if db::is_unique_violation(&err) {
        already_exists()
    } else {
        AppError::Database(err)
    }
}

async fn current(pool: &DbPool) -> Result<Option<GlobalReturnAddress>, AppError> {
    let address = sqlx::query_as::<_, GlobalReturnAddress>(
        "SELECT * FROM global_return_addresses ORDER BY created_at LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(address)
}

pub async fn get_return_address(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<GlobalReturnAddress>, AppError> {
    auth.require_admin()?;

    let address = current(&pool).await?.ok_or_else(not_set)?;
    Ok(Json(address))
}

/// Set the return address.
///
/// # Response
///
/// - **201 Created**: the stored address
/// - **400**: an address already exists (use PATCH)
pub async fn create_return_address(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateReturnAddressRequest>,
) -> Result<(StatusCode, Json<GlobalReturnAddress>), AppError> {
    auth.require_admin()?;

    if current(&pool).await?.is_some() {
        return Err(already_exists());
    }

    let address = sqlx::query_as::<_, GlobalReturnAddress>(
        r#"
        INSERT INTO global_return_addresses (
            organization_name,
            address_line1,
            address_line2,
            city,
            state,
            zipcode
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.organization_name)
    .bind(request.address_line1)
    .bind(request.address_line2)
    .bind(request.city)
    .bind(request.state)
    .bind(request.zipcode)
    .fetch_one(&pool)
    .await
    .map_err(map_insert_error)?;

    tracing::info!(by = %auth.user_id, "global return address set");
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn update_return_address(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdateReturnAddressRequest>,
) -> Result<Json<GlobalReturnAddress>, AppError> {
    auth.require_admin()?;

    let existing = current(&pool).await?.ok_or_else(not_set)?;

    let address = sqlx::query_as::<_, GlobalReturnAddress>(
        r#"
        UPDATE global_return_addresses
        SET organization_name = COALESCE($2, organization_name),
            address_line1 = COALESCE($3, address_line1),
            address_line2 = COALESCE($4, address_line2),
            city = COALESCE($5, city),
            state = COALESCE($6, state),
            zipcode = COALESCE($7, zipcode),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(existing.id)
    .bind(request.organization_name)
    .bind(request.address_line1)
    .bind(request.address_line2)
    .bind(request.city)
    .bind(request.state)
    .bind(request.zipcode)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(not_set)?;

    Ok(Json(address))
}

pub async fn delete_return_address(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;

    let deleted = sqlx::query("DELETE FROM global_return_addresses")
        .execute(&pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(not_set());
    }

    tracing::info!(by = %auth.user_id, "global return address removed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{foreign_key_violation, unique_violation};

    #[test]
    fn second_address_is_rejected() {
        let err = map_insert_error(unique_violation());
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(err.to_string(), "Global return address already exists.");

        assert!(matches!(
            map_insert_error(foreign_key_violation()),
            AppError::Database(_)
        ));
    }
}
