//! Bill catalog handlers.
//!
//! Reading is public. Creating, updating and deleting bills requires an
//! administrator. Each bill carries the politicians linked to it:
//!
//! ```json
//! {
//!   "id": "...",
//!   "title": "Clean Water Act Amendment",
//!   "bill_number": "HB 1234",
//!   "politicians": [{ "politician_id": "...", "does_support": true }]
//! }
//! ```

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::bill::{BillResponse, CreateBillRequest, UpdateBillRequest},
    services::catalog_service,
};

pub async fn list_bills(State(pool): State<DbPool>) -> Result<Json<Vec<BillResponse>>, AppError> {
    Ok(Json(catalog_service::list_bills(&pool).await?))
}

pub async fn get_bill(
    State(pool): State<DbPool>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<BillResponse>, AppError> {
    Ok(Json(catalog_service::get_bill(&pool, bill_id).await?))
}

/// `POST /bills`
///
/// # Response
///
/// - **201 Created**: the bill with its politician links
/// - **400**: a listed politician does not exist; nothing is created
/// - **403**: caller is not an administrator
pub async fn create_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), AppError> {
    auth.require_admin()?;

    let bill = catalog_service::create_bill(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

/// `PATCH /bills/{id}`
///
/// A `politicians` list in the body replaces every link of the bill.
pub async fn update_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(bill_id): Path<Uuid>,
    Json(request): Json<UpdateBillRequest>,
) -> Result<Json<BillResponse>, AppError> {
    auth.require_admin()?;

    Ok(Json(
        catalog_service::update_bill(&pool, bill_id, request).await?,
    ))
}

pub async fn delete_bill(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(bill_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;

    catalog_service::delete_bill(&pool, bill_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
