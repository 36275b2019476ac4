//! Politician catalog handlers. Public reads, administrator writes.

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
    models::politician::{CreatePoliticianRequest, PoliticianResponse, UpdatePoliticianRequest},
    services::catalog_service,
};

pub async fn list_politicians(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<PoliticianResponse>>, AppError> {
    Ok(Json(catalog_service::list_politicians(&pool).await?))
}

pub async fn get_politician(
    State(pool): State<DbPool>,
    Path(politician_id): Path<Uuid>,
) -> Result<Json<PoliticianResponse>, AppError> {
    Ok(Json(
        catalog_service::get_politician(&pool, politician_id).await?,
    ))
}

/// `POST /politicians`
///
/// ```json
/// {
///   "name": "Jane Senator",
///   "title": "State Senator",
///   "office_address_line1": "1100 Congress Ave",
///   "office_city": "Austin",
///   "office_state": "TX",
///   "office_zip": "78701",
///   "legislative_body": "Texas Senate",
///   "bills": [{ "bill_id": "...", "does_support": false }]
/// }
/// ```
pub async fn create_politician(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePoliticianRequest>,
) -> Result<(StatusCode, Json<PoliticianResponse>), AppError> {
    auth.require_admin()?;

    let politician = catalog_service::create_politician(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(politician)))
}

pub async fn update_politician(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(politician_id): Path<Uuid>,
    Json(request): Json<UpdatePoliticianRequest>,
) -> Result<Json<PoliticianResponse>, AppError> {
    auth.require_admin()?;

    Ok(Json(
        catalog_service::update_politician(&pool, politician_id, request).await?,
    ))
}

pub async fn delete_politician(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(politician_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;

    catalog_service::delete_politician(&pool, politician_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
