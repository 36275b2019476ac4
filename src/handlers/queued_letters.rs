//! Print queue HTTP handlers.
//!
//! - POST /queued-letters - Queue a finalized or paid letter
//! - GET /queued-letters - Own entries (all entries for administrators)
//! - DELETE /queued-letters - Clear the queue (administrators)
//! - GET /queued-letters/{id}
//! - PATCH /queued-letters/{id} - Change status (administrators)
//! - DELETE /queued-letters/{id}
//! - GET /queued-letters/{id}/pdf - Download the rendered letter
//! - POST /queued-letters/{id}/print?printer_name=... - Print (administrators)

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::queued_letter::{
        CreateQueuedLetterRequest, PrintQuery, PrintResponse, QueuedLetterResponse,
        UpdateQueuedLetterRequest,
    },
    services::queue_service,
    state::AppState,
};

/// Queue a letter for in-house printing.
///
/// # Response
///
/// - **201 Created**: the queue entry
/// - **400**: letter is not finalized or paid, or is already queued
/// - **404**: letter does not exist or belongs to someone else
pub async fn create_queued_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateQueuedLetterRequest>,
) -> Result<(StatusCode, Json<QueuedLetterResponse>), AppError> {
    let entry = queue_service::enqueue(&state.pool, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

pub async fn list_queued_letters(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<QueuedLetterResponse>>, AppError> {
    let entries = queue_service::list_entries(&state.pool, &auth).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

pub async fn get_queued_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<QueuedLetterResponse>, AppError> {
    let entry = queue_service::find_entry_for(&state.pool, &auth, entry_id).await?;
    Ok(Json(entry.into()))
}

pub async fn update_queued_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdateQueuedLetterRequest>,
) -> Result<Json<QueuedLetterResponse>, AppError> {
    let entry = queue_service::update_status(&state.pool, &auth, entry_id, request).await?;
    Ok(Json(entry.into()))
}

pub async fn delete_queued_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    queue_service::delete_entry(&state.pool, &auth, entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_queue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    queue_service::clear_queue(&state.pool, &auth).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The letter as `application/pdf`.
pub async fn queued_letter_pdf(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let pdf = queue_service::render_pdf(
        &state.pool,
        state.integrations.spooler.as_ref(),
        &auth,
        entry_id,
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"letter-{entry_id}.pdf\""),
            ),
        ],
        pdf,
    ))
}

/// Print a queued letter on a CUPS printer.
///
/// # Response
///
/// - **200 OK**: `{ "message": "Printing initiated", "job_id": "Office-42" }`
/// - **400**: `Printer X not found`
/// - **403**: caller is not an administrator
pub async fn print_queued_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
    Query(query): Query<PrintQuery>,
) -> Result<Json<PrintResponse>, AppError> {
    let response = queue_service::print_entry(
        &state.pool,
        state.integrations.spooler.as_ref(),
        &auth,
        entry_id,
        &query.printer_name,
    )
    .await?;

    Ok(Json(response))
}
