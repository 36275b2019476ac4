//! Letter request HTTP handlers.
//!
//! This module implements the letter lifecycle endpoints:
//! - POST /letter-requests - Start a letter in `drafting`
//! - GET /letter-requests - Own letters (all letters for administrators)
//! - GET /letter-requests/{id}
//! - PATCH /letter-requests/{id} - Edit text or move drafting ⇄ finalized
//! - DELETE /letter-requests/{id}
//! - POST /letter-requests/{id}/draft - Draft the text with the language model
//! - POST /letter-requests/{id}/pay - Open a Stripe Checkout session
//! - POST /letter-requests/{id}/mail - Mail a paid letter through Lob
//! - GET /letter-requests/{id}/mailing-transactions
//!
//! Letters owned by someone else answer 404 unless the caller is an
//! administrator.

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
        letter_request::{
            CheckoutResponse, CreateLetterRequest, LetterDraftRequest, LetterRequestResponse,
            MailLetterResponse, UpdateLetterRequest,
        },
        mailing_transaction::MailingTransaction,
    },
    services::{letter_service, mailing_service},
    state::AppState,
};

/// Create a letter request.
///
/// # Request Body
///
/// ```json
/// {
///   "bill_id": "550e8400-e29b-41d4-a716-446655440000",
///   "politician_id": "660e8400-e29b-41d4-a716-446655440001",
///   "user_comments": "This bill would close the clinic in my town.",
///   "use_profile_return_address": true
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the letter, in `drafting`
/// - **400**: `Invalid bill_id` or `Invalid politician_id`
pub async fn create_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateLetterRequest>,
) -> Result<(StatusCode, Json<LetterRequestResponse>), AppError> {
    let letter = letter_service::create_letter(&state.pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(letter.into())))
}

pub async fn list_letter_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<LetterRequestResponse>>, AppError> {
    let letters = letter_service::list_letters(&state.pool, &auth).await?;
    Ok(Json(letters.into_iter().map(Into::into).collect()))
}

pub async fn get_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
) -> Result<Json<LetterRequestResponse>, AppError> {
    let letter = letter_service::find_letter_for(&state.pool, &auth, letter_id).await?;
    Ok(Json(letter.into()))
}

/// Update a letter request.
///
/// Plain `final_letter_text` is stored as `{"letter": "..."}`.
///
/// # Response
///
/// - **200 OK**: the updated letter
/// - **400**: illegal transition, missing text when finalizing, or an edit
///   after payment
/// - **403**: owner asked for `paid`/`mailed` or set `stripe_charge_id`
pub async fn update_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
    Json(request): Json<UpdateLetterRequest>,
) -> Result<Json<LetterRequestResponse>, AppError> {
    let letter = letter_service::update_letter(&state.pool, &auth, letter_id, request).await?;
    Ok(Json(letter.into()))
}

pub async fn delete_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    letter_service::delete_letter(&state.pool, &auth, letter_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Draft the letter with the language model.
///
/// # Request Body
///
/// ```json
/// {
///   "stance": "oppose",
///   "support_level": 2,
///   "personal_feedback": "My family relies on this clinic."
/// }
/// ```
///
/// The stored text becomes the model's letter and the letter moves to
/// `finalized`. Fails with 400 when the letter has no `user_comments`.
pub async fn draft_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
    Json(request): Json<LetterDraftRequest>,
) -> Result<Json<LetterRequestResponse>, AppError> {
    let letter = letter_service::draft_letter(
        &state.pool,
        state.integrations.drafter.as_ref(),
        &auth,
        letter_id,
        request,
    )
    .await?;

    Ok(Json(letter.into()))
}

/// `POST /letter-requests/{id}/pay`
///
/// Answers `{ "checkout_url": "https://checkout.stripe.com/..." }`. The
/// letter becomes `paid` once Stripe calls the webhook.
pub async fn pay_for_letter(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let checkout = letter_service::start_checkout(
        &state.pool,
        state.integrations.payments.as_ref(),
        &state.config,
        &auth,
        letter_id,
    )
    .await?;

    Ok(Json(checkout))
}

/// Mail a paid letter.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "message": "Letter mailed successfully",
///   "mailing_transaction_id": "880e8400-...",
///   "mail_service_response": { "id": "ltr_4868c3b754655f90", "...": "..." }
/// }
/// ```
///
/// A carrier failure answers 500 `Failed to send letter`; the attempt is
/// recorded as a failed mailing transaction and the letter stays `paid`.
/// While another attempt is pending the request answers 400.
pub async fn mail_letter_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
) -> Result<Json<MailLetterResponse>, AppError> {
    let response = mailing_service::mail_letter(
        &state.pool,
        state.integrations.carrier.as_ref(),
        &auth,
        letter_id,
    )
    .await?;

    Ok(Json(response))
}

pub async fn list_mailing_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(letter_id): Path<Uuid>,
) -> Result<Json<Vec<MailingTransaction>>, AppError> {
    let transactions =
        mailing_service::list_mailing_transactions(&state.pool, &auth, letter_id).await?;
    Ok(Json(transactions))
}
