//! Stripe webhook endpoint.
//!
//! `POST /stripe-webhook` is public; the `Stripe-Signature` header is the
//! only authentication. The raw body is verified before it is parsed, so the
//! handler takes `Bytes` rather than `Json`.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::{
    error::AppError,
    models::webhook::WebhookAck,
    services::webhook_service,
    state::AppState,
};

const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Receive a Stripe event.
///
/// # Response
///
/// - **200 OK**: `{ "status": "success" }`, also for events that are ignored
/// - **400**: `Invalid signature` or `Invalid payload`
///
/// A `checkout.session.completed` event moves the letter named in
/// `metadata.letter_request_id` from `finalized` to `paid`. Redeliveries of
/// an already applied event are acknowledged without changes.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    webhook_service::verify_stripe_signature(
        &body,
        signature,
        &state.config.stripe_endpoint_secret,
        state.config.stripe_webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "rejected stripe webhook");
        AppError::bad_request("Invalid signature")
    })?;

    let event = webhook_service::parse_event(&body)?;
    webhook_service::handle_event(&state.pool, &event).await?;

    Ok(Json(WebhookAck::success()))
}
