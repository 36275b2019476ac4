//! Public informational endpoints: the root greeting and the pages Stripe
//! redirects to after checkout.

use axum::{Json, extract::Query};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::MessageResponse;

#[derive(Debug, Deserialize)]
pub struct PaymentRedirectQuery {
    pub letter_id: Uuid,
}

/// `GET /`
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello from LetterLobby!"))
}

/// `GET /payment-success?letter_id=...`
///
/// Only informational; the letter is marked paid by the Stripe webhook.
pub async fn payment_success(Query(query): Query<PaymentRedirectQuery>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Payment succeeded for letter_id: {}",
        query.letter_id
    )))
}

/// `GET /payment-cancel?letter_id=...`
pub async fn payment_cancel(Query(query): Query<PaymentRedirectQuery>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Payment was canceled for letter_id: {}",
        query.letter_id
    )))
}
