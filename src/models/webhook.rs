//! Stripe webhook event models.
//!
//! Only the parts of a Stripe event the server acts on are modelled; the
//! event object stays a raw [`serde_json::Value`] until its type is known.
//!
//! # Webhook Flow
//!
//! 1. `POST /letter-requests/{id}/pay` opens a Checkout session whose
//!    metadata carries `letter_request_id`
//! 2. Stripe calls `POST /stripe-webhook` with a signed event
//! 3. `checkout.session.completed` moves the letter from finalized to paid

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event type sent when a Checkout session has been paid.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Envelope of every Stripe event.
///
/// # Example
///
/// ```json
/// {
///   "id": "evt_1Q...",
///   "type": "checkout.session.completed",
///   "data": { "object": { "id": "cs_test_...", "payment_intent": "pi_...",
///                          "metadata": { "letter_request_id": "550e8400-..." } } }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// The Checkout Session fields read from `data.object`.
#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: Option<String>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

/// A paid Checkout session that belongs to a letter request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub session_id: Option<String>,
    pub letter_request_id: Uuid,
    pub payment_intent: Option<String>,
}

impl StripeEvent {
    /// The completed checkout carried by this event, if it is a
    /// `checkout.session.completed` event for a letter request.
    ///
    /// Sessions without a parseable `letter_request_id` in their metadata
    /// were not created by this server and yield `None`.
    pub fn completed_checkout(&self) -> Option<CompletedCheckout> {
        if self.event_type != CHECKOUT_SESSION_COMPLETED {
            return None;
        }

        let session: CheckoutSessionObject =
            serde_json::from_value(self.data.object.clone()).ok()?;
        let letter_request_id = session
            .metadata
            .get("letter_request_id")
            .and_then(|id| Uuid::parse_str(id).ok())?;

        Some(CompletedCheckout {
            session_id: session.id,
            letter_request_id,
            payment_intent: session.payment_intent,
        })
    }
}

/// Body returned to Stripe once an event has been accepted.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    pub fn success() -> Self {
        Self { status: "success" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_test",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn completed_checkout_reads_letter_and_payment_intent() {
        let letter_id = Uuid::new_v4();
        let event = event(
            CHECKOUT_SESSION_COMPLETED,
            json!({
                "id": "cs_test_1",
                "payment_intent": "pi_123",
                "metadata": { "letter_request_id": letter_id.to_string() }
            }),
        );

        let checkout = event.completed_checkout().unwrap();
        assert_eq!(checkout.letter_request_id, letter_id);
        assert_eq!(checkout.payment_intent.as_deref(), Some("pi_123"));
        assert_eq!(checkout.session_id.as_deref(), Some("cs_test_1"));
    }

    #[test]
    fn other_event_types_are_ignored() {
        let event = event(
            "payment_intent.succeeded",
            json!({ "metadata": { "letter_request_id": Uuid::new_v4().to_string() } }),
        );
        assert!(event.completed_checkout().is_none());
    }

    #[test]
    fn sessions_without_a_letter_are_ignored() {
        let missing = event(CHECKOUT_SESSION_COMPLETED, json!({ "id": "cs_1" }));
        assert!(missing.completed_checkout().is_none());

        let garbage = event(
            CHECKOUT_SESSION_COMPLETED,
            json!({ "metadata": { "letter_request_id": "not-a-uuid" } }),
        );
        assert!(garbage.completed_checkout().is_none());
    }
}
