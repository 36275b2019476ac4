//! Stripe webhook verification and event handling.
//!
//! Stripe signs every delivery with the endpoint secret. The
//! `Stripe-Signature` header looks like:
//!
//! ```text
//! t=1735689600,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! The `v1` value is HMAC-SHA256(secret, "{t}.{raw body}") in hex. More than
//! one `v1` entry may be present while a secret is being rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    db::DbPool,
    error::AppError,
    models::webhook::StripeEvent,
    services::letter_service::{self, PaymentOutcome},
};

type HmacSha256 = Hmac<Sha256>;

/// Why a `Stripe-Signature` header was rejected.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    Malformed,

    #[error("timestamp outside the tolerance window")]
    Expired,

    #[error("no matching v1 signature")]
    Mismatch,
}

/// Compute the hex `v1` signature for a payload sent at `timestamp`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, AppError> {
    let mac = new_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn new_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current Unix time; the signed timestamp must be within
/// `tolerance_secs` of it in either direction.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let matches = signatures.iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        new_mac(secret, timestamp, payload)
            .map(|mac| mac.verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matches {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Parse a verified payload into an event.
pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, AppError> {
    serde_json::from_slice(payload).map_err(|_| AppError::bad_request("Invalid payload"))
}

/// Apply an event. Events that do not concern a letter are acknowledged
/// without side effects so Stripe stops redelivering them.
pub async fn handle_event(pool: &DbPool, event: &StripeEvent) -> Result<(), AppError> {
    let Some(checkout) = event.completed_checkout() else {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring stripe event");
        return Ok(());
    };

    let outcome = letter_service::mark_paid(
        pool,
        checkout.letter_request_id,
        checkout.payment_intent.as_deref(),
    )
    .await?;

    match outcome {
        PaymentOutcome::Paid => tracing::info!(
            event_id = %event.id,
            letter_request_id = %checkout.letter_request_id,
            "letter marked paid"
        ),
        PaymentOutcome::AlreadyPaid => tracing::info!(
            event_id = %event.id,
            letter_request_id = %checkout.letter_request_id,
            "duplicate payment event, letter already paid"
        ),
        PaymentOutcome::NotPayable(status) => tracing::warn!(
            event_id = %event.id,
            letter_request_id = %checkout.letter_request_id,
            %status,
            "payment completed for a letter that is not finalized"
        ),
        PaymentOutcome::Missing => tracing::warn!(
            event_id = %event.id,
            letter_request_id = %checkout.letter_request_id,
            "payment completed for an unknown letter"
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_735_689_600;

    fn header_for(payload: &[u8], timestamp: i64) -> String {
        format!(
            "t={timestamp},v1={}",
            sign_payload(SECRET, timestamp, payload).unwrap()
        )
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = header_for(payload, NOW);

        assert_eq!(
            verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW + 10),
            Ok(())
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = header_for(b"original", NOW);
        assert_eq!(
            verify_stripe_signature(b"tampered", Some(&header), SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = header_for(b"payload", NOW);
        assert_eq!(
            verify_stripe_signature(b"payload", Some(&header), "whsec_other", 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn old_timestamps_are_rejected() {
        let header = header_for(b"payload", NOW - 301);
        assert_eq!(
            verify_stripe_signature(b"payload", Some(&header), SECRET, 300, NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_matching_v1_entry_is_enough() {
        let payload = b"payload";
        let good = sign_payload(SECRET, NOW, payload).unwrap();
        let header = format!("t={NOW},v1={},v0=legacy,v1={good}", "00".repeat(32));

        assert_eq!(
            verify_stripe_signature(payload, Some(&header), SECRET, 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert_eq!(
            verify_stripe_signature(b"p", None, SECRET, 300, NOW),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_stripe_signature(b"p", Some("v1=abcd"), SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_stripe_signature(b"p", Some("t=abc,v1=abcd"), SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_stripe_signature(b"p", Some(&format!("t={NOW}")), SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn unparseable_payload_is_invalid() {
        let err = parse_event(b"not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload");
    }
}
