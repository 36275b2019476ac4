//! Letter request lifecycle: creation, edits, drafting, payment.
//!
//! # Concurrency
//!
//! Every status change is a guarded update
//! (`... WHERE id = $1 AND status = $expected`). When the row moved on
//! between the read and the write, no row matches and the request fails
//! with `InvalidTransition` instead of overwriting the newer status.

use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::letter_request::{
        CheckoutResponse, CreateLetterRequest, LetterDraftRequest, LetterRequest, LetterStatus,
        UpdateLetterRequest,
    },
    services::{
        drafting_service::{LetterDrafter, build_draft_prompt},
        letter_format::{extract_letter_text, normalize_letter_text, wrap_letter_text},
        payment_service::{CheckoutRequest, PaymentGateway, checkout_urls},
    },
};

/// Result of applying a completed Stripe checkout to a letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The letter moved from finalized to paid
    Paid,
    /// A redelivered event; the letter had already moved past finalized
    AlreadyPaid,
    /// The letter is still being drafted
    NotPayable(LetterStatus),
    /// No letter with that id
    Missing,
}

pub async fn find_letter(pool: &DbPool, id: Uuid) -> Result<LetterRequest, AppError> {
    sqlx::query_as::<_, LetterRequest>("SELECT * FROM user_letter_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Letter request"))
}

/// Load a letter the caller owns, or any letter for administrators.
///
/// Letters of other users are reported as missing rather than forbidden.
pub async fn find_letter_for(
    pool: &DbPool,
    auth: &AuthContext,
    id: Uuid,
) -> Result<LetterRequest, AppError> {
    let letter = find_letter(pool, id).await?;
    auth.ensure_visible(letter.user_id, "Letter request")?;
    Ok(letter)
}

/// Create a letter in `drafting` for the caller.
pub async fn create_letter(
    pool: &DbPool,
    user_id: Uuid,
    request: CreateLetterRequest,
) -> Result<LetterRequest, AppError> {
    let bill_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bills WHERE id = $1)")
        .bind(request.bill_id)
        .fetch_one(pool)
        .await?;
    if !bill_exists {
        return Err(AppError::bad_request("Invalid bill_id"));
    }

    let politician_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM politicians WHERE id = $1)")
            .bind(request.politician_id)
            .fetch_one(pool)
            .await?;
    if !politician_exists {
        return Err(AppError::bad_request("Invalid politician_id"));
    }

    let letter = sqlx::query_as::<_, LetterRequest>(
        r#"
        INSERT INTO user_letter_requests (
            user_id,
            bill_id,
            politician_id,
            user_comments,
            status,
            use_profile_return_address
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(request.bill_id)
    .bind(request.politician_id)
    .bind(request.user_comments)
    .bind(LetterStatus::Drafting.as_str())
    .bind(request.use_profile_return_address)
    .fetch_one(pool)
    .await?;

    tracing::info!(letter_request_id = %letter.id, %user_id, "letter request created");
    Ok(letter)
}

/// Administrators see every letter, users only their own. Newest first.
pub async fn list_letters(
    pool: &DbPool,
    auth: &AuthContext,
) -> Result<Vec<LetterRequest>, AppError> {
    let letters = if auth.is_admin() {
        sqlx::query_as::<_, LetterRequest>(
            "SELECT * FROM user_letter_requests ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, LetterRequest>(
            "SELECT * FROM user_letter_requests WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(auth.user_id)
        .fetch_all(pool)
        .await?
    };

    Ok(letters)
}

/// Decide the status a PATCH leads to, enforcing who may do what.
///
/// Returns the target status, which equals the current one when the body
/// does not change it.
pub fn plan_update(
    letter: &LetterRequest,
    is_admin: bool,
    update: &UpdateLetterRequest,
) -> Result<LetterStatus, AppError> {
    if update.stripe_charge_id.is_some() && !is_admin {
        return Err(AppError::Forbidden(
            "Only administrators can set stripe_charge_id".to_string(),
        ));
    }

    if update.edits_content() && !is_admin && !letter.status.is_editable() {
        return Err(AppError::bad_request(
            "Letter can no longer be edited after payment",
        ));
    }

    let Some(next) = update.status.filter(|next| *next != letter.status) else {
        return Ok(letter.status);
    };

    let next = letter.status.transition(next)?;
    if !is_admin && !letter.status.owner_may_request(next) {
        return Err(AppError::Forbidden(format!(
            "Only administrators can mark letters {next}"
        )));
    }

    if next == LetterStatus::Finalized {
        // Judge the text as it will be stored, so a finalized letter can
        // always be mailed once paid.
        let stored = match update.final_letter_text.as_deref() {
            Some(text) => Some(normalize_letter_text(text)),
            None => letter.final_letter_text.clone(),
        };
        let mailable = stored
            .as_deref()
            .is_some_and(|text| extract_letter_text(text).is_ok());
        if !mailable {
            return Err(AppError::bad_request(
                "final_letter_text is required to finalize a letter",
            ));
        }
    }

    Ok(next)
}

pub async fn update_letter(
    pool: &DbPool,
    auth: &AuthContext,
    id: Uuid,
    update: UpdateLetterRequest,
) -> Result<LetterRequest, AppError> {
    let letter = find_letter_for(pool, auth, id).await?;
    let next = plan_update(&letter, auth.is_admin(), &update)?;

    let final_letter_text = update.final_letter_text.as_deref().map(normalize_letter_text);

    let updated = sqlx::query_as::<_, LetterRequest>(
        r#"
        UPDATE user_letter_requests
        SET user_comments = COALESCE($3, user_comments),
            final_letter_text = COALESCE($4, final_letter_text),
            use_profile_return_address = COALESCE($5, use_profile_return_address),
            stripe_charge_id = COALESCE($6, stripe_charge_id),
            status = $7,
            paid_at = CASE WHEN $7 = 'paid' AND paid_at IS NULL THEN NOW() ELSE paid_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(letter.status.as_str())
    .bind(update.user_comments)
    .bind(final_letter_text)
    .bind(update.use_profile_return_address)
    .bind(update.stripe_charge_id)
    .bind(next.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidTransition {
        from: letter.status,
        to: next,
    })?;

    if next != letter.status {
        tracing::info!(
            letter_request_id = %id,
            from = %letter.status,
            to = %next,
            by = %auth.user_id,
            "letter status changed"
        );
    }

    Ok(updated)
}

/// Owners may delete unpaid letters; administrators may delete any letter.
pub async fn delete_letter(pool: &DbPool, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let letter = find_letter_for(pool, auth, id).await?;

    if !auth.is_admin() && !letter.status.is_editable() {
        return Err(AppError::bad_request(
            "Only drafting or finalized letters can be deleted",
        ));
    }

    let deleted = sqlx::query("DELETE FROM user_letter_requests WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(letter.status.as_str())
        .execute(pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::bad_request(
            "Letter changed while it was being deleted",
        ));
    }

    tracing::info!(letter_request_id = %id, by = %auth.user_id, "letter request deleted");
    Ok(())
}

/// Draft the letter text with the language model and finalize the letter.
pub async fn draft_letter(
    pool: &DbPool,
    drafter: &dyn LetterDrafter,
    auth: &AuthContext,
    id: Uuid,
    draft: LetterDraftRequest,
) -> Result<LetterRequest, AppError> {
    draft.validate()?;

    let letter = find_letter_for(pool, auth, id).await?;
    if !letter.status.is_editable() {
        return Err(AppError::bad_request(
            "Letter can only be drafted before payment.",
        ));
    }

    let comments = letter
        .user_comments
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("No user_comments provided for drafting."))?;

    let (bill_title, politician_name): (String, String) = sqlx::query_as(
        r#"
        SELECT b.title, p.name
        FROM bills b, politicians p
        WHERE b.id = $1 AND p.id = $2
        "#,
    )
    .bind(letter.bill_id)
    .bind(letter.politician_id)
    .fetch_one(pool)
    .await?;

    let bill_name = draft.bill_name.clone().unwrap_or(bill_title);
    let lawmaker_name = draft.lawmaker_name.clone().unwrap_or(politician_name);
    let prompt = build_draft_prompt(&bill_name, &lawmaker_name, &draft, comments);

    let text = drafter.draft(&prompt).await?;

    let updated = sqlx::query_as::<_, LetterRequest>(
        r#"
        UPDATE user_letter_requests
        SET final_letter_text = $3,
            status = $4,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(letter.status.as_str())
    .bind(wrap_letter_text(&text))
    .bind(LetterStatus::Finalized.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidTransition {
        from: letter.status,
        to: LetterStatus::Finalized,
    })?;

    tracing::info!(letter_request_id = %id, "letter drafted and finalized");
    Ok(updated)
}

/// Open a Stripe Checkout session for a finalized letter.
pub async fn start_checkout(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    config: &Config,
    auth: &AuthContext,
    id: Uuid,
) -> Result<CheckoutResponse, AppError> {
    let letter = find_letter_for(pool, auth, id).await?;
    if letter.status != LetterStatus::Finalized {
        return Err(AppError::bad_request(
            "Letter must be finalized before paying.",
        ));
    }

    let (success_url, cancel_url) = checkout_urls(&config.public_base_url, id)
        .map_err(|e| AppError::Internal(format!("invalid PUBLIC_BASE_URL: {e}")))?;

    let session = gateway
        .create_checkout_session(&CheckoutRequest {
            letter_request_id: id,
            amount_cents: config.letter_price_cents,
            currency: config.letter_currency.clone(),
            success_url,
            cancel_url,
        })
        .await?;

    tracing::info!(letter_request_id = %id, session_id = %session.id, "checkout session created");
    Ok(CheckoutResponse {
        checkout_url: session.url,
    })
}

/// Record a completed payment. Safe to call again for the same letter.
pub async fn mark_paid(
    pool: &DbPool,
    id: Uuid,
    payment_intent: Option<&str>,
) -> Result<PaymentOutcome, AppError> {
    let updated = sqlx::query(
        r#"
        UPDATE user_letter_requests
        SET status = $2,
            stripe_charge_id = COALESCE($3, stripe_charge_id),
            paid_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND status = $4
        "#,
    )
    .bind(id)
    .bind(LetterStatus::Paid.as_str())
    .bind(payment_intent)
    .bind(LetterStatus::Finalized.as_str())
    .execute(pool)
    .await?
    .rows_affected();

    if updated > 0 {
        return Ok(PaymentOutcome::Paid);
    }

    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM user_letter_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let status = status
        .map(|s| s.parse::<LetterStatus>())
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(payment_outcome(status))
}

/// Why a completed checkout did not move the letter to `paid`, given its
/// current status.
pub fn payment_outcome(current: Option<LetterStatus>) -> PaymentOutcome {
    match current {
        None => PaymentOutcome::Missing,
        Some(LetterStatus::Paid | LetterStatus::Mailed) => PaymentOutcome::AlreadyPaid,
        Some(other) => PaymentOutcome::NotPayable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::letter_request::tests::sample_letter;

    fn owner_letter(status: LetterStatus) -> LetterRequest {
        sample_letter(Uuid::new_v4(), status)
    }

    #[test]
    fn owners_can_finalize_and_reopen() {
        let letter = owner_letter(LetterStatus::Drafting);
        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Finalized),
            ..Default::default()
        };
        assert_eq!(
            plan_update(&letter, false, &update).unwrap(),
            LetterStatus::Finalized
        );

        let letter = owner_letter(LetterStatus::Finalized);
        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Drafting),
            ..Default::default()
        };
        assert_eq!(
            plan_update(&letter, false, &update).unwrap(),
            LetterStatus::Drafting
        );
    }

    #[test]
    fn owners_cannot_mark_paid() {
        let letter = owner_letter(LetterStatus::Finalized);
        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Paid),
            ..Default::default()
        };

        assert!(matches!(
            plan_update(&letter, false, &update),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            plan_update(&letter, true, &update).unwrap(),
            LetterStatus::Paid
        );
    }

    #[test]
    fn illegal_transitions_fail_for_admins_too() {
        let letter = owner_letter(LetterStatus::Drafting);
        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Mailed),
            ..Default::default()
        };

        assert!(matches!(
            plan_update(&letter, true, &update),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn finalizing_requires_letter_text() {
        let mut letter = owner_letter(LetterStatus::Drafting);
        letter.final_letter_text = None;

        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Finalized),
            ..Default::default()
        };
        assert!(matches!(
            plan_update(&letter, false, &update),
            Err(AppError::InvalidRequest(_))
        ));

        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Finalized),
            final_letter_text: Some("Dear Senator,".to_string()),
            ..Default::default()
        };
        assert!(plan_update(&letter, false, &update).is_ok());
    }

    #[test]
    fn finalizing_rejects_an_empty_letter_field() {
        let mut letter = owner_letter(LetterStatus::Drafting);
        letter.final_letter_text = None;

        for text in [r#"{"letter": ""}"#, r#"{"letter": "   "}"#, "   "] {
            let update = UpdateLetterRequest {
                status: Some(LetterStatus::Finalized),
                final_letter_text: Some(text.to_string()),
                ..Default::default()
            };
            assert!(
                matches!(
                    plan_update(&letter, false, &update),
                    Err(AppError::InvalidRequest(_))
                ),
                "{text:?} should not finalize"
            );
        }
    }

    #[test]
    fn finalizing_rejects_stored_text_without_a_letter() {
        let mut letter = owner_letter(LetterStatus::Drafting);
        letter.final_letter_text = Some(r#"{"letter": ""}"#.to_string());

        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Finalized),
            ..Default::default()
        };
        assert!(matches!(
            plan_update(&letter, false, &update),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn paid_letters_are_frozen_for_owners() {
        let letter = owner_letter(LetterStatus::Paid);
        let update = UpdateLetterRequest {
            user_comments: Some("changed my mind".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            plan_update(&letter, false, &update),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(plan_update(&letter, true, &update).is_ok());
    }

    #[test]
    fn only_admins_set_the_charge_id() {
        let letter = owner_letter(LetterStatus::Finalized);
        let update = UpdateLetterRequest {
            stripe_charge_id: Some("pi_123".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            plan_update(&letter, false, &update),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            plan_update(&letter, true, &update).unwrap(),
            LetterStatus::Finalized
        );
    }

    #[test]
    fn redelivered_payments_leave_paid_letters_alone() {
        assert_eq!(
            payment_outcome(Some(LetterStatus::Paid)),
            PaymentOutcome::AlreadyPaid
        );
        assert_eq!(
            payment_outcome(Some(LetterStatus::Mailed)),
            PaymentOutcome::AlreadyPaid
        );
    }

    #[test]
    fn payments_for_drafts_or_unknown_letters_are_not_applied() {
        assert_eq!(
            payment_outcome(Some(LetterStatus::Drafting)),
            PaymentOutcome::NotPayable(LetterStatus::Drafting)
        );
        assert_eq!(payment_outcome(None), PaymentOutcome::Missing);
    }

    #[test]
    fn repeating_the_current_status_is_a_no_op() {
        let letter = owner_letter(LetterStatus::Paid);
        let update = UpdateLetterRequest {
            status: Some(LetterStatus::Paid),
            ..Default::default()
        };
        assert_eq!(
            plan_update(&letter, false, &update).unwrap(),
            LetterStatus::Paid
        );
    }
}
