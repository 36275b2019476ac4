//! Letter request models and the letter lifecycle.
//!
//! A letter request moves through:
//!
//! ```text
//! drafting ──► finalized ──► paid ──► mailed
//!     ▲            │
//!     └────────────┘
//! ```
//!
//! `finalized → drafting` reopens a letter for editing before payment.
//! Once paid, the text is frozen and the only way forward is mailing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

text_enum! {
    /// Lifecycle status of a letter request.
    pub enum LetterStatus {
        /// Being written; comments and text may change
        Drafting => "drafting",
        /// Text is final and the letter can be paid for or queued
        Finalized => "finalized",
        /// Stripe confirmed payment
        Paid => "paid",
        /// Handed to the mail carrier
        Mailed => "mailed",
    }
}

impl LetterStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: LetterStatus) -> bool {
        use LetterStatus::*;

        matches!(
            (self, next),
            (Drafting, Finalized) | (Finalized, Drafting) | (Finalized, Paid) | (Paid, Mailed)
        )
    }

    /// Validate a move to `next`, returning the new status.
    pub fn transition(self, next: LetterStatus) -> Result<LetterStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Text, comments and return-address choice can only change before payment.
    pub fn is_editable(self) -> bool {
        matches!(self, LetterStatus::Drafting | LetterStatus::Finalized)
    }

    /// Transitions a letter owner may request directly. Payment and mailing
    /// are driven by Stripe and the mailing pipeline.
    pub fn owner_may_request(self, next: LetterStatus) -> bool {
        matches!(
            (self, next),
            (LetterStatus::Drafting, LetterStatus::Finalized)
                | (LetterStatus::Finalized, LetterStatus::Drafting)
        )
    }
}

/// Represents a letter request record from the database.
///
/// # Database Table
///
/// Maps to the `user_letter_requests` table. Each letter:
/// - Belongs to one user (via `user_id`); only that user and administrators see it
/// - Targets one politician about one bill
/// - Stores the drafted text as JSON `{"letter": "..."}` in `final_letter_text`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LetterRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bill_id: Uuid,
    pub politician_id: Uuid,

    /// The requester's own words, used as background when drafting
    pub user_comments: Option<String>,

    pub final_letter_text: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: LetterStatus,

    /// Stripe payment intent recorded when payment completes
    pub stripe_charge_id: Option<String>,

    pub paid_at: Option<DateTime<Utc>>,

    /// Sign with the owner's profile address instead of the organization's
    pub use_profile_return_address: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /letter-requests`.
///
/// # JSON Example
///
/// ```json
/// {
///   "bill_id": "550e8400-e29b-41d4-a716-446655440000",
///   "politician_id": "660e8400-e29b-41d4-a716-446655440001",
///   "user_comments": "This bill would close the clinic in my town."
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateLetterRequest {
    pub bill_id: Uuid,
    pub politician_id: Uuid,
    pub user_comments: Option<String>,

    #[serde(default = "default_use_profile_return_address")]
    pub use_profile_return_address: bool,
}

fn default_use_profile_return_address() -> bool {
    true
}

/// Request body for `PATCH /letter-requests/{id}`.
///
/// `stripe_charge_id` and transitions into `paid`/`mailed` are reserved to
/// administrators.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLetterRequest {
    pub user_comments: Option<String>,
    pub final_letter_text: Option<String>,
    pub status: Option<LetterStatus>,
    pub stripe_charge_id: Option<String>,
    pub use_profile_return_address: Option<bool>,
}

impl UpdateLetterRequest {
    /// Whether the body touches fields that are frozen after payment.
    pub fn edits_content(&self) -> bool {
        self.user_comments.is_some()
            || self.final_letter_text.is_some()
            || self.use_profile_return_address.is_some()
    }
}

text_enum! {
    /// The writer's position on the bill.
    pub enum Stance {
        Support => "support",
        Oppose => "oppose",
    }
}

/// Request body for `POST /letter-requests/{id}/draft`.
///
/// `bill_name` and `lawmaker_name` default to the stored bill title and
/// politician name.
///
/// ```json
/// {
///   "stance": "oppose",
///   "support_level": 2,
///   "personal_feedback": "My family relies on this clinic."
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct LetterDraftRequest {
    pub bill_name: Option<String>,
    pub lawmaker_name: Option<String>,
    pub stance: Stance,

    /// 1 (strongly against) to 10 (strongly for)
    pub support_level: u8,

    pub personal_feedback: Option<String>,
}

impl LetterDraftRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=10).contains(&self.support_level) {
            return Err(AppError::bad_request(
                "support_level must be between 1 and 10",
            ));
        }
        Ok(())
    }
}

/// Response body for letter request endpoints.
#[derive(Debug, Serialize)]
pub struct LetterRequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bill_id: Uuid,
    pub politician_id: Uuid,
    pub user_comments: Option<String>,
    pub final_letter_text: Option<String>,
    pub status: LetterStatus,
    pub stripe_charge_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub use_profile_return_address: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LetterRequest> for LetterRequestResponse {
    fn from(letter: LetterRequest) -> Self {
        Self {
            id: letter.id,
            user_id: letter.user_id,
            bill_id: letter.bill_id,
            politician_id: letter.politician_id,
            user_comments: letter.user_comments,
            final_letter_text: letter.final_letter_text,
            status: letter.status,
            stripe_charge_id: letter.stripe_charge_id,
            paid_at: letter.paid_at,
            use_profile_return_address: letter.use_profile_return_address,
            created_at: letter.created_at,
            updated_at: letter.updated_at,
        }
    }
}

/// Response of `POST /letter-requests/{id}/pay`.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// Response of `POST /letter-requests/{id}/mail`.
#[derive(Debug, Serialize)]
pub struct MailLetterResponse {
    pub message: String,
    pub mailing_transaction_id: Uuid,
    pub mail_service_response: serde_json::Value,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_letter(user_id: Uuid, status: LetterStatus) -> LetterRequest {
        let now = Utc::now();
        LetterRequest {
            id: Uuid::new_v4(),
            user_id,
            bill_id: Uuid::new_v4(),
            politician_id: Uuid::new_v4(),
            user_comments: Some("Please vote no.".to_string()),
            final_letter_text: Some(r#"{"letter": "Dear Senator,\n\nPlease vote no."}"#.to_string()),
            status,
            stripe_charge_id: None,
            paid_at: None,
            use_profile_return_address: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn lifecycle_moves_forward_one_step_at_a_time() {
        use LetterStatus::*;

        assert!(Drafting.can_transition_to(Finalized));
        assert!(Finalized.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Mailed));

        assert!(!Drafting.can_transition_to(Paid));
        assert!(!Drafting.can_transition_to(Mailed));
        assert!(!Finalized.can_transition_to(Mailed));
    }

    #[test]
    fn finalized_letters_can_be_reopened_but_paid_ones_cannot() {
        use LetterStatus::*;

        assert!(Finalized.can_transition_to(Drafting));
        assert!(!Paid.can_transition_to(Drafting));
        assert!(!Paid.can_transition_to(Finalized));
    }

    #[test]
    fn mailed_is_terminal() {
        use LetterStatus::*;

        for next in [Drafting, Finalized, Paid, Mailed] {
            assert!(!Mailed.can_transition_to(next));
        }
    }

    #[test]
    fn transition_reports_both_ends_on_failure() {
        let err = LetterStatus::Drafting
            .transition(LetterStatus::Paid)
            .unwrap_err();
        match err {
            AppError::InvalidTransition { from, to } => {
                assert_eq!(from, LetterStatus::Drafting);
                assert_eq!(to, LetterStatus::Paid);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn owners_cannot_mark_letters_paid_or_mailed() {
        use LetterStatus::*;

        assert!(Drafting.owner_may_request(Finalized));
        assert!(Finalized.owner_may_request(Drafting));
        assert!(!Finalized.owner_may_request(Paid));
        assert!(!Paid.owner_may_request(Mailed));
    }

    #[test]
    fn only_unpaid_letters_are_editable() {
        assert!(LetterStatus::Drafting.is_editable());
        assert!(LetterStatus::Finalized.is_editable());
        assert!(!LetterStatus::Paid.is_editable());
        assert!(!LetterStatus::Mailed.is_editable());
    }

    #[test]
    fn support_level_must_be_between_one_and_ten() {
        let mut draft = LetterDraftRequest {
            bill_name: None,
            lawmaker_name: None,
            stance: Stance::Support,
            support_level: 0,
            personal_feedback: None,
        };
        assert!(draft.validate().is_err());

        draft.support_level = 10;
        assert!(draft.validate().is_ok());

        draft.support_level = 11;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn create_request_defaults_to_profile_return_address() {
        let body = serde_json::json!({
            "bill_id": Uuid::new_v4(),
            "politician_id": Uuid::new_v4()
        });
        let request: CreateLetterRequest = serde_json::from_value(body).unwrap();
        assert!(request.use_profile_return_address);
        assert!(request.user_comments.is_none());
    }
}
