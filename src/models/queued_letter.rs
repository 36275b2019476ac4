//! Print queue models.
//!
//! A queued letter is a finalized or paid letter waiting to be printed
//! in-house instead of being mailed through Lob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// Status of a print queue entry.
    pub enum QueuedLetterStatus {
        Queued => "queued",
        /// Sent to the printer
        Processed => "processed",
    }
}

impl QueuedLetterStatus {
    /// Entries flip between queued and processed; an administrator can
    /// requeue a processed entry to print it again.
    pub fn can_transition_to(self, next: QueuedLetterStatus) -> bool {
        self != next
    }
}

/// Queue entry joined with the letter it points at.
///
/// `owner_id` is the letter owner and drives visibility: users only see
/// entries for their own letters.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedLetterView {
    pub id: Uuid,
    pub user_letter_request_id: Uuid,

    #[sqlx(try_from = "String")]
    pub status: QueuedLetterStatus,

    /// CUPS job id of the last print
    pub print_job_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub bill_id: Uuid,
    pub politician_id: Uuid,
}

/// Request body for `POST /queued-letters`.
#[derive(Debug, Deserialize)]
pub struct CreateQueuedLetterRequest {
    pub user_letter_request_id: Uuid,
}

/// Request body for `PATCH /queued-letters/{id}` (administrators only).
#[derive(Debug, Deserialize)]
pub struct UpdateQueuedLetterRequest {
    pub status: QueuedLetterStatus,
}

/// Query string of `POST /queued-letters/{id}/print`.
#[derive(Debug, Deserialize)]
pub struct PrintQuery {
    pub printer_name: String,
}

/// Response of `POST /queued-letters/{id}/print`.
#[derive(Debug, Serialize)]
pub struct PrintResponse {
    pub message: String,
    pub job_id: String,
}

/// Response body for queue endpoints.
///
/// ```json
/// {
///   "id": "770e8400-...",
///   "user_letter_request_id": "550e8400-...",
///   "status": "queued",
///   "print_job_id": null,
///   "bill_id": "...",
///   "politician_id": "...",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct QueuedLetterResponse {
    pub id: Uuid,
    pub user_letter_request_id: Uuid,
    pub status: QueuedLetterStatus,
    pub print_job_id: Option<String>,
    pub bill_id: Uuid,
    pub politician_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QueuedLetterView> for QueuedLetterResponse {
    fn from(entry: QueuedLetterView) -> Self {
        Self {
            id: entry.id,
            user_letter_request_id: entry.user_letter_request_id,
            status: entry.status,
            print_job_id: entry.print_job_id,
            bill_id: entry.bill_id,
            politician_id: entry.politician_id,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_toggle_between_queued_and_processed() {
        use QueuedLetterStatus::*;

        assert!(Queued.can_transition_to(Processed));
        assert!(Processed.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Queued));
    }
}
