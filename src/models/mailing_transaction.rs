//! Mailing transaction model: one row per attempt to mail a letter via Lob.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

text_enum! {
    /// Outcome of a mailing attempt.
    pub enum MailingStatus {
        /// Recorded before the carrier is called
        Pending => "pending",
        Sent => "sent",
        Failed => "failed",
    }
}

/// Represents a row of the `mailing_transactions` table.
///
/// Rows are never retried or reused; a new attempt gets a new row.
/// Nothing here is sensitive, so the row is serialized as-is.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MailingTransaction {
    pub id: Uuid,
    pub user_letter_request_id: Uuid,

    /// Lob letter id (`ltr_...`) when the carrier accepted the letter
    pub external_mail_service_id: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: MailingStatus,

    pub error_message: Option<String>,

    /// Full JSON body returned by Lob
    pub mail_service_response: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
