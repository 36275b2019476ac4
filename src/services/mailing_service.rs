//! Physical mailing through Lob and the mailing transaction log.
//!
//! # Process
//!
//! 1. Check the letter is paid and its text extracts cleanly
//! 2. Lock the letter row, refuse if an attempt is already `pending`, and
//!    record a new `pending` mailing transaction
//! 3. Upload the rendered HTML to Lob
//! 4. On failure mark the transaction `failed`; the letter stays `paid`
//! 5. On success mark it `sent` and move the letter to `mailed`, atomically
//!
//! Step 2 serializes concurrent `POST /letter-requests/{id}/mail` calls on
//! the same letter: the second one waits for the row lock, then sees the
//! pending attempt and fails with 400, so only one physical letter is sent.
//! Pending attempts older than ten minutes no longer block.
//!
//! There is no retry. A failed attempt leaves its row behind and a new
//! `POST /letter-requests/{id}/mail` creates a new one.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, IntegrationError},
    middleware::auth::AuthContext,
    models::{
        address::MailingAddress,
        letter_request::{LetterRequest, LetterStatus, MailLetterResponse},
        mailing_transaction::{MailingStatus, MailingTransaction},
        politician::Politician,
        return_address::GlobalReturnAddress,
        user::User,
    },
    services::{
        http_client::expect_success,
        letter_format::{extract_letter_text, render_letter_html},
        letter_service,
    },
};

/// A rendered letter ready to hand to the carrier.
#[derive(Debug, Clone)]
pub struct OutboundLetter {
    pub html: String,
    pub recipient: MailingAddress,
    pub sender: MailingAddress,
}

#[async_trait]
pub trait MailCarrier: Send + Sync {
    /// Submit a letter for printing and postage. Returns the carrier's
    /// JSON description of the created letter.
    async fn send_letter(&self, letter: &OutboundLetter) -> Result<Value, IntegrationError>;
}

/// Lob `POST /v1/letters` client.
pub struct LobCarrier {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl LobCarrier {
    pub fn new(client: reqwest::Client, api_base: String, api_key: String) -> Self {
        Self {
            client,
            api_base,
            api_key,
        }
    }
}

/// Lob address fields for `prefix` (`to` or `from`).
fn address_fields(prefix: &str, address: &MailingAddress) -> Vec<(String, String)> {
    [
        ("name", address.name.as_str()),
        ("address_line1", address.line1.as_str()),
        ("address_line2", address.line2_or_empty()),
        ("address_city", address.city.as_str()),
        ("address_state", address.state.as_str()),
        ("address_zip", address.zip.as_str()),
        ("address_country", "US"),
    ]
    .into_iter()
    .map(|(field, value)| (format!("{prefix}[{field}]"), value.to_string()))
    .collect()
}

/// Every text field of the Lob request, in submission order.
pub fn lob_fields(letter: &OutboundLetter) -> Vec<(String, String)> {
    let mut fields = vec![("description".to_string(), "Legislative letter".to_string())];
    fields.extend(address_fields("to", &letter.recipient));
    fields.extend(address_fields("from", &letter.sender));
    fields.extend(
        [
            ("color", "false"),
            ("double_sided", "false"),
            ("use_type", "operational"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    fields
}

#[async_trait]
impl MailCarrier for LobCarrier {
    async fn send_letter(&self, letter: &OutboundLetter) -> Result<Value, IntegrationError> {
        let url = format!("{}/letters", self.api_base.trim_end_matches('/'));

        let file = Part::text(letter.html.clone())
            .file_name("letter.html")
            .mime_str("text/html")?;
        let form = lob_fields(letter)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part("file", file);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let body = expect_success("Lob", response).await?.json().await?;
        Ok(body)
    }
}

/// Pick the sender of a letter.
///
/// The owner's profile is used when the letter asks for it and the
/// profile holds a complete address; otherwise the organization's global
/// return address.
pub fn resolve_return_address(
    use_profile: bool,
    owner: Option<&User>,
    global: Option<&GlobalReturnAddress>,
) -> Result<MailingAddress, AppError> {
    if use_profile {
        if let Some(address) = owner.and_then(User::return_address) {
            return Ok(address);
        }
    }

    global
        .map(GlobalReturnAddress::mailing_address)
        .ok_or_else(|| AppError::bad_request("No return address available"))
}

pub async fn load_sender(pool: &DbPool, letter: &LetterRequest) -> Result<MailingAddress, AppError> {
    let owner = if letter.use_profile_return_address {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(letter.user_id)
            .fetch_optional(pool)
            .await?
    } else {
        None
    };

    let global = sqlx::query_as::<_, GlobalReturnAddress>(
        "SELECT * FROM global_return_addresses ORDER BY created_at LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    resolve_return_address(
        letter.use_profile_return_address,
        owner.as_ref(),
        global.as_ref(),
    )
}

pub async fn load_recipient(pool: &DbPool, politician_id: Uuid) -> Result<MailingAddress, AppError> {
    let politician = sqlx::query_as::<_, Politician>("SELECT * FROM politicians WHERE id = $1")
        .bind(politician_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Politician"))?;

    Ok(politician.office_address())
}

/// Render `letter_text` as the HTML page for `letter`, with its resolved
/// sender and recipient.
pub async fn compose_letter(
    pool: &DbPool,
    letter: &LetterRequest,
    letter_text: &str,
) -> Result<OutboundLetter, AppError> {
    let recipient = load_recipient(pool, letter.politician_id).await?;
    let sender = load_sender(pool, letter).await?;
    let html = render_letter_html(letter_text, &recipient, &sender);

    Ok(OutboundLetter {
        html,
        recipient,
        sender,
    })
}

/// A `pending` attempt older than this is treated as abandoned (the process
/// died mid-call) and no longer blocks a new attempt.
const PENDING_ATTEMPT_WINDOW_MINUTES: i32 = 10;

/// Whether a letter in `status` may be handed to the carrier now.
pub fn check_mailable(status: LetterStatus, attempt_pending: bool) -> Result<(), AppError> {
    if status != LetterStatus::Paid {
        return Err(AppError::bad_request("Letter must be paid before mailing."));
    }
    if attempt_pending {
        return Err(AppError::bad_request("Letter is already being mailed."));
    }
    Ok(())
}

/// What the carrier call means for the mailing transaction.
#[derive(Debug)]
pub enum CarrierOutcome {
    Sent {
        external_id: Option<String>,
        response: Value,
    },
    Failed {
        error_message: String,
    },
}

impl CarrierOutcome {
    pub fn from_result(result: Result<Value, IntegrationError>) -> Self {
        match result {
            Ok(response) => Self::Sent {
                external_id: response
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                response,
            },
            Err(e) => Self::Failed {
                error_message: e.to_string(),
            },
        }
    }

    pub fn status(&self) -> MailingStatus {
        match self {
            Self::Sent { .. } => MailingStatus::Sent,
            Self::Failed { .. } => MailingStatus::Failed,
        }
    }
}

/// Reported to the client when the carrier rejects or cannot be reached.
/// Vendor details stay in the log and the transaction row.
fn send_failed() -> AppError {
    AppError::Integration("Failed to send letter".to_string())
}

/// Lock the letter, check nothing else is mailing it, and record a
/// `pending` attempt.
async fn begin_attempt(pool: &DbPool, id: Uuid) -> Result<MailingTransaction, AppError> {
    let mut tx = pool.begin().await?;

    // FOR UPDATE makes a concurrent mail request wait until this attempt is recorded
    let status: String =
        sqlx::query_scalar("SELECT status FROM user_letter_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Letter request"))?;
    let status: LetterStatus = status
        .parse()
        .map_err(|e: crate::models::UnknownVariant| AppError::Internal(e.to_string()))?;

    let pending: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM mailing_transactions
            WHERE user_letter_request_id = $1
              AND status = $2
              AND created_at > NOW() - make_interval(mins => $3)
        )
        "#,
    )
    .bind(id)
    .bind(MailingStatus::Pending.as_str())
    .bind(PENDING_ATTEMPT_WINDOW_MINUTES)
    .fetch_one(&mut *tx)
    .await?;

    check_mailable(status, pending)?;

    let attempt = sqlx::query_as::<_, MailingTransaction>(
        r#"
        INSERT INTO mailing_transactions (user_letter_request_id, status)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(MailingStatus::Pending.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(attempt)
}

/// Mail a paid letter through the carrier.
pub async fn mail_letter(
    pool: &DbPool,
    carrier: &dyn MailCarrier,
    auth: &AuthContext,
    id: Uuid,
) -> Result<MailLetterResponse, AppError> {
    let letter = letter_service::find_letter_for(pool, auth, id).await?;
    check_mailable(letter.status, false)?;

    let raw = letter
        .final_letter_text
        .as_deref()
        .ok_or_else(|| AppError::bad_request("No final letter text available."))?;
    let text = extract_letter_text(raw)?;

    let outbound = compose_letter(pool, &letter, &text).await?;
    let pending = begin_attempt(pool, id).await?;

    let outcome = CarrierOutcome::from_result(carrier.send_letter(&outbound).await);

    let (external_id, mail_service_response) = match outcome {
        CarrierOutcome::Sent {
            external_id,
            response,
        } => (external_id, response),
        CarrierOutcome::Failed { error_message } => {
            tracing::error!(
                letter_request_id = %id,
                mailing_transaction_id = %pending.id,
                error = %error_message,
                "mailing failed"
            );

            sqlx::query(
                r#"
                UPDATE mailing_transactions
                SET status = $2, error_message = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(pending.id)
            .bind(MailingStatus::Failed.as_str())
            .bind(error_message)
            .execute(pool)
            .await?;

            return Err(send_failed());
        }
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE mailing_transactions
        SET status = $2,
            external_mail_service_id = $3,
            mail_service_response = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(pending.id)
    .bind(MailingStatus::Sent.as_str())
    .bind(&external_id)
    .bind(&mail_service_response)
    .execute(&mut *tx)
    .await?;

    let moved = sqlx::query(
        "UPDATE user_letter_requests SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
    )
    .bind(id)
    .bind(LetterStatus::Mailed.as_str())
    .bind(LetterStatus::Paid.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // The carrier already accepted the letter, so the sent record is kept
    // even if the letter status moved underneath us.
    if moved == 0 {
        tracing::warn!(letter_request_id = %id, "letter was no longer paid when mailing completed");
    }

    tx.commit().await?;

    tracing::info!(
        letter_request_id = %id,
        mailing_transaction_id = %pending.id,
        external_mail_service_id = external_id.as_deref().unwrap_or("-"),
        "letter mailed"
    );

    Ok(MailLetterResponse {
        message: "Letter mailed successfully".to_string(),
        mailing_transaction_id: pending.id,
        mail_service_response,
    })
}

/// Mailing attempts for a letter, newest first.
pub async fn list_mailing_transactions(
    pool: &DbPool,
    auth: &AuthContext,
    letter_id: Uuid,
) -> Result<Vec<MailingTransaction>, AppError> {
    letter_service::find_letter_for(pool, auth, letter_id).await?;

    let transactions = sqlx::query_as::<_, MailingTransaction>(
        r#"
        SELECT * FROM mailing_transactions
        WHERE user_letter_request_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(letter_id)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}
