//! Print queue for letters mailed in-house.
//!
//! Visibility follows the letter: users see queue entries of their own
//! letters, administrators see every entry. Changing an entry's status,
//! clearing the queue and printing are administrator actions.

use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        letter_request::LetterStatus,
        queued_letter::{
            CreateQueuedLetterRequest, PrintResponse, QueuedLetterStatus, QueuedLetterView,
            UpdateQueuedLetterRequest,
        },
    },
    services::{
        letter_format::extract_letter_text_lenient,
        letter_service,
        mailing_service::compose_letter,
        printing_service::{PRINT_JOB_TITLE, PrintSpooler},
    },
};

const SELECT_VIEW: &str = r#"
    SELECT q.id,
           q.user_letter_request_id,
           q.status,
           q.print_job_id,
           q.created_at,
           q.updated_at,
           r.user_id AS owner_id,
           r.bill_id,
           r.politician_id
    FROM queued_letters q
    JOIN user_letter_requests r ON r.id = q.user_letter_request_id
"#;

fn already_queued() -> AppError {
    AppError::bad_request("Letter is already queued")
}

/// A concurrent enqueue of the same letter trips the partial unique index.
fn map_queue_write_error(err: sqlx::Error) -> AppError {
    if db::is_unique_violation(&err) {
        already_queued()
    } else {
        AppError::Database(err)
    }
}

/// Whether a letter in `status` may get a new queue entry.
pub fn check_enqueue(status: LetterStatus, already_in_queue: bool) -> Result<(), AppError> {
    if !matches!(status, LetterStatus::Finalized | LetterStatus::Paid) {
        return Err(AppError::bad_request(
            "Only finalized or paid letters can be queued",
        ));
    }
    if already_in_queue {
        return Err(already_queued());
    }
    Ok(())
}

pub async fn find_entry(pool: &DbPool, id: Uuid) -> Result<QueuedLetterView, AppError> {
    sqlx::query_as::<_, QueuedLetterView>(&format!("{SELECT_VIEW} WHERE q.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Queued letter"))
}

/// Load an entry whose letter the caller owns, or any entry for administrators.
pub async fn find_entry_for(
    pool: &DbPool,
    auth: &AuthContext,
    id: Uuid,
) -> Result<QueuedLetterView, AppError> {
    let entry = find_entry(pool, id).await?;
    auth.ensure_visible(entry.owner_id, "Queued letter")?;
    Ok(entry)
}

/// Put a finalized or paid letter in the queue.
pub async fn enqueue(
    pool: &DbPool,
    auth: &AuthContext,
    request: CreateQueuedLetterRequest,
) -> Result<QueuedLetterView, AppError> {
    let letter =
        letter_service::find_letter_for(pool, auth, request.user_letter_request_id).await?;

    let queued: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM queued_letters WHERE user_letter_request_id = $1 AND status = $2)",
    )
    .bind(letter.id)
    .bind(QueuedLetterStatus::Queued.as_str())
    .fetch_one(pool)
    .await?;
    check_enqueue(letter.status, queued)?;

    // The partial unique index catches a concurrent enqueue of the same letter
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO queued_letters (user_letter_request_id, status) VALUES ($1, $2) RETURNING id",
    )
    .bind(letter.id)
    .bind(QueuedLetterStatus::Queued.as_str())
    .fetch_one(pool)
    .await
    .map_err(map_queue_write_error)?;

    tracing::info!(queued_letter_id = %id, letter_request_id = %letter.id, "letter queued");
    find_entry(pool, id).await
}

/// Oldest entries first, the order they should be printed in.
pub async fn list_entries(
    pool: &DbPool,
    auth: &AuthContext,
) -> Result<Vec<QueuedLetterView>, AppError> {
    let entries = if auth.is_admin() {
        sqlx::query_as::<_, QueuedLetterView>(&format!("{SELECT_VIEW} ORDER BY q.created_at"))
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as::<_, QueuedLetterView>(&format!(
            "{SELECT_VIEW} WHERE r.user_id = $1 ORDER BY q.created_at"
        ))
        .bind(auth.user_id)
        .fetch_all(pool)
        .await?
    };

    Ok(entries)
}

pub async fn update_status(
    pool: &DbPool,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateQueuedLetterRequest,
) -> Result<QueuedLetterView, AppError> {
    auth.require_admin()?;
    let entry = find_entry(pool, id).await?;

    if !entry.status.can_transition_to(request.status) {
        return Err(AppError::bad_request(format!(
            "Queued letter is already {}",
            entry.status
        )));
    }

    let updated = sqlx::query(
        "UPDATE queued_letters SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(entry.status.as_str())
    .bind(request.status.as_str())
    .execute(pool)
    .await
    .map_err(map_queue_write_error)?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::bad_request("Queued letter changed concurrently"));
    }

    tracing::info!(queued_letter_id = %id, from = %entry.status, to = %request.status, "queue entry updated");
    find_entry(pool, id).await
}

pub async fn delete_entry(pool: &DbPool, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    find_entry_for(pool, auth, id).await?;

    sqlx::query("DELETE FROM queued_letters WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove every entry from the queue.
pub async fn clear_queue(pool: &DbPool, auth: &AuthContext) -> Result<u64, AppError> {
    auth.require_admin()?;

    let removed = sqlx::query("DELETE FROM queued_letters")
        .execute(pool)
        .await?
        .rows_affected();

    tracing::info!(removed, by = %auth.user_id, "print queue cleared");
    Ok(removed)
}

async fn entry_pdf(
    pool: &DbPool,
    spooler: &dyn PrintSpooler,
    entry: &QueuedLetterView,
) -> Result<Vec<u8>, AppError> {
    let letter = letter_service::find_letter(pool, entry.user_letter_request_id).await?;
    let text = extract_letter_text_lenient(letter.final_letter_text.as_deref());
    let outbound = compose_letter(pool, &letter, &text).await?;

    Ok(spooler.render_pdf(&outbound.html).await?)
}

/// The queued letter rendered as a PDF.
pub async fn render_pdf(
    pool: &DbPool,
    spooler: &dyn PrintSpooler,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Vec<u8>, AppError> {
    let entry = find_entry_for(pool, auth, id).await?;
    entry_pdf(pool, spooler, &entry).await
}

/// Print a queued letter and mark it processed.
pub async fn print_entry(
    pool: &DbPool,
    spooler: &dyn PrintSpooler,
    auth: &AuthContext,
    id: Uuid,
    printer_name: &str,
) -> Result<PrintResponse, AppError> {
    auth.require_admin()?;
    let entry = find_entry(pool, id).await?;

    let pdf = entry_pdf(pool, spooler, &entry).await?;
    let job_id = spooler
        .print_pdf(&pdf, printer_name.trim(), PRINT_JOB_TITLE)
        .await?;

    sqlx::query(
        "UPDATE queued_letters SET status = $2, print_job_id = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(QueuedLetterStatus::Processed.as_str())
    .bind(&job_id)
    .execute(pool)
    .await?;

    tracing::info!(queued_letter_id = %id, printer = %printer_name, %job_id, "letter sent to printer");
    Ok(PrintResponse {
        message: "Printing initiated".to_string(),
        job_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{foreign_key_violation, unique_violation};

    fn message(err: AppError) -> String {
        match err {
            AppError::InvalidRequest(message) => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_finalized_or_paid_letters_are_queued() {
        assert!(check_enqueue(LetterStatus::Finalized, false).is_ok());
        assert!(check_enqueue(LetterStatus::Paid, false).is_ok());

        for status in [LetterStatus::Drafting, LetterStatus::Mailed] {
            assert_eq!(
                message(check_enqueue(status, false).unwrap_err()),
                "Only finalized or paid letters can be queued"
            );
        }
    }

    #[test]
    fn a_letter_is_queued_once() {
        assert_eq!(
            message(check_enqueue(LetterStatus::Paid, true).unwrap_err()),
            "Letter is already queued"
        );
    }

    #[test]
    fn racing_enqueue_maps_to_already_queued() {
        assert_eq!(
            message(map_queue_write_error(unique_violation())),
            "Letter is already queued"
        );
        assert!(matches!(
            map_queue_write_error(foreign_key_violation()),
            AppError::Database(_)
        ));
    }
}
