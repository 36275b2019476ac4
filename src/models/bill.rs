//! Bill data models and API request/response types.
//!
//! Bills are linked to politicians through the `bill_politicians` table,
//! which records whether each politician supports the bill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a bill record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,

    /// Official number, e.g. "HB 1234"
    pub bill_number: String,

    /// Chamber or body the bill belongs to, e.g. "Texas House"
    pub legislative_body: String,

    /// Free-form legislative status, e.g. "In committee"
    pub status: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the `bill_politicians` association table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillPolitician {
    pub bill_id: Uuid,
    pub politician_id: Uuid,
    pub does_support: Option<bool>,
}

/// A politician linked to a bill, as sent and received by bill endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPoliticianLink {
    pub politician_id: Uuid,
    pub does_support: Option<bool>,
}

/// Request body for `POST /bills`.
///
/// # JSON Example
///
/// ```json
/// {
///   "title": "Clean Water Act Amendment",
///   "bill_number": "HB 1234",
///   "legislative_body": "Texas House",
///   "politicians": [
///     { "politician_id": "550e8400-...", "does_support": true }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub title: String,
    pub description: Option<String>,
    pub bill_number: String,
    pub legislative_body: String,
    pub status: Option<String>,
    pub politicians: Option<Vec<BillPoliticianLink>>,
}

/// Request body for `PATCH /bills/{id}`.
///
/// Absent fields are left unchanged. When `politicians` is present the
/// whole association list is replaced (an empty list clears it).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBillRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub bill_number: Option<String>,
    pub legislative_body: Option<String>,
    pub status: Option<String>,
    pub politicians: Option<Vec<BillPoliticianLink>>,
}

/// Response body for bill endpoints.
#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub bill_number: String,
    pub legislative_body: String,
    pub status: Option<String>,
    pub politicians: Vec<BillPoliticianLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillResponse {
    pub fn new(bill: Bill, links: Vec<BillPolitician>) -> Self {
        Self {
            id: bill.id,
            title: bill.title,
            description: bill.description,
            bill_number: bill.bill_number,
            legislative_body: bill.legislative_body,
            status: bill.status,
            politicians: links
                .into_iter()
                .map(|link| BillPoliticianLink {
                    politician_id: link.politician_id,
                    does_support: link.does_support,
                })
                .collect(),
            created_at: bill.created_at,
            updated_at: bill.updated_at,
        }
    }
}
