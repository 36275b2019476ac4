//! Politician data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{address::MailingAddress, bill::BillPolitician};

/// Represents a politician record from the database.
///
/// The office address is where mailed and printed letters are sent.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Politician {
    pub id: Uuid,
    pub name: String,

    /// e.g. "State Senator"
    pub title: String,
    pub email: Option<String>,
    pub office_address_line1: String,
    pub office_address_line2: Option<String>,
    pub office_city: String,
    pub office_state: String,
    pub office_zip: String,
    pub legislative_body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Politician {
    /// Recipient block for letters addressed to this politician.
    pub fn office_address(&self) -> MailingAddress {
        MailingAddress {
            name: self.name.clone(),
            line1: self.office_address_line1.clone(),
            line2: self
                .office_address_line2
                .clone()
                .filter(|line| !line.trim().is_empty()),
            city: self.office_city.clone(),
            state: self.office_state.clone(),
            zip: self.office_zip.clone(),
        }
    }
}

/// A bill linked to a politician, as sent and received by politician endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliticianBillLink {
    pub bill_id: Uuid,
    pub does_support: Option<bool>,
}

/// Request body for `POST /politicians`.
#[derive(Debug, Deserialize)]
pub struct CreatePoliticianRequest {
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub office_address_line1: String,
    pub office_address_line2: Option<String>,
    pub office_city: String,
    pub office_state: String,
    pub office_zip: String,
    pub legislative_body: String,
    pub bills: Option<Vec<PoliticianBillLink>>,
}

/// Request body for `PATCH /politicians/{id}`.
///
/// Absent fields are left unchanged; a present `bills` list replaces the
/// associations.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePoliticianRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub office_address_line1: Option<String>,
    pub office_address_line2: Option<String>,
    pub office_city: Option<String>,
    pub office_state: Option<String>,
    pub office_zip: Option<String>,
    pub legislative_body: Option<String>,
    pub bills: Option<Vec<PoliticianBillLink>>,
}

/// Response body for politician endpoints.
#[derive(Debug, Serialize)]
pub struct PoliticianResponse {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub email: Option<String>,
    pub office_address_line1: String,
    pub office_address_line2: Option<String>,
    pub office_city: String,
    pub office_state: String,
    pub office_zip: String,
    pub legislative_body: String,
    pub bills: Vec<PoliticianBillLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PoliticianResponse {
    pub fn new(politician: Politician, links: Vec<BillPolitician>) -> Self {
        Self {
            id: politician.id,
            name: politician.name,
            title: politician.title,
            email: politician.email,
            office_address_line1: politician.office_address_line1,
            office_address_line2: politician.office_address_line2,
            office_city: politician.office_city,
            office_state: politician.office_state,
            office_zip: politician.office_zip,
            legislative_body: politician.legislative_body,
            bills: links
                .into_iter()
                .map(|link| PoliticianBillLink {
                    bill_id: link.bill_id,
                    does_support: link.does_support,
                })
                .collect(),
            created_at: politician.created_at,
            updated_at: politician.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_politician() -> Politician {
        let now = Utc::now();
        Politician {
            id: Uuid::new_v4(),
            name: "Jane Senator".to_string(),
            title: "State Senator".to_string(),
            email: None,
            office_address_line1: "1100 Congress Ave".to_string(),
            office_address_line2: Some("".to_string()),
            office_city: "Austin".to_string(),
            office_state: "TX".to_string(),
            office_zip: "78701".to_string(),
            legislative_body: "Texas Senate".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn office_address_drops_blank_second_line() {
        let address = sample_politician().office_address();
        assert_eq!(address.name, "Jane Senator");
        assert_eq!(address.line2, None);
        assert_eq!(address.line2_or_empty(), "");
    }
}
