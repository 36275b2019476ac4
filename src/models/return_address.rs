//! Organization-wide return address used when a letter is not signed with
//! the owner's own address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::MailingAddress;

/// Represents the single row of `global_return_addresses`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct GlobalReturnAddress {
    pub id: Uuid,
    pub organization_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalReturnAddress {
    pub fn mailing_address(&self) -> MailingAddress {
        MailingAddress {
            name: self.organization_name.clone(),
            line1: self.address_line1.clone(),
            line2: self.address_line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zipcode.clone(),
        }
    }
}

/// Request body for `POST /global-return-address`.
#[derive(Debug, Deserialize)]
pub struct CreateReturnAddressRequest {
    pub organization_name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

/// Request body for `PATCH /global-return-address`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateReturnAddressRequest {
    pub organization_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
}
