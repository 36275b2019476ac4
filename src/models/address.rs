//! Postal address shared by the letter renderer and the mail carrier.

use serde::Serialize;

/// A named postal address as printed on a letter.
///
/// Politicians provide the recipient address; the sender is either the
/// letter owner's profile or the organization's global return address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl MailingAddress {
    /// Second address line, or an empty string when there is none.
    pub fn line2_or_empty(&self) -> &str {
        self.line2.as_deref().unwrap_or("")
    }
}
