//! Data models representing database entities and API bodies.
//!
//! Status-like columns are stored as TEXT in Postgres and mapped to enums
//! declared with [`text_enum!`]. Row structs read them through
//! `#[sqlx(try_from = "String")]`, and queries bind `status.as_str()`.

use serde::Serialize;

/// A TEXT column held a value that none of the enum variants spell.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum whose variants round-trip through fixed lowercase strings
/// in JSON, in SQL, and in `Display`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Bearer token lookups
pub mod access_token;
/// Postal addresses used on letters
pub mod address;
pub mod bill;
pub mod letter_request;
pub mod mailing_transaction;
pub mod otp_code;
pub mod politician;
pub mod queued_letter;
pub mod return_address;
pub mod user;
/// Stripe webhook payloads
pub mod webhook;

/// Plain `{"message": "..."}` body used by action endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::letter_request::LetterStatus;
    use super::user::UserRole;

    #[test]
    fn text_enums_round_trip_through_strings() {
        assert_eq!("paid".parse::<LetterStatus>().unwrap(), LetterStatus::Paid);
        assert_eq!(LetterStatus::Finalized.to_string(), "finalized");
        assert_eq!(
            UserRole::try_from("administrator".to_string()).unwrap(),
            UserRole::Administrator
        );
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "archived".parse::<LetterStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown LetterStatus value: archived");
    }

    #[test]
    fn serde_uses_the_same_spelling() {
        let json = serde_json::to_string(&LetterStatus::Mailed).unwrap();
        assert_eq!(json, "\"mailed\"");
        let parsed: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, UserRole::User);
    }
}
