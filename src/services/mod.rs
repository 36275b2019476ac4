//! Business logic and outbound integrations.
//!
//! Services own the SQL that enforces the letter lifecycle and the
//! ownership rules; handlers only extract requests and shape responses.
//! Vendor clients live behind traits (`PaymentGateway`, `MailCarrier`,
//! `LetterDrafter`, `EmailSender`, `PrintSpooler`).

/// Password hashing and bearer tokens
pub mod auth_service;
pub mod catalog_service;
/// Letter drafting with Ollama
pub mod drafting_service;
pub mod email_service;
pub mod http_client;
pub mod letter_format;
/// Letter request lifecycle
pub mod letter_service;
/// Lob mailing pipeline
pub mod mailing_service;
pub mod otp_service;
/// Stripe Checkout
pub mod payment_service;
pub mod printing_service;
pub mod queue_service;
pub mod user_service;
/// Stripe webhook verification
pub mod webhook_service;
