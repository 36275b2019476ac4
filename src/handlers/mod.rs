//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Extracts request data (JSON body, path, query, `AuthContext`)
//! 2. Delegates to a service in `crate::services`
//! 3. Returns a JSON response and status code
//!
//! Authorization beyond "is logged in" (ownership, administrator checks)
//! happens in the handler or the service it calls.

/// Bill catalog
pub mod bills;
/// Liveness and database check
pub mod health;
/// Letter lifecycle, drafting, payment and mailing
pub mod letter_requests;
/// Plain-text pages: root and Stripe redirect targets
pub mod pages;
pub mod politicians;
/// In-house print queue
pub mod queued_letters;
pub mod return_address;
/// Registration, login and profiles
pub mod users;
/// Stripe webhook receiver
pub mod webhooks;
