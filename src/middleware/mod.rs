//! HTTP middleware components.
//!
//! Middleware run before route handlers. Here they authenticate requests
//! and short-circuit the ones without a valid bearer token.

/// Bearer token authentication middleware
pub mod auth;
