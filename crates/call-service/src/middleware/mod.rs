//! Middleware for the call service.

pub mod identity;

pub use identity::{require_identity, Identity};
