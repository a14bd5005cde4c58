//! Common vocabulary types shared across Frontdesk call components.

#![warn(clippy::pedantic)]

/// Module for session lifecycle and caller types
pub mod types;

/// Module for caller roles and the role/action capability table
pub mod roles;
