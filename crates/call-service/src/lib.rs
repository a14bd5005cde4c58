//! Call Service Library
//!
//! This library provides the core functionality for the Frontdesk call
//! service - the coordination point that lets a kiosk summon staff
//! assistance and lets staff call back, with no persistent connection
//! between the two sides:
//!
//! - Call session lifecycle (waiting -> connected -> ended)
//! - Durable, ordered signaling relay with a consumer cursor
//! - Admission control: single active call per project, reaping of
//!   abandoned and crashed sessions on every availability poll
//! - Decline broadcast converging competing waiting calls to one winner
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Caller identity extraction
//! - `models` - Data models and wire DTOs
//! - `observability` - Prometheus metrics
//! - `repositories` - Database access
//! - `routes` - Axum router setup
//! - `services` - Admission control
//! - `tasks` - Background retention sweep

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
