//! Observability for the call service.

pub mod metrics;
