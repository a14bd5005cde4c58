//! HTTP request handlers for the call service.

pub mod health;
pub mod metrics;
pub mod sessions;
pub mod signaling;

pub use health::health_check;
pub use metrics::render_metrics;
