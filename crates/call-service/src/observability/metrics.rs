//! Metrics definitions for the call service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix for this service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: bounded by code (create_session, post_signal, ...)
//! - `status`: 2 values (success, error)
//! - `kind`: 2 values (waiting, connected)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle for
/// serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the Prometheus recorder fails to install (e.g.
/// already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("call_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a database query.
///
/// Metrics: `call_db_queries_total`, `call_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    counter!(
        "call_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    histogram!(
        "call_db_query_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status.to_string(),
    )
    .record(duration.as_secs_f64());
}

// ============================================================================
// Call Coordination Metrics
// ============================================================================

/// Record sessions reaped by the admission controller.
///
/// Metric: `call_sessions_reaped_total`
/// Labels: `kind` ("waiting" or "connected")
pub fn record_sessions_reaped(kind: &str, count: u64) {
    counter!(
        "call_sessions_reaped_total",
        "kind" => kind.to_string(),
    )
    .increment(count);
}

/// Record sessions ended by a decline broadcast.
///
/// Metric: `call_sessions_declined_total`
pub fn record_sessions_declined(count: u64) {
    counter!("call_sessions_declined_total").increment(count);
}

/// Record a signaling message accepted by the relay.
///
/// Metric: `call_signals_posted_total`
pub fn record_signal_posted() {
    counter!("call_signals_posted_total").increment(1);
}

/// Record signaling messages delivered to a poller.
///
/// Metric: `call_signals_delivered_total`
pub fn record_signals_polled(count: usize) {
    counter!("call_signals_delivered_total").increment(count as u64);
}

/// Record signaling messages removed by the retention sweep.
///
/// Metric: `call_signals_swept_total`
pub fn record_signals_swept(count: u64) {
    counter!("call_signals_swept_total").increment(count);
}
