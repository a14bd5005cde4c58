//! Prometheus metrics endpoint.

use crate::errors::CallError;
use crate::routes::AppState;
use axum::extract::State;
use std::sync::Arc;
use tracing::instrument;

/// Render the Prometheus metrics snapshot.
///
/// Returns 404 when the recorder was not installed (e.g. another recorder
/// already claimed the global slot at startup).
#[instrument(skip_all, name = "call.metrics.render")]
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> Result<String, CallError> {
    match &state.metrics {
        Some(handle) => Ok(handle.render()),
        None => Err(CallError::NotFound("metrics recorder not installed".to_string())),
    }
}
