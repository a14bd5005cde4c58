//! Health check handler.

use crate::errors::CallError;
use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Pings the database to verify connectivity and returns the service status.
/// An unhealthy database still yields a 200 response so orchestration can
/// read the body.
#[instrument(skip_all, name = "call.health.check")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, CallError> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let response = if db_healthy {
        HealthResponse {
            status: "healthy".to_string(),
            database: Some("healthy".to_string()),
        }
    } else {
        HealthResponse {
            status: "unhealthy".to_string(),
            database: Some("unhealthy".to_string()),
        }
    };

    Ok(Json(response))
}
