//! HTTP routes for the call service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::require_identity;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Prometheus handle, when the recorder installed successfully.
    pub metrics: Option<PrometheusHandle>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` and `/metrics` - unauthenticated operational endpoints
/// - `/signaling` and `/video-sessions` - call endpoints behind the
///   identity middleware
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    // Operational routes (no caller identity required)
    let operational_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::render_metrics));

    // Call endpoints require an asserted caller identity
    let call_routes = Router::new()
        .route(
            "/signaling",
            post(handlers::signaling::post_signal)
                .get(handlers::signaling::poll_signals)
                .delete(handlers::signaling::purge_signals),
        )
        .route(
            "/video-sessions",
            post(handlers::sessions::create_session)
                .get(handlers::sessions::list_sessions)
                .put(handlers::sessions::update_session),
        )
        .route("/video-sessions/status", get(handlers::sessions::site_status))
        .route(
            "/video-sessions/decline-others",
            post(handlers::sessions::decline_others),
        )
        .layer(middleware::from_fn(require_identity));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    operational_routes
        .merge(call_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
