//! Signaling retention sweep background task.
//!
//! The relay already sweeps opportunistically on every post; this task
//! backstops it so the channel stays bounded even while nobody is posting:
//!
//! 1. Deletes messages older than the retention window
//! 2. Deletes messages whose session has ended
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the
//! token is cancelled, the task completes its current iteration and exits
//! cleanly.

use crate::observability::metrics;
use crate::repositories::SignalingMessagesRepository;
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Start the retention sweep background task.
///
/// Runs in a loop at `interval_seconds`, exiting when the cancellation
/// token is triggered.
#[instrument(skip_all, name = "call.task.retention_sweep")]
pub async fn start_retention_sweep(
    pool: PgPool,
    interval_seconds: u64,
    retention_seconds: u64,
    cancel_token: CancellationToken,
) {
    info!(
        target: "call.task.retention_sweep",
        interval_seconds,
        retention_seconds,
        "Starting retention sweep task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&pool, retention_seconds).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "call.task.retention_sweep",
                    "Retention sweep task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "call.task.retention_sweep", "Retention sweep task stopped");
}

/// Run a single sweep iteration.
///
/// Separated from the main loop to allow direct testing.
pub(crate) async fn run_sweep(pool: &PgPool, retention_seconds: u64) {
    match SignalingMessagesRepository::sweep_expired(pool, retention_seconds).await {
        Ok(count) => {
            if count > 0 {
                metrics::record_signals_swept(count);
                info!(
                    target: "call.task.retention_sweep",
                    swept = count,
                    retention_seconds,
                    "Swept expired signaling messages"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                target: "call.task.retention_sweep",
                error = %e,
                "Failed to sweep expired signaling messages"
            );
        }
    }

    match SignalingMessagesRepository::purge_ended_sessions(pool).await {
        Ok(count) => {
            if count > 0 {
                metrics::record_signals_swept(count);
                info!(
                    target: "call.task.retention_sweep",
                    purged = count,
                    "Purged messages of ended sessions"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                target: "call.task.retention_sweep",
                error = %e,
                "Failed to purge messages of ended sessions"
            );
        }
    }
}
