//! Admission control: availability, the single-active-call invariant, and
//! session reaping.
//!
//! There is no heartbeat and no keep-alive in this system; time-boxed
//! staleness is the only liveness signal. Every availability poll therefore
//! doubles as the garbage collector: stale sessions are retired first, and
//! availability is computed from what survives.

use crate::config::Config;
use crate::errors::CallError;
use crate::models::{SessionResponse, SiteStatusResponse};
use crate::observability::metrics;
use crate::repositories::CallSessionsRepository;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Admission controller invoked on every site availability poll.
pub struct AdmissionService;

impl AdmissionService {
    /// Run the reap cycle for a site and compute its availability snapshot.
    ///
    /// In order:
    /// 1. Reap zombie connected sessions older than the connected threshold.
    /// 2. Reap abandoned waiting sessions older than the waiting threshold.
    /// 3. `available` = no connected session remains for the site.
    /// 4. `waiting_calls` = waiting kiosk-originated sessions, excluding the
    ///    caller's own kiosk so it never counts its own pending request.
    ///
    /// # Errors
    ///
    /// Returns `CallError::Database` if any step fails.
    #[instrument(skip_all, fields(project_id = %project_id), name = "call.service.admission")]
    pub async fn poll_site(
        pool: &PgPool,
        config: &Config,
        project_id: Uuid,
        exclude_kiosk_id: Option<&str>,
    ) -> Result<SiteStatusResponse, CallError> {
        let reaped_connected = CallSessionsRepository::reap_stale_connected(
            pool,
            project_id,
            config.connected_reap_seconds,
        )
        .await?;

        if reaped_connected > 0 {
            metrics::record_sessions_reaped("connected", reaped_connected);
            tracing::warn!(
                target: "call.service.admission",
                project_id = %project_id,
                count = reaped_connected,
                threshold_seconds = config.connected_reap_seconds,
                "Reaped zombie connected sessions"
            );
        }

        let reaped_waiting = CallSessionsRepository::reap_stale_waiting(
            pool,
            project_id,
            config.waiting_reap_seconds,
        )
        .await?;

        if reaped_waiting > 0 {
            metrics::record_sessions_reaped("waiting", reaped_waiting);
            tracing::info!(
                target: "call.service.admission",
                project_id = %project_id,
                count = reaped_waiting,
                threshold_seconds = config.waiting_reap_seconds,
                "Reaped abandoned waiting sessions"
            );
        }

        let active_call = CallSessionsRepository::active_connected(pool, project_id).await?;

        let waiting_calls =
            CallSessionsRepository::count_waiting_kiosk_calls(pool, project_id, exclude_kiosk_id)
                .await?;

        Ok(SiteStatusResponse {
            available: active_call.is_none(),
            active_call: active_call.map(SessionResponse::from),
            waiting_calls,
        })
    }
}
