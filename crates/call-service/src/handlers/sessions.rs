//! Call session handlers.
//!
//! Implements the session lifecycle endpoints:
//!
//! - `POST /video-sessions` - Create a waiting session
//! - `GET  /video-sessions` - List sessions by filter
//! - `PUT  /video-sessions` - Answer or end a session
//! - `GET  /video-sessions/status` - Site availability poll (runs the reaper)
//! - `POST /video-sessions/decline-others` - Broadcast-end competing calls
//!
//! Answering a call is three independent round trips from the client's
//! perspective (connect here, then decline-others, then an answered signal);
//! none of them is transactional with the others and a failure in between
//! is resolved by later polls, not by compensation.

use crate::errors::CallError;
use crate::middleware::Identity;
use crate::models::{
    CreateSessionRequest, DeclineOthersRequest, DeclineOthersResponse, SessionEnvelope,
    SessionFilterQuery, SessionListResponse, SessionResponse, SiteStatusQuery,
    SiteStatusResponse, SuccessResponse, UpdateSessionRequest,
};
use crate::observability::metrics;
use crate::repositories::call_sessions::SessionFilter;
use crate::repositories::CallSessionsRepository;
use crate::routes::AppState;
use crate::services::AdmissionService;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use common::roles::{CallAction, Role};
use common::types::{CallerType, SessionStatus};
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ============================================================================
// Handler: POST /video-sessions
// ============================================================================

/// Handler for `POST /video-sessions`.
///
/// Creates a call session in status `waiting`. A kiosk may only open a
/// session for its own device; a staff identity opens staff-originated
/// callback sessions.
///
/// # Response
///
/// - 200 OK: `{session}`
/// - 400 Bad Request: missing kiosk id / room name, or a non-waiting status
/// - 403 Forbidden: kiosk creating for another device, or caller type not
///   matching the caller's side
#[instrument(skip(state, identity, request), fields(project_id = %request.project_id))]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionEnvelope>, CallError> {
    request
        .validate()
        .map_err(|e| CallError::BadRequest(e.to_string()))?;

    if !identity.role.allows(CallAction::Initiate) {
        return Err(CallError::Forbidden(
            "caller may not initiate calls".to_string(),
        ));
    }

    // Each side only opens sessions for itself.
    match identity.role {
        Role::Kiosk => {
            if request.caller_type != CallerType::Kiosk {
                return Err(CallError::Forbidden(
                    "kiosks initiate kiosk-originated calls only".to_string(),
                ));
            }
            if !identity.owns_kiosk(&request.kiosk_id) {
                warn!(
                    target: "call.handlers.sessions",
                    kiosk_id = %request.kiosk_id,
                    "Kiosk attempted to open a session for another device"
                );
                return Err(CallError::Forbidden(
                    "kiosks may only open sessions for their own device".to_string(),
                ));
            }
        }
        _ => {
            if request.caller_type != CallerType::Staff {
                return Err(CallError::Forbidden(
                    "staff initiate staff-originated calls only".to_string(),
                ));
            }
        }
    }

    let row = CallSessionsRepository::create(
        &state.pool,
        request.project_id,
        request.kiosk_id.trim(),
        request.caller_type,
        request.room_name.trim(),
        request.notes.as_deref(),
    )
    .await?;

    Ok(Json(SessionEnvelope {
        session: SessionResponse::from(row),
    }))
}

// ============================================================================
// Handler: GET /video-sessions
// ============================================================================

/// Handler for `GET /video-sessions`.
///
/// Lists sessions matching the filter, most recent first. An unknown
/// status or caller type in the filter matches nothing rather than
/// erroring, so dashboards can probe freely.
#[instrument(skip_all)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionFilterQuery>,
) -> Result<Json<SessionListResponse>, CallError> {
    let filter = SessionFilter {
        status: query.status.as_deref().and_then(SessionStatus::parse),
        caller_type: query.caller_type.as_deref().and_then(CallerType::parse),
        project_id: query.project_id,
        kiosk_id: query.kiosk_id,
    };

    // A filter value that parses to nothing can never match.
    if (query.status.is_some() && filter.status.is_none())
        || (query.caller_type.is_some() && filter.caller_type.is_none())
    {
        return Ok(Json(SessionListResponse { sessions: vec![] }));
    }

    let rows = CallSessionsRepository::find(&state.pool, &filter).await?;

    Ok(Json(SessionListResponse {
        sessions: rows.into_iter().map(SessionResponse::from).collect(),
    }))
}

// ============================================================================
// Handler: PUT /video-sessions
// ============================================================================

/// Handler for `PUT /video-sessions`.
///
/// Applies a lifecycle transition and/or detail updates to a session:
///
/// - `status=connected` claims the session (staff roles only)
/// - `status=ended` ends it (a kiosk only for its own device)
/// - `started_at` / `notes` update the row in place
///
/// # Response
///
/// - 200 OK: `{success:true}`
/// - 400 Bad Request: unknown status value, or no changes at all
/// - 403 Forbidden: role not allowed for the transition
/// - 404 Not Found: session absent
/// - 409 Conflict: claiming a session that is no longer waiting
#[instrument(skip(state, identity, request), fields(session_id = %request.id))]
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<SuccessResponse>, CallError> {
    if !request.has_changes() {
        return Err(CallError::BadRequest("no changes requested".to_string()));
    }

    let status = match request.status.as_deref() {
        Some(value) => Some(SessionStatus::parse(value).ok_or_else(|| {
            CallError::BadRequest(format!("unknown status '{value}'"))
        })?),
        None => None,
    };

    let session = CallSessionsRepository::find_by_id(&state.pool, request.id)
        .await?
        .ok_or_else(|| CallError::NotFound("session not found".to_string()))?;

    match status {
        Some(SessionStatus::Connected) => {
            if !identity.role.allows(CallAction::Answer) {
                warn!(
                    target: "call.handlers.sessions",
                    session_id = %request.id,
                    role = %identity.role.as_str(),
                    "Caller not allowed to answer"
                );
                return Err(CallError::Forbidden(
                    "caller may not answer calls".to_string(),
                ));
            }

            let staff_user_id = request.staff_user_id.or(identity.staff_user_id);
            let claimed =
                CallSessionsRepository::set_connected(&state.pool, request.id, staff_user_id)
                    .await?;

            if !claimed {
                return Err(CallError::Conflict(
                    "session is no longer waiting".to_string(),
                ));
            }

            info!(
                target: "call.handlers.sessions",
                session_id = %request.id,
                staff_user_id = ?staff_user_id,
                "Session answered"
            );
        }
        Some(SessionStatus::Ended) => {
            if !identity.role.allows(CallAction::End) {
                return Err(CallError::Forbidden(
                    "caller may not end calls".to_string(),
                ));
            }

            if identity.role == Role::Kiosk && !identity.owns_kiosk(&session.kiosk_id) {
                return Err(CallError::Forbidden(
                    "kiosks may only end their own device's sessions".to_string(),
                ));
            }

            let ended_at = request.ended_at.unwrap_or_else(Utc::now);
            CallSessionsRepository::set_ended(&state.pool, request.id, ended_at).await?;

            info!(
                target: "call.handlers.sessions",
                session_id = %request.id,
                "Session ended"
            );
        }
        Some(SessionStatus::Waiting) => {
            return Err(CallError::BadRequest(
                "sessions cannot be moved back to waiting".to_string(),
            ));
        }
        None => {}
    }

    if request.started_at.is_some() || request.notes.is_some() {
        CallSessionsRepository::update_details(
            &state.pool,
            request.id,
            request.started_at,
            request.notes.as_deref(),
        )
        .await?;
    }

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Handler: GET /video-sessions/status
// ============================================================================

/// Handler for `GET /video-sessions/status`.
///
/// The site availability poll. Runs the reap cycle as a side effect and
/// reports `{available, activeCall, waitingCalls}` for what survives.
#[instrument(skip(state), fields(project_id = %query.project_id))]
pub async fn site_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiteStatusQuery>,
) -> Result<Json<SiteStatusResponse>, CallError> {
    let status = AdmissionService::poll_site(
        &state.pool,
        &state.config,
        query.project_id,
        query.exclude_kiosk_id.as_deref(),
    )
    .await?;

    Ok(Json(status))
}

// ============================================================================
// Handler: POST /video-sessions/decline-others
// ============================================================================

/// Handler for `POST /video-sessions/decline-others`.
///
/// Ends every other waiting kiosk-originated session for the site, so
/// that after an answer only the answered call remains in play. Competing
/// kiosks observe the disappearance on their next poll.
///
/// # Response
///
/// - 200 OK: `{success, declinedCount}`
/// - 403 Forbidden: caller may not decline
/// - 404 Not Found: answered session absent
#[instrument(skip(state, identity), fields(answered_session_id = %request.answered_session_id))]
pub async fn decline_others(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<DeclineOthersRequest>,
) -> Result<Json<DeclineOthersResponse>, CallError> {
    if !identity.role.allows(CallAction::Decline) {
        return Err(CallError::Forbidden(
            "caller may not decline calls".to_string(),
        ));
    }

    CallSessionsRepository::find_by_id(&state.pool, request.answered_session_id)
        .await?
        .ok_or_else(|| CallError::NotFound("answered session not found".to_string()))?;

    let declined = CallSessionsRepository::decline_others(
        &state.pool,
        request.answered_session_id,
        request.project_id,
    )
    .await?;

    if declined > 0 {
        metrics::record_sessions_declined(declined);
    }

    Ok(Json(DeclineOthersResponse {
        success: true,
        declined_count: declined,
    }))
}
