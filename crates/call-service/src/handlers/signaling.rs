//! Signaling relay handlers.
//!
//! Implements the message relay endpoints:
//!
//! - `POST   /signaling` - Append a message to a session's channel
//! - `GET    /signaling` - Cursor-based poll with sender exclusion
//! - `DELETE /signaling` - Purge a session's channel at teardown
//!
//! Payloads are opaque: offer/answer/candidate/call-answered/call-ended
//! all travel through here without being interpreted.

use crate::errors::CallError;
use crate::middleware::Identity;
use crate::models::{
    PostSignalRequest, PurgeSignalsRequest, SignalListResponse, SignalPollQuery, SuccessResponse,
};
use crate::repositories::{CallSessionsRepository, SignalingMessagesRepository};
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use common::roles::{CallAction, Role};
use std::sync::Arc;
use tracing::{instrument, warn};

// ============================================================================
// Handler: POST /signaling
// ============================================================================

/// Handler for `POST /signaling`.
///
/// Appends a message to the session's channel, then opportunistically
/// sweeps expired messages across all sessions as a cheap global cleanup.
/// A sweep failure never fails the post.
///
/// # Response
///
/// - 200 OK: `{success:true}`
/// - 400 Bad Request: empty sender or null payload
/// - 403 Forbidden: kiosk posting on another device's session
/// - 404 Not Found: session absent
#[instrument(skip(state, identity, request), fields(session_id = %request.session_id))]
pub async fn post_signal(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<PostSignalRequest>,
) -> Result<Json<SuccessResponse>, CallError> {
    request
        .validate()
        .map_err(|e| CallError::BadRequest(e.to_string()))?;

    if !identity.role.allows(CallAction::Signal) {
        return Err(CallError::Forbidden(
            "caller may not post signaling messages".to_string(),
        ));
    }

    let session = CallSessionsRepository::find_by_id(&state.pool, request.session_id)
        .await?
        .ok_or_else(|| CallError::NotFound("session not found".to_string()))?;

    if identity.role == Role::Kiosk && !identity.owns_kiosk(&session.kiosk_id) {
        warn!(
            target: "call.handlers.signaling",
            session_id = %request.session_id,
            "Kiosk attempted to signal on another device's session"
        );
        return Err(CallError::Forbidden(
            "kiosks may only signal on their own device's sessions".to_string(),
        ));
    }

    SignalingMessagesRepository::post(
        &state.pool,
        request.session_id,
        request.sender.trim(),
        &request.payload,
    )
    .await?;

    // Fire-and-forget cleanup: failure is logged, the post already landed.
    if let Err(e) =
        SignalingMessagesRepository::sweep_expired(&state.pool, state.config.signal_retention_seconds)
            .await
    {
        warn!(
            target: "call.handlers.signaling",
            error = %e,
            "Opportunistic retention sweep failed"
        );
    }

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Handler: GET /signaling
// ============================================================================

/// Handler for `GET /signaling`.
///
/// Returns messages with `id > lastId` and `sender != excludeSender`,
/// ascending by id, capped at the configured batch size. Polling a
/// session with no messages (or one already purged) yields an empty
/// list, not an error: the poller's next status tick is the place where
/// a vanished session is noticed.
#[instrument(skip(state), fields(session_id = %query.session_id, last_id = query.last_id))]
pub async fn poll_signals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignalPollQuery>,
) -> Result<Json<SignalListResponse>, CallError> {
    let messages = SignalingMessagesRepository::poll(
        &state.pool,
        query.session_id,
        query.last_id,
        query.exclude_sender.as_deref(),
        state.config.signal_batch_size,
    )
    .await?;

    Ok(Json(SignalListResponse { messages }))
}

// ============================================================================
// Handler: DELETE /signaling
// ============================================================================

/// Handler for `DELETE /signaling`.
///
/// Hard-deletes all messages for a session. Idempotent: purging a session
/// with no messages (or one whose row is already gone) succeeds.
#[instrument(skip(state, identity), fields(session_id = %request.session_id))]
pub async fn purge_signals(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<PurgeSignalsRequest>,
) -> Result<Json<SuccessResponse>, CallError> {
    if !identity.role.allows(CallAction::Signal) {
        return Err(CallError::Forbidden(
            "caller may not purge signaling messages".to_string(),
        ));
    }

    // Ownership only matters while the session row still exists.
    if identity.role == Role::Kiosk {
        if let Some(session) =
            CallSessionsRepository::find_by_id(&state.pool, request.session_id).await?
        {
            if !identity.owns_kiosk(&session.kiosk_id) {
                return Err(CallError::Forbidden(
                    "kiosks may only purge their own device's sessions".to_string(),
                ));
            }
        }
    }

    SignalingMessagesRepository::purge(&state.pool, request.session_id).await?;

    Ok(Json(SuccessResponse { success: true }))
}
