//! Call service models.
//!
//! Database rows and wire DTOs. Wire field names follow the external
//! contract: session and message bodies are snake_case, the signaling and
//! call-control verbs use the camelCase names the dashboard and kiosk
//! frontends already speak (`sessionId`, `lastId`, `excludeSender`,
//! `answeredSessionId`, `staffUserId`, `declinedCount`, `activeCall`,
//! `waitingCalls`).

use chrono::{DateTime, Utc};
use common::types::{CallerType, SessionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Call session database row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallSessionRow {
    /// Unique session identifier.
    pub id: Uuid,

    /// Site/tenant that owns the session.
    pub project_id: Uuid,

    /// Target device identifier.
    pub kiosk_id: String,

    /// Which side initiated ("kiosk" or "staff").
    pub caller_type: String,

    /// Lifecycle state ("waiting", "connected", "ended").
    pub status: String,

    /// Staff member who claimed the session, once connected.
    pub staff_user_id: Option<Uuid>,

    /// Opaque channel name shared with the media layer.
    pub room_name: String,

    /// Free-form notes.
    pub notes: Option<String>,

    /// Creation timestamp.
    pub started_at: DateTime<Utc>,

    /// End timestamp (None while waiting or connected).
    pub ended_at: Option<DateTime<Utc>>,
}

/// Session representation returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub kiosk_id: String,
    pub caller_type: String,
    pub status: String,
    pub staff_user_id: Option<Uuid>,
    pub room_name: String,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<CallSessionRow> for SessionResponse {
    fn from(row: CallSessionRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            kiosk_id: row.kiosk_id,
            caller_type: row.caller_type,
            status: row.status,
            staff_user_id: row.staff_user_id,
            room_name: row.room_name,
            notes: row.notes,
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

/// Envelope for a single session.
///
/// Returned by `POST /video-sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub session: SessionResponse,
}

/// Envelope for a session list.
///
/// Returned by `GET /video-sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}

/// Request to create a call session.
///
/// Sent by whichever side initiates: a kiosk summoning staff or a staff
/// member calling a kiosk back.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    /// Target device identifier.
    pub kiosk_id: String,

    /// Site/tenant id.
    pub project_id: Uuid,

    /// Opaque channel name shared with the media layer.
    pub room_name: String,

    /// Which side is initiating.
    pub caller_type: CallerType,

    /// Optional initial status; only "waiting" is accepted.
    #[serde(default)]
    pub status: Option<String>,

    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateSessionRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.kiosk_id.trim().is_empty() {
            return Err("kiosk_id is required");
        }

        if self.room_name.trim().is_empty() {
            return Err("room_name is required");
        }

        if let Some(status) = &self.status {
            if SessionStatus::parse(status) != Some(SessionStatus::Waiting) {
                return Err("sessions are always created in status waiting");
            }
        }

        Ok(())
    }
}

/// Request to update a call session.
///
/// Sent by the answering side (`status=connected`), or by either side to
/// end a call (`status=ended`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSessionRequest {
    /// Session to update.
    pub id: Uuid,

    /// New lifecycle status.
    #[serde(default)]
    pub status: Option<String>,

    /// Staff member claiming the session (answer only).
    #[serde(default, rename = "staffUserId")]
    pub staff_user_id: Option<Uuid>,

    /// Override for the session start timestamp.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// End timestamp; defaults to now when ending without one.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateSessionRequest {
    /// Check if the request carries any change at all.
    pub fn has_changes(&self) -> bool {
        self.status.is_some()
            || self.staff_user_id.is_some()
            || self.started_at.is_some()
            || self.ended_at.is_some()
            || self.notes.is_some()
    }
}

/// Filter for `GET /video-sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilterQuery {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub caller_type: Option<String>,

    #[serde(default)]
    pub project_id: Option<Uuid>,

    #[serde(default)]
    pub kiosk_id: Option<String>,
}

/// Query for `GET /video-sessions/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteStatusQuery {
    /// Site/tenant to poll.
    pub project_id: Uuid,

    /// Kiosk id to leave out of the waiting-call count, so a kiosk never
    /// counts its own pending request as someone else waiting.
    #[serde(default)]
    pub exclude_kiosk_id: Option<String>,
}

/// Availability snapshot for a site.
///
/// Returned by `GET /video-sessions/status` after the reap cycle ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatusResponse {
    /// No connected session remains for the site.
    pub available: bool,

    /// The connected session, if one survives reaping.
    pub active_call: Option<SessionResponse>,

    /// Waiting kiosk-originated sessions, minus the excluded kiosk.
    pub waiting_calls: i64,
}

/// Request for `POST /video-sessions/decline-others`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeclineOthersRequest {
    /// The session that was just answered and must stay in play.
    pub answered_session_id: Uuid,

    /// Site whose other waiting calls are superseded.
    pub project_id: Uuid,
}

/// Response for `POST /video-sessions/decline-others`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineOthersResponse {
    pub success: bool,
    pub declined_count: u64,
}

/// Request for `POST /signaling`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostSignalRequest {
    pub session_id: Uuid,

    /// Free-form endpoint identifier ("kiosk", "staff").
    pub sender: String,

    /// Opaque negotiation/control payload; never interpreted here.
    pub payload: serde_json::Value,
}

impl PostSignalRequest {
    /// Validate the request.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.sender.trim().is_empty() {
            return Err("sender is required");
        }

        if self.payload.is_null() {
            return Err("payload is required");
        }

        Ok(())
    }
}

/// Query for `GET /signaling`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPollQuery {
    pub session_id: Uuid,

    /// Consumer cursor: only messages with a greater id are returned.
    /// Restarting from 0 replays the session's history by design.
    #[serde(default)]
    pub last_id: i64,

    /// Sender whose messages are filtered out (no echo to the poster).
    #[serde(default)]
    pub exclude_sender: Option<String>,
}

/// Request for `DELETE /signaling`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PurgeSignalsRequest {
    pub session_id: Uuid,
}

/// Signaling message as returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessageResponse {
    pub id: i64,
    pub session_id: Uuid,
    pub sender: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Envelope for a signaling poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalListResponse {
    pub messages: Vec<SignalMessageResponse>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}
