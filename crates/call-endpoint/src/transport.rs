//! Transport contract against the call service.
//!
//! The relay and session store are a plain request/response contract; the
//! HTTP client in [`crate::api`] is the production implementation and tests
//! drive the state machine against an in-memory one. Nothing in the state
//! machine or poller knows which is behind the trait.

use crate::errors::EndpointError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{CallerType, SessionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A call session as reported by the call service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
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

impl SessionInfo {
    /// Parsed lifecycle status; `None` for values this client predates.
    pub fn session_status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Parsed caller type.
    pub fn caller(&self) -> Option<CallerType> {
        CallerType::parse(&self.caller_type)
    }
}

/// Availability snapshot for a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    pub available: bool,
    pub active_call: Option<SessionInfo>,
    pub waiting_calls: i64,
}

/// A relayed signaling message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    pub id: i64,
    pub session_id: Uuid,
    pub sender: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub project_id: Uuid,
    pub kiosk_id: String,
    pub room_name: String,
    pub caller_type: CallerType,
    pub notes: Option<String>,
}

/// Filter for session listings.
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub status: Option<SessionStatus>,
    pub caller_type: Option<CallerType>,
    pub project_id: Option<Uuid>,
    pub kiosk_id: Option<String>,
}

/// Transport contract for endpoint/service communication.
///
/// Every method is a single stateless round trip. Implementations must not
/// retry internally: retry cadence belongs to the polling loop.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Open a session in status `waiting`.
    async fn create_session(&self, request: &CreateSession)
        -> Result<SessionInfo, EndpointError>;

    /// List sessions matching the query, most recent first.
    async fn find_sessions(&self, query: &SessionQuery)
        -> Result<Vec<SessionInfo>, EndpointError>;

    /// Claim a waiting session (`status=connected`).
    async fn answer_session(
        &self,
        session_id: Uuid,
        staff_user_id: Option<Uuid>,
    ) -> Result<(), EndpointError>;

    /// End a session (`status=ended`).
    async fn end_session(&self, session_id: Uuid) -> Result<(), EndpointError>;

    /// Site availability poll. Triggers the server-side reap cycle.
    async fn site_status(
        &self,
        project_id: Uuid,
        exclude_kiosk_id: Option<&str>,
    ) -> Result<SiteStatus, EndpointError>;

    /// Broadcast-end every other waiting kiosk call for the site.
    async fn decline_others(
        &self,
        answered_session_id: Uuid,
        project_id: Uuid,
    ) -> Result<u64, EndpointError>;

    /// Append a signaling message to a session's channel.
    async fn post_signal(
        &self,
        session_id: Uuid,
        sender: &str,
        payload: &serde_json::Value,
    ) -> Result<(), EndpointError>;

    /// Poll messages past the cursor, excluding the given sender.
    async fn poll_signals(
        &self,
        session_id: Uuid,
        last_id: i64,
        exclude_sender: &str,
    ) -> Result<Vec<SignalMessage>, EndpointError>;

    /// Drop all messages for a session at teardown.
    async fn purge_signals(&self, session_id: Uuid) -> Result<(), EndpointError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_info_deserializes_service_shape() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "project_id": "00000000-0000-0000-0000-000000000002",
            "kiosk_id": "lobby-01",
            "caller_type": "kiosk",
            "status": "waiting",
            "staff_user_id": null,
            "room_name": "room-abc",
            "notes": null,
            "started_at": "2025-04-01T12:00:00Z",
            "ended_at": null
        }"#;

        let session: SessionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_status(), Some(SessionStatus::Waiting));
        assert_eq!(session.caller(), Some(CallerType::Kiosk));
    }

    #[test]
    fn test_site_status_deserializes_camel_case() {
        let json = r#"{"available": true, "activeCall": null, "waitingCalls": 3}"#;
        let status: SiteStatus = serde_json::from_str(json).unwrap();

        assert!(status.available);
        assert!(status.active_call.is_none());
        assert_eq!(status.waiting_calls, 3);
    }

    #[test]
    fn test_unknown_status_parses_to_none() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "project_id": "00000000-0000-0000-0000-000000000002",
            "kiosk_id": "lobby-01",
            "caller_type": "kiosk",
            "status": "on_hold",
            "staff_user_id": null,
            "room_name": "room-abc",
            "notes": null,
            "started_at": "2025-04-01T12:00:00Z",
            "ended_at": null
        }"#;

        let session: SessionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_status(), None);
    }
}
