//! HTTP implementation of the call service transport.
//!
//! One thin reqwest client per endpoint process. The upstream auth layer
//! normally sits in front of the call service; this client asserts the
//! identity headers that layer would assert, so it can also be pointed
//! directly at the service in development and tests.
//!
//! No method retries internally: retry cadence belongs to the polling
//! loop, and a failed request simply surfaces at the next tick.

use crate::errors::EndpointError;
use crate::transport::{
    CallTransport, CreateSession, SessionInfo, SessionQuery, SignalMessage, SiteStatus,
};
use async_trait::async_trait;
use common::roles::Role;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Default timeout for call service requests in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Identity this endpoint asserts on every request.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Role of the caller.
    pub role: Role,

    /// Staff user id (staff roles).
    pub staff_user_id: Option<Uuid>,

    /// Device id (kiosk role).
    pub kiosk_id: Option<String>,
}

impl ClientIdentity {
    /// Identity for a staff endpoint.
    #[must_use]
    pub fn staff(role: Role, staff_user_id: Uuid) -> Self {
        Self {
            role,
            staff_user_id: Some(staff_user_id),
            kiosk_id: None,
        }
    }

    /// Identity for a kiosk endpoint.
    #[must_use]
    pub fn kiosk(kiosk_id: impl Into<String>) -> Self {
        Self {
            role: Role::Kiosk,
            staff_user_id: None,
            kiosk_id: Some(kiosk_id.into()),
        }
    }
}

/// HTTP client for the call service.
#[derive(Clone)]
pub struct HttpCallTransport {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL for the call service (e.g. "http://localhost:8080").
    base_url: String,

    /// Identity asserted on every request.
    identity: ClientIdentity,
}

impl HttpCallTransport {
    /// Create a new call service client.
    ///
    /// # Errors
    ///
    /// Returns `EndpointError::Transport` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: String, identity: ClientIdentity) -> Result<Self, EndpointError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                warn!(target: "endpoint.api", error = %e, "Failed to build HTTP client");
                EndpointError::Transport(e.to_string())
            })?;

        Ok(Self {
            client,
            base_url,
            identity,
        })
    }

    /// Start a request with the identity headers applied.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method, url)
            .header("x-caller-role", self.identity.role.as_str());

        if let Some(staff_user_id) = self.identity.staff_user_id {
            builder = builder.header("x-caller-id", staff_user_id.to_string());
        }
        if let Some(kiosk_id) = &self.identity.kiosk_id {
            builder = builder.header("x-kiosk-id", kiosk_id.as_str());
        }

        builder
    }

    /// Map a response to a decoded body or an API error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EndpointError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| EndpointError::Decode(e.to_string()));
        }

        // Prefer the service's error message when the body is well-formed.
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };

        Err(EndpointError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CallTransport for HttpCallTransport {
    #[instrument(skip_all, fields(kiosk_id = %request.kiosk_id))]
    async fn create_session(
        &self,
        request: &CreateSession,
    ) -> Result<SessionInfo, EndpointError> {
        let body = CreateSessionBody {
            kiosk_id: &request.kiosk_id,
            project_id: request.project_id,
            room_name: &request.room_name,
            caller_type: request.caller_type.as_str(),
            notes: request.notes.as_deref(),
        };

        let response = self
            .request(reqwest::Method::POST, "/video-sessions")
            .json(&body)
            .send()
            .await?;

        let envelope: SessionEnvelope = Self::handle_response(response).await?;
        Ok(envelope.session)
    }

    #[instrument(skip_all)]
    async fn find_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<SessionInfo>, EndpointError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(status) = query.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(caller_type) = query.caller_type {
            params.push(("caller_type", caller_type.as_str().to_string()));
        }
        if let Some(project_id) = query.project_id {
            params.push(("project_id", project_id.to_string()));
        }
        if let Some(kiosk_id) = &query.kiosk_id {
            params.push(("kiosk_id", kiosk_id.clone()));
        }

        let response = self
            .request(reqwest::Method::GET, "/video-sessions")
            .query(&params)
            .send()
            .await?;

        let envelope: SessionListEnvelope = Self::handle_response(response).await?;
        Ok(envelope.sessions)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn answer_session(
        &self,
        session_id: Uuid,
        staff_user_id: Option<Uuid>,
    ) -> Result<(), EndpointError> {
        let body = UpdateSessionBody {
            id: session_id,
            status: Some("connected"),
            staff_user_id,
            ended_at: None,
        };

        let response = self
            .request(reqwest::Method::PUT, "/video-sessions")
            .json(&body)
            .send()
            .await?;

        let _: SuccessEnvelope = Self::handle_response(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn end_session(&self, session_id: Uuid) -> Result<(), EndpointError> {
        let body = UpdateSessionBody {
            id: session_id,
            status: Some("ended"),
            staff_user_id: None,
            ended_at: Some(chrono::Utc::now()),
        };

        let response = self
            .request(reqwest::Method::PUT, "/video-sessions")
            .json(&body)
            .send()
            .await?;

        let _: SuccessEnvelope = Self::handle_response(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(project_id = %project_id))]
    async fn site_status(
        &self,
        project_id: Uuid,
        exclude_kiosk_id: Option<&str>,
    ) -> Result<SiteStatus, EndpointError> {
        let mut params = vec![("project_id", project_id.to_string())];
        if let Some(kiosk_id) = exclude_kiosk_id {
            params.push(("exclude_kiosk_id", kiosk_id.to_string()));
        }

        let response = self
            .request(reqwest::Method::GET, "/video-sessions/status")
            .query(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    #[instrument(skip_all, fields(answered_session_id = %answered_session_id))]
    async fn decline_others(
        &self,
        answered_session_id: Uuid,
        project_id: Uuid,
    ) -> Result<u64, EndpointError> {
        let body = DeclineOthersBody {
            answered_session_id,
            project_id,
        };

        let response = self
            .request(reqwest::Method::POST, "/video-sessions/decline-others")
            .json(&body)
            .send()
            .await?;

        let envelope: DeclineOthersEnvelope = Self::handle_response(response).await?;
        Ok(envelope.declined_count)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn post_signal(
        &self,
        session_id: Uuid,
        sender: &str,
        payload: &serde_json::Value,
    ) -> Result<(), EndpointError> {
        let body = PostSignalBody {
            session_id,
            sender,
            payload,
        };

        let response = self
            .request(reqwest::Method::POST, "/signaling")
            .json(&body)
            .send()
            .await?;

        let _: SuccessEnvelope = Self::handle_response(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %session_id, last_id = last_id))]
    async fn poll_signals(
        &self,
        session_id: Uuid,
        last_id: i64,
        exclude_sender: &str,
    ) -> Result<Vec<SignalMessage>, EndpointError> {
        let params = [
            ("sessionId", session_id.to_string()),
            ("lastId", last_id.to_string()),
            ("excludeSender", exclude_sender.to_string()),
        ];

        let response = self
            .request(reqwest::Method::GET, "/signaling")
            .query(&params)
            .send()
            .await?;

        let envelope: SignalListEnvelope = Self::handle_response(response).await?;
        Ok(envelope.messages)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn purge_signals(&self, session_id: Uuid) -> Result<(), EndpointError> {
        let body = PurgeSignalsBody { session_id };

        let response = self
            .request(reqwest::Method::DELETE, "/signaling")
            .json(&body)
            .send()
            .await?;

        let _: SuccessEnvelope = Self::handle_response(response).await?;
        Ok(())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    kiosk_id: &'a str,
    project_id: Uuid,
    room_name: &'a str,
    caller_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateSessionBody {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(rename = "staffUserId", skip_serializing_if = "Option::is_none")]
    staff_user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeclineOthersBody {
    answered_session_id: Uuid,
    project_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostSignalBody<'a> {
    session_id: Uuid,
    sender: &'a str,
    payload: &'a serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurgeSignalsBody {
    session_id: Uuid,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: SessionInfo,
}

#[derive(Deserialize)]
struct SessionListEnvelope {
    sessions: Vec<SessionInfo>,
}

#[derive(Deserialize)]
struct SignalListEnvelope {
    messages: Vec<SignalMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeclineOthersEnvelope {
    #[allow(dead_code)]
    success: bool,
    declined_count: u64,
}

#[derive(Deserialize)]
struct SuccessEnvelope {
    #[allow(dead_code)]
    success: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[allow(dead_code)]
    code: String,
    message: String,
}
