//! Caller identity middleware.
//!
//! Authentication lives upstream; the gateway in front of this service
//! validates the caller and asserts who they are via request headers:
//!
//! - `x-caller-role`: `super_admin` | `project_admin` | `manager` | `kiosk`
//! - `x-caller-id`: staff user UUID (required for staff roles)
//! - `x-kiosk-id`: device identifier (required for the kiosk role)
//!
//! This middleware converts those headers into an [`Identity`] request
//! extension for handlers. Missing or unknown identity yields 401; what a
//! given identity may do is decided per handler via the capability table.

use crate::errors::CallError;
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::roles::Role;
use tracing::instrument;
use uuid::Uuid;

/// Caller identity asserted by the upstream auth layer.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Role of the caller.
    pub role: Role,

    /// Staff user id (staff roles only).
    pub staff_user_id: Option<Uuid>,

    /// Device id (kiosk role only).
    pub kiosk_id: Option<String>,
}

impl Identity {
    /// Whether this identity is the kiosk that owns `kiosk_id`.
    pub fn owns_kiosk(&self, kiosk_id: &str) -> bool {
        self.kiosk_id.as_deref() == Some(kiosk_id)
    }
}

/// Identity middleware for the call endpoints.
///
/// # Response
///
/// - 401 Unauthorized if the role header is missing or unknown, or the
///   role-specific id header is absent
/// - Continues to the next handler with [`Identity`] in extensions otherwise
#[instrument(skip_all, name = "call.middleware.identity")]
pub async fn require_identity(
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, CallError> {
    let role_header = req
        .headers()
        .get("x-caller-role")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "call.middleware.identity", "Missing x-caller-role header");
            CallError::Unauthorized("Missing caller role".to_string())
        })?;

    let role = Role::parse(role_header).ok_or_else(|| {
        tracing::debug!(target: "call.middleware.identity", role = %role_header, "Unknown caller role");
        CallError::Unauthorized("Unknown caller role".to_string())
    })?;

    let identity = if role.is_staff() {
        let staff_user_id = req
            .headers()
            .get("x-caller-id")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                CallError::Unauthorized("Missing or invalid caller id".to_string())
            })?;

        Identity {
            role,
            staff_user_id: Some(staff_user_id),
            kiosk_id: None,
        }
    } else {
        let kiosk_id = req
            .headers()
            .get("x-kiosk-id")
            .and_then(|h| h.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| CallError::Unauthorized("Missing kiosk id".to_string()))?;

        Identity {
            role,
            staff_user_id: None,
            kiosk_id: Some(kiosk_id),
        }
    };

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
