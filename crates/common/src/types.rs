//! Session lifecycle and caller types.
//!
//! These enums are the shared vocabulary between the call service and the
//! polling endpoints. On the wire (and in the database) both travel as
//! lowercase strings; `as_str`/`parse` are the canonical conversions.

use serde::{Deserialize, Serialize};

/// Call session lifecycle state.
///
/// Created `waiting`, claimed to `connected`, retired to `ended` on hangup,
/// decline, cancellation, or reap. Never resurrected once ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, waiting for the receiving side to claim it.
    Waiting,

    /// Receiving side claimed the session; call in progress.
    Connected,

    /// Session over: hangup, decline, cancellation, or reap.
    Ended,
}

impl SessionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Connected => "connected",
            SessionStatus::Ended => "ended",
        }
    }

    /// Parse a wire/database string into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(SessionStatus::Waiting),
            "connected" => Some(SessionStatus::Connected),
            "ended" => Some(SessionStatus::Ended),
            _ => None,
        }
    }
}

/// Which side initiated a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerType {
    /// The kiosk requested staff assistance.
    Kiosk,

    /// A staff member called a kiosk back.
    Staff,
}

impl CallerType {
    /// Returns the string representation of the caller type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerType::Kiosk => "kiosk",
            CallerType::Staff => "staff",
        }
    }

    /// Parse a wire/database string into a caller type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kiosk" => Some(CallerType::Kiosk),
            "staff" => Some(CallerType::Staff),
            _ => None,
        }
    }

    /// The side that receives a call initiated by this one.
    #[must_use]
    pub fn peer(&self) -> Self {
        match self {
            CallerType::Kiosk => CallerType::Staff,
            CallerType::Staff => CallerType::Kiosk,
        }
    }
}
