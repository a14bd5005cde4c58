//! Control kinds recognized inside signaling payloads.
//!
//! The relay ferries payloads without interpreting them; the endpoints do
//! interpret the `type` tag of the handful of control messages that drive
//! the call state machine. Everything else (candidates, renegotiations,
//! vendor extensions) passes through as [`SignalKind::Other`] for the
//! media layer to consume.

use serde_json::Value;

/// Well-known signal kinds, read from the payload's `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// The receiving side claimed the call.
    CallAnswered,

    /// The peer hung up or declined.
    CallEnded,

    /// Media negotiation offer.
    Offer,

    /// Media negotiation answer.
    Answer,

    /// ICE candidate.
    Candidate,

    /// Anything else; relayed to the media layer untouched.
    Other(String),

    /// Payload without a string `type` tag.
    Untyped,
}

impl SignalKind {
    /// Classify a payload by its `type` tag.
    #[must_use]
    pub fn of(payload: &Value) -> Self {
        match payload.get("type").and_then(Value::as_str) {
            Some("call-answered") => SignalKind::CallAnswered,
            Some("call-ended") => SignalKind::CallEnded,
            Some("offer") => SignalKind::Offer,
            Some("answer") => SignalKind::Answer,
            Some("candidate") => SignalKind::Candidate,
            Some(other) => SignalKind::Other(other.to_string()),
            None => SignalKind::Untyped,
        }
    }

    /// Whether this kind carries media negotiation content.
    #[must_use]
    pub fn is_negotiation(&self) -> bool {
        matches!(
            self,
            SignalKind::Offer | SignalKind::Answer | SignalKind::Candidate
        )
    }

    /// Build the control payload announcing an answered call.
    #[must_use]
    pub fn answered_payload() -> Value {
        serde_json::json!({"type": "call-answered"})
    }

    /// Build the control payload announcing the end of a call.
    #[must_use]
    pub fn ended_payload() -> Value {
        serde_json::json!({"type": "call-ended"})
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_kinds() {
        assert_eq!(
            SignalKind::of(&json!({"type": "call-answered"})),
            SignalKind::CallAnswered
        );
        assert_eq!(
            SignalKind::of(&json!({"type": "call-ended"})),
            SignalKind::CallEnded
        );
        assert_eq!(SignalKind::of(&json!({"type": "offer", "sdp": "v=0"})), SignalKind::Offer);
        assert_eq!(SignalKind::of(&json!({"type": "answer"})), SignalKind::Answer);
        assert_eq!(SignalKind::of(&json!({"type": "candidate"})), SignalKind::Candidate);
    }

    #[test]
    fn test_unknown_and_untyped_kinds() {
        assert_eq!(
            SignalKind::of(&json!({"type": "mute"})),
            SignalKind::Other("mute".to_string())
        );
        assert_eq!(SignalKind::of(&json!({"sdp": "v=0"})), SignalKind::Untyped);
        assert_eq!(SignalKind::of(&json!({"type": 7})), SignalKind::Untyped);
    }

    #[test]
    fn test_negotiation_kinds() {
        assert!(SignalKind::Offer.is_negotiation());
        assert!(SignalKind::Answer.is_negotiation());
        assert!(SignalKind::Candidate.is_negotiation());
        assert!(!SignalKind::CallAnswered.is_negotiation());
        assert!(!SignalKind::CallEnded.is_negotiation());
    }

    #[test]
    fn test_control_payload_round_trip() {
        assert_eq!(
            SignalKind::of(&SignalKind::answered_payload()),
            SignalKind::CallAnswered
        );
        assert_eq!(
            SignalKind::of(&SignalKind::ended_payload()),
            SignalKind::CallEnded
        );
    }
}
