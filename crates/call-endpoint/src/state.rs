//! The snapshot-driven call state machine.
//!
//! One instance per endpoint. The machine never talks to the network: the
//! poller feeds it snapshots and local actions, and it answers with a new
//! state plus side effects for the poller to execute. At most one state
//! transition happens per step, matching the one-transition-per-tick
//! discipline of the polling loop.
//!
//! Convergence relies on observation, not acknowledgement. The only way an
//! endpoint learns that its incoming call was declined, cancelled, or
//! reaped is that the session vanishes from the polled waiting set; there
//! is no explicit cancellation push anywhere.

use crate::signals::SignalKind;
use crate::transport::{SessionInfo, SignalMessage};
use common::types::{CallerType, SessionStatus};
use uuid::Uuid;

/// Which side of a call this endpoint plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSide {
    /// A kiosk device. Incoming calls are staff-originated sessions
    /// addressed to this device.
    Kiosk { kiosk_id: String },

    /// The staff dashboard. Incoming calls are kiosk-originated sessions
    /// anywhere in the site.
    Staff,
}

impl EndpointSide {
    /// The sender tag this endpoint stamps on signaling messages, and the
    /// tag it excludes when polling.
    #[must_use]
    pub fn sender(&self) -> &'static str {
        match self {
            EndpointSide::Kiosk { .. } => "kiosk",
            EndpointSide::Staff => "staff",
        }
    }

    /// Whether a waiting session is an incoming call for this endpoint.
    #[must_use]
    pub fn is_incoming(&self, session: &SessionInfo) -> bool {
        if session.session_status() != Some(SessionStatus::Waiting) {
            return false;
        }

        match self {
            EndpointSide::Staff => session.caller() == Some(CallerType::Kiosk),
            EndpointSide::Kiosk { kiosk_id } => {
                session.caller() == Some(CallerType::Staff) && session.kiosk_id == *kiosk_id
            }
        }
    }
}

/// Local call state of one endpoint. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Idle,
    Outgoing,
    Incoming,
    Connecting,
    Connected,
    Ended,
    Failed,
}

/// Cached display information about the other side of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub display_name: String,
}

/// What one poll tick observed.
///
/// - `waiting`: the waiting sessions addressed to this endpoint, when the
///   tick refreshed the waiting set (`None` for ticks that did not).
/// - `session`: the freshest known row of the tracked session, when the
///   tick refreshed it. Sessions are never hard-deleted, so a reaped or
///   declined session resurfaces here as `ended` rather than vanishing.
/// - `signals`: new peer messages past the cursor.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub waiting: Option<Vec<SessionInfo>>,
    pub session: Option<SessionInfo>,
    pub signals: Vec<SignalMessage>,
}

/// An action taken by the local user (or UI).
#[derive(Debug, Clone)]
pub enum LocalAction {
    /// Start a call to the other side.
    Initiate {
        project_id: Uuid,
        kiosk_id: String,
        room_name: String,
        notes: Option<String>,
    },

    /// Accept the incoming call.
    Answer,

    /// Reject the incoming call.
    Decline,

    /// End the active call.
    HangUp,
}

/// Follow-up work for the poller to execute against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Open a waiting session; on success the poller attaches the
    /// returned session to the state.
    CreateSession {
        project_id: Uuid,
        kiosk_id: String,
        room_name: String,
        notes: Option<String>,
    },

    /// Claim the session (`status=connected`).
    MarkConnected { session_id: Uuid },

    /// Broadcast-end the competing waiting calls for the site.
    DeclineOthers {
        answered_session_id: Uuid,
        project_id: Uuid,
    },

    /// Relay a control payload to the peer.
    PostSignal {
        session_id: Uuid,
        payload: serde_json::Value,
    },

    /// End the session (`status=ended`).
    EndSession { session_id: Uuid },

    /// Drop the session's relay channel at teardown.
    PurgeSignals { session_id: Uuid },

    /// Start the one-second call duration tick.
    StartDurationTick,

    /// Stop the duration tick.
    StopDurationTick,
}

/// Mutable call state for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointCallState {
    pub status: CallStatus,
    pub current_session: Option<SessionInfo>,
    pub peer_info: Option<PeerInfo>,
    pub call_duration_secs: u64,
    pub last_error: Option<String>,
}

impl Default for EndpointCallState {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointCallState {
    /// A fresh idle endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: CallStatus::Idle,
            current_session: None,
            peer_info: None,
            call_duration_secs: 0,
            last_error: None,
        }
    }

    /// Attach the session returned by a successful `CreateSession` effect.
    pub fn attach_session(&mut self, session: SessionInfo, side: &EndpointSide) {
        self.peer_info = Some(peer_info_for(&session, side));
        self.current_session = Some(session);
    }

    /// Record an unrecoverable signaling fault. The machine surfaces the
    /// error once and auto-resets to idle on the next step.
    pub fn note_failure(&mut self, message: impl Into<String>) {
        self.status = CallStatus::Failed;
        self.last_error = Some(message.into());
    }

    /// Advance the call duration clock. Only meaningful while connected.
    pub fn tick_duration(&mut self) {
        if self.status == CallStatus::Connected {
            self.call_duration_secs += 1;
        }
    }

    fn cleared(&self) -> Self {
        Self::new()
    }
}

/// Display info for the other side of a session.
fn peer_info_for(session: &SessionInfo, side: &EndpointSide) -> PeerInfo {
    match side {
        // The kiosk directory lookup lives upstream; the device id is the
        // best display handle available locally.
        EndpointSide::Staff => PeerInfo {
            display_name: session.kiosk_id.clone(),
        },
        EndpointSide::Kiosk { .. } => PeerInfo {
            display_name: "staff".to_string(),
        },
    }
}

/// Apply one snapshot to the state.
///
/// Pure: the inputs are borrowed, the next state is returned. At most one
/// transition happens per call.
#[must_use]
pub fn step(
    state: &EndpointCallState,
    side: &EndpointSide,
    snapshot: &Snapshot,
) -> (EndpointCallState, Vec<SideEffect>) {
    let kinds: Vec<SignalKind> = snapshot
        .signals
        .iter()
        .map(|m: &SignalMessage| SignalKind::of(&m.payload))
        .collect();

    let peer_hung_up = kinds.iter().any(|k| *k == SignalKind::CallEnded);

    match state.status {
        CallStatus::Idle => {
            let incoming = snapshot
                .waiting
                .as_ref()
                .and_then(|waiting| waiting.iter().find(|s| side.is_incoming(s)));

            if let Some(session) = incoming {
                let mut next = state.clone();
                next.status = CallStatus::Incoming;
                next.peer_info = Some(peer_info_for(session, side));
                next.current_session = Some(session.clone());
                next.last_error = None;
                return (next, vec![]);
            }
            (state.clone(), vec![])
        }

        CallStatus::Outgoing => {
            if kinds.iter().any(|k| *k == SignalKind::CallAnswered) {
                let mut next = state.clone();
                next.status = CallStatus::Connecting;
                return (next, vec![]);
            }

            match tracked_status(state, snapshot) {
                // The peer claimed the session but the answered signal has
                // not arrived (or was swept): the row is authoritative.
                Some(SessionStatus::Connected) => {
                    let mut next = state.clone();
                    next.status = CallStatus::Connecting;
                    (next, vec![])
                }
                // Declined, cancelled, or reaped while we waited.
                Some(SessionStatus::Ended) => (state.cleared(), vec![]),
                _ => (state.clone(), vec![]),
            }
        }

        CallStatus::Incoming => {
            if peer_hung_up || tracked_status(state, snapshot) == Some(SessionStatus::Ended) {
                return (state.cleared(), vec![]);
            }

            // The session vanishing from the polled waiting set is the
            // only cancellation signal there is.
            if let (Some(waiting), Some(current)) =
                (snapshot.waiting.as_ref(), state.current_session.as_ref())
            {
                if !waiting.iter().any(|s| s.id == current.id) {
                    return (state.cleared(), vec![]);
                }
            }

            (state.clone(), vec![])
        }

        CallStatus::Connecting => {
            if peer_hung_up || tracked_status(state, snapshot) == Some(SessionStatus::Ended) {
                let mut next = state.cleared();
                next.status = CallStatus::Ended;
                return (next, vec![]);
            }

            if kinds.iter().any(SignalKind::is_negotiation) {
                let mut next = state.clone();
                next.status = CallStatus::Connected;
                return (next, vec![SideEffect::StartDurationTick]);
            }

            (state.clone(), vec![])
        }

        CallStatus::Connected => {
            if peer_hung_up || tracked_status(state, snapshot) == Some(SessionStatus::Ended) {
                let mut next = state.cleared();
                next.status = CallStatus::Ended;
                return (next, vec![SideEffect::StopDurationTick]);
            }

            (state.clone(), vec![])
        }

        // Terminal display states auto-reset on the next tick.
        CallStatus::Ended | CallStatus::Failed => (state.cleared(), vec![]),
    }
}

/// Apply a local user action to the state.
#[must_use]
pub fn apply_action(
    state: &EndpointCallState,
    action: &LocalAction,
) -> (EndpointCallState, Vec<SideEffect>) {
    match (&state.status, action) {
        (
            CallStatus::Idle,
            LocalAction::Initiate {
                project_id,
                kiosk_id,
                room_name,
                notes,
            },
        ) => {
            let mut next = state.clone();
            next.status = CallStatus::Outgoing;
            next.last_error = None;
            (
                next,
                vec![SideEffect::CreateSession {
                    project_id: *project_id,
                    kiosk_id: kiosk_id.clone(),
                    room_name: room_name.clone(),
                    notes: notes.clone(),
                }],
            )
        }

        (CallStatus::Incoming, LocalAction::Answer) => {
            let Some(session) = &state.current_session else {
                return (state.clone(), vec![]);
            };

            let mut next = state.clone();
            next.status = CallStatus::Connecting;

            // The answer sequence is three independent round trips with no
            // compensation; a failure in the middle is resolved by later
            // polls, never rolled back.
            let effects = vec![
                SideEffect::MarkConnected {
                    session_id: session.id,
                },
                SideEffect::DeclineOthers {
                    answered_session_id: session.id,
                    project_id: session.project_id,
                },
                SideEffect::PostSignal {
                    session_id: session.id,
                    payload: SignalKind::answered_payload(),
                },
            ];

            (next, effects)
        }

        (CallStatus::Incoming, LocalAction::Decline) => {
            let Some(session) = &state.current_session else {
                return (state.cleared(), vec![]);
            };

            let effects = vec![
                SideEffect::EndSession {
                    session_id: session.id,
                },
                SideEffect::PostSignal {
                    session_id: session.id,
                    payload: SignalKind::ended_payload(),
                },
            ];

            (state.cleared(), effects)
        }

        (
            CallStatus::Outgoing | CallStatus::Connecting | CallStatus::Connected,
            LocalAction::HangUp,
        ) => {
            let mut next = state.cleared();
            next.status = CallStatus::Ended;

            let Some(session) = &state.current_session else {
                return (next, vec![SideEffect::StopDurationTick]);
            };

            let effects = vec![
                SideEffect::EndSession {
                    session_id: session.id,
                },
                SideEffect::PostSignal {
                    session_id: session.id,
                    payload: SignalKind::ended_payload(),
                },
                SideEffect::PurgeSignals {
                    session_id: session.id,
                },
                SideEffect::StopDurationTick,
            ];

            (next, effects)
        }

        // Any other combination is a stale UI event; ignore it.
        _ => (state.clone(), vec![]),
    }
}

/// The freshest known status of the tracked session.
fn tracked_status(state: &EndpointCallState, snapshot: &Snapshot) -> Option<SessionStatus> {
    snapshot
        .session
        .as_ref()
        .or(state.current_session.as_ref())
        .and_then(SessionInfo::session_status)
}
