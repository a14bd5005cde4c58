//! The timer-driven polling loop.
//!
//! Each endpoint runs one single-task loop with two cadences: a status
//! interval that watches the site (and triggers the server-side reap
//! cycle), and a faster signal interval that drains the relay channel for
//! the tracked session. Suspension only happens at timer boundaries; there
//! is no blocking wait on the peer anywhere.
//!
//! Each tick reads a snapshot, hands it to the pure state machine, applies
//! at most one transition, and executes the returned side effects. A
//! transport fault is logged and the next tick retries; there is no
//! backoff and no retry storm.

use crate::state::{
    apply_action, step, EndpointCallState, EndpointSide, LocalAction, SideEffect, Snapshot,
};
use crate::transport::{CallTransport, CreateSession, SessionInfo, SessionQuery};
use common::types::{CallerType, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default status poll cadence in milliseconds.
pub const DEFAULT_STATUS_POLL_MS: u64 = 1500;

/// Default signal poll cadence in milliseconds.
pub const DEFAULT_SIGNAL_POLL_MS: u64 = 750;

/// Poll cadence configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between availability/waiting-set polls.
    pub status_poll_ms: u64,

    /// Interval between signaling channel polls.
    pub signal_poll_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            status_poll_ms: DEFAULT_STATUS_POLL_MS,
            signal_poll_ms: DEFAULT_SIGNAL_POLL_MS,
        }
    }
}

/// The polling loop for one endpoint.
///
/// Owns the only mutable [`EndpointCallState`] instance for the endpoint.
/// Either drive it with [`CallPoller::run`] or call the tick methods
/// directly (tests do the latter).
pub struct CallPoller<T: CallTransport> {
    transport: Arc<T>,
    side: EndpointSide,
    project_id: Uuid,
    staff_user_id: Option<Uuid>,
    config: PollerConfig,
    state: EndpointCallState,
    cursor: i64,
}

impl<T: CallTransport> CallPoller<T> {
    /// Create a poller for an endpoint.
    ///
    /// `staff_user_id` is recorded on sessions this endpoint answers and
    /// is only meaningful for the staff side.
    pub fn new(
        transport: Arc<T>,
        side: EndpointSide,
        project_id: Uuid,
        staff_user_id: Option<Uuid>,
        config: PollerConfig,
    ) -> Self {
        Self {
            transport,
            side,
            project_id,
            staff_user_id,
            config,
            state: EndpointCallState::new(),
            cursor: 0,
        }
    }

    /// The current call state.
    pub fn state(&self) -> &EndpointCallState {
        &self.state
    }

    /// The current delivery cursor (highest message id seen).
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Run the loop until the cancellation token fires or the action
    /// channel closes. Returns the final state.
    #[instrument(skip_all, name = "endpoint.poller")]
    pub async fn run(
        mut self,
        mut actions: mpsc::Receiver<LocalAction>,
        cancel: CancellationToken,
    ) -> EndpointCallState {
        info!(
            target: "endpoint.poller",
            side = self.side.sender(),
            project_id = %self.project_id,
            status_poll_ms = self.config.status_poll_ms,
            signal_poll_ms = self.config.signal_poll_ms,
            "Starting call poller"
        );

        let mut status_interval =
            tokio::time::interval(Duration::from_millis(self.config.status_poll_ms));
        let mut signal_interval =
            tokio::time::interval(Duration::from_millis(self.config.signal_poll_ms));
        let mut duration_interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = status_interval.tick() => {
                    self.status_tick().await;
                }
                _ = signal_interval.tick() => {
                    self.signal_tick().await;
                }
                _ = duration_interval.tick() => {
                    self.state.tick_duration();
                }
                action = actions.recv() => {
                    match action {
                        Some(action) => self.handle_action(action).await,
                        None => {
                            info!(target: "endpoint.poller", "Action channel closed, exiting");
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!(target: "endpoint.poller", "Poller received shutdown signal, exiting");
                    break;
                }
            }
        }

        self.state
    }

    /// One availability tick: refresh the waiting set (triggering the
    /// server-side reap cycle first) and the tracked session, then step
    /// the machine.
    pub async fn status_tick(&mut self) {
        // The status poll is what runs the reaper on the server; its
        // numbers are site-level UI concerns, not call state.
        let exclude = match &self.side {
            EndpointSide::Kiosk { kiosk_id } => Some(kiosk_id.as_str()),
            EndpointSide::Staff => None,
        };
        match self.transport.site_status(self.project_id, exclude).await {
            Ok(site) => {
                debug!(
                    target: "endpoint.poller",
                    available = site.available,
                    waiting_calls = site.waiting_calls,
                    "Site status"
                );
            }
            Err(e) => {
                warn!(target: "endpoint.poller", error = %e, "Site status poll failed");
                return;
            }
        }

        let waiting_query = match &self.side {
            EndpointSide::Staff => SessionQuery {
                status: Some(SessionStatus::Waiting),
                caller_type: Some(CallerType::Kiosk),
                project_id: Some(self.project_id),
                kiosk_id: None,
            },
            EndpointSide::Kiosk { kiosk_id } => SessionQuery {
                status: Some(SessionStatus::Waiting),
                caller_type: Some(CallerType::Staff),
                project_id: Some(self.project_id),
                kiosk_id: Some(kiosk_id.clone()),
            },
        };

        let waiting = match self.transport.find_sessions(&waiting_query).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(target: "endpoint.poller", error = %e, "Waiting set poll failed");
                return;
            }
        };

        let session = self.refresh_tracked_session().await;

        let snapshot = Snapshot {
            waiting: Some(waiting),
            session,
            signals: vec![],
        };

        self.step_with(&snapshot).await;
    }

    /// One signaling tick: drain new peer messages for the tracked
    /// session and step the machine with them.
    pub async fn signal_tick(&mut self) {
        let Some(session_id) = self.state.current_session.as_ref().map(|s| s.id) else {
            return;
        };

        let signals = match self
            .transport
            .poll_signals(session_id, self.cursor, self.side.sender())
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(target: "endpoint.poller", error = %e, "Signal poll failed");
                return;
            }
        };

        if let Some(max_id) = signals.iter().map(|m| m.id).max() {
            self.cursor = max_id;
        }

        if signals.is_empty() {
            return;
        }

        let snapshot = Snapshot {
            waiting: None,
            session: None,
            signals,
        };

        self.step_with(&snapshot).await;
    }

    /// Apply a local user action.
    pub async fn handle_action(&mut self, action: LocalAction) {
        let (next, effects) = apply_action(&self.state, &action);
        self.state = next;
        self.execute(effects).await;
    }

    async fn step_with(&mut self, snapshot: &Snapshot) {
        let (next, effects) = step(&self.state, &self.side, snapshot);
        self.state = next;
        self.execute(effects).await;
    }

    /// Fetch the freshest row of the tracked session, if any.
    async fn refresh_tracked_session(&self) -> Option<SessionInfo> {
        let current = self.state.current_session.as_ref()?;

        let query = SessionQuery {
            project_id: Some(current.project_id),
            kiosk_id: Some(current.kiosk_id.clone()),
            ..SessionQuery::default()
        };

        match self.transport.find_sessions(&query).await {
            Ok(sessions) => sessions.into_iter().find(|s| s.id == current.id),
            Err(e) => {
                warn!(target: "endpoint.poller", error = %e, "Session refresh failed");
                None
            }
        }
    }

    /// Execute side effects returned by the state machine.
    ///
    /// Fault policy per the error design: wire-level failures are logged
    /// and the next tick retries; an API rejection of a call-critical
    /// write moves the machine to `failed`. A failed decline broadcast
    /// never rolls back the answer, and teardown effects are best-effort.
    async fn execute(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::CreateSession {
                    project_id,
                    kiosk_id,
                    room_name,
                    notes,
                } => {
                    let request = CreateSession {
                        project_id,
                        kiosk_id,
                        room_name,
                        caller_type: match self.side {
                            EndpointSide::Kiosk { .. } => CallerType::Kiosk,
                            EndpointSide::Staff => CallerType::Staff,
                        },
                        notes,
                    };

                    match self.transport.create_session(&request).await {
                        Ok(session) => {
                            info!(
                                target: "endpoint.poller",
                                session_id = %session.id,
                                "Opened call session"
                            );
                            self.cursor = 0;
                            self.state.attach_session(session, &self.side);
                        }
                        Err(e) => {
                            warn!(target: "endpoint.poller", error = %e, "Failed to open session");
                            self.state.note_failure(format!("could not start call: {e}"));
                        }
                    }
                }

                SideEffect::MarkConnected { session_id } => {
                    match self
                        .transport
                        .answer_session(session_id, self.staff_user_id)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) if e.is_transient() => {
                            warn!(target: "endpoint.poller", error = %e, "Answer write failed");
                        }
                        Err(e) => {
                            // Typically a conflict: the session was reaped
                            // or claimed while the answer was in flight.
                            warn!(target: "endpoint.poller", error = %e, "Answer rejected");
                            self.state.note_failure(format!("could not answer call: {e}"));
                        }
                    }
                }

                SideEffect::DeclineOthers {
                    answered_session_id,
                    project_id,
                } => {
                    // Best-effort: a failure here never unwinds the answer.
                    match self
                        .transport
                        .decline_others(answered_session_id, project_id)
                        .await
                    {
                        Ok(declined) => {
                            if declined > 0 {
                                debug!(
                                    target: "endpoint.poller",
                                    declined,
                                    "Declined competing calls"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(
                                target: "endpoint.poller",
                                error = %e,
                                "Decline broadcast failed; competing calls converge via reaping"
                            );
                        }
                    }
                }

                SideEffect::PostSignal {
                    session_id,
                    payload,
                } => {
                    match self
                        .transport
                        .post_signal(session_id, self.side.sender(), &payload)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) if e.is_transient() => {
                            warn!(target: "endpoint.poller", error = %e, "Signal post failed");
                        }
                        Err(e) => {
                            warn!(target: "endpoint.poller", error = %e, "Signal post rejected");
                            self.state.note_failure(format!("signaling failed: {e}"));
                        }
                    }
                }

                SideEffect::EndSession { session_id } => {
                    if let Err(e) = self.transport.end_session(session_id).await {
                        warn!(target: "endpoint.poller", error = %e, "End session write failed");
                    }
                }

                SideEffect::PurgeSignals { session_id } => {
                    if let Err(e) = self.transport.purge_signals(session_id).await {
                        warn!(target: "endpoint.poller", error = %e, "Signal purge failed");
                    }
                    self.cursor = 0;
                }

                // The run loop derives the duration clock from the state:
                // tick_duration only advances while connected.
                SideEffect::StartDurationTick | SideEffect::StopDurationTick => {}
            }
        }
    }
}
