//! Call Endpoint Library
//!
//! Client-side call handling for Frontdesk endpoints (the kiosk page and
//! the staff dashboard). There is no push channel anywhere in the system:
//! an endpoint owns a timer-driven polling loop and a small state machine
//! that converges on the correct call state purely from periodic snapshots
//! of the call service.
//!
//! # Architecture
//!
//! - [`transport`] - the transport contract against the call service, plus
//!   the wire types it speaks
//! - [`api`] - the HTTP implementation of the transport
//! - [`signals`] - control kinds recognized inside otherwise opaque
//!   signaling payloads
//! - [`state`] - the pure snapshot-driven call state machine
//! - [`poller`] - the timer loop tying transport and state machine together
//!
//! The state machine is a pure function `(state, snapshot) -> (state,
//! side effects)`; the poller owns the only mutable instance and executes
//! the returned effects. Transport faults are transient by design: they
//! are logged and the next tick retries.

pub mod api;
pub mod errors;
pub mod poller;
pub mod signals;
pub mod state;
pub mod transport;
