//! Endpoint error types.

use thiserror::Error;

/// Errors surfaced by the endpoint transport and poller.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The request never produced a usable response (connection refused,
    /// timeout, DNS). Transient: the loop logs it and the next tick
    /// retries.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call service rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl EndpointError {
    /// Whether the next poll tick may simply retry.
    ///
    /// Wire-level failures are transient; an API rejection is not, since
    /// repeating the identical request cannot succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EndpointError::Transport(_))
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EndpointError::Decode(err.to_string())
        } else {
            EndpointError::Transport(err.to_string())
        }
    }
}
