//! Call service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output. The reap thresholds and the signaling retention
//! window are named parameters here rather than literals in the code that
//! applies them.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default age in seconds after which a waiting session is reaped.
pub const DEFAULT_WAITING_REAP_SECONDS: u64 = 120;

/// Default age in seconds after which a connected session with no recorded
/// end is reaped.
pub const DEFAULT_CONNECTED_REAP_SECONDS: u64 = 600;

/// Default retention window in seconds for signaling messages.
pub const DEFAULT_SIGNAL_RETENTION_SECONDS: u64 = 300;

/// Default maximum number of messages returned per signaling poll.
pub const DEFAULT_SIGNAL_BATCH_SIZE: i64 = 10;

/// Default interval in seconds between background retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Call service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Waiting sessions older than this are force-ended on the next
    /// availability poll. A kiosk that asked for help and then closed its
    /// page must not permanently occupy the incoming-call slot.
    pub waiting_reap_seconds: u64,

    /// Connected sessions with a null `ended_at` older than this are
    /// force-ended. A crashed browser leaves a connected session with no
    /// way to signal its own end.
    pub connected_reap_seconds: u64,

    /// Signaling messages older than this are swept.
    pub signal_retention_seconds: u64,

    /// Maximum messages returned per signaling poll.
    pub signal_batch_size: i64,

    /// Interval between background retention sweeps.
    pub sweep_interval_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("waiting_reap_seconds", &self.waiting_reap_seconds)
            .field("connected_reap_seconds", &self.connected_reap_seconds)
            .field("signal_retention_seconds", &self.signal_retention_seconds)
            .field("signal_batch_size", &self.signal_batch_size)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let waiting_reap_seconds = parse_positive_u64(
            vars,
            "CALL_WAITING_REAP_SECONDS",
            DEFAULT_WAITING_REAP_SECONDS,
        )?;

        let connected_reap_seconds = parse_positive_u64(
            vars,
            "CALL_CONNECTED_REAP_SECONDS",
            DEFAULT_CONNECTED_REAP_SECONDS,
        )?;

        let signal_retention_seconds = parse_positive_u64(
            vars,
            "CALL_SIGNAL_RETENTION_SECONDS",
            DEFAULT_SIGNAL_RETENTION_SECONDS,
        )?;

        let signal_batch_size = match vars.get("CALL_SIGNAL_BATCH_SIZE") {
            Some(value_str) => {
                let value: i64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "CALL_SIGNAL_BATCH_SIZE".to_string(),
                    reason: format!("must be a valid positive integer, got '{value_str}': {e}"),
                })?;

                if value <= 0 {
                    return Err(ConfigError::InvalidValue {
                        name: "CALL_SIGNAL_BATCH_SIZE".to_string(),
                        reason: format!("must be greater than 0, got {value}"),
                    });
                }

                value
            }
            None => DEFAULT_SIGNAL_BATCH_SIZE,
        };

        let sweep_interval_seconds = parse_positive_u64(
            vars,
            "CALL_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;

        Ok(Config {
            database_url,
            bind_address,
            waiting_reap_seconds,
            connected_reap_seconds,
            signal_retention_seconds,
            signal_batch_size,
            sweep_interval_seconds,
        })
    }
}

/// Parse an optional positive integer variable, falling back to a default.
fn parse_positive_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => {
            let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("must be a valid positive integer, got '{value_str}': {e}"),
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }

            Ok(value)
        }
        None => Ok(default),
    }
}
