// MIT License - Copyright (c) 2026 Peter Wright
// Error taxonomy

/// All errors that can occur in the pulson-alarm library.
///
/// Malformed inbound messages are not errors here; they never leave the
/// stream processor (see [`DropReason`](crate::processor::DropReason)).
#[derive(Debug, thiserror::Error)]
pub enum PulsonError {
    #[error("MQTT connection to {host}:{port} as user '{user}' failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        user: String,
        reason: String,
    },

    #[error("MQTT connection to {host}:{port} timed out after {timeout_ms}ms")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout_ms: u64,
    },

    #[error("Not connected to the MQTT broker")]
    NotConnected,

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl PulsonError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PulsonError::Connection { .. }
                | PulsonError::ConnectTimeout { .. }
                | PulsonError::NotConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, PulsonError>;
