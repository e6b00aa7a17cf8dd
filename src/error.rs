// Error types for the cleanliness monitor

use thiserror::Error;

/// Result type alias for monitor operations
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

/// Errors raised by the monitor's own bookkeeping. Data-source and I/O
/// failures travel as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Cleaning interval is zero or negative
    #[error("session {session_id}: cleaning interval must be positive, got {seconds}s")]
    InvalidInterval { session_id: String, seconds: i64 },

    /// Session is not registered with the monitor
    #[error("session not registered: {0}")]
    UnknownSession(String),
}

impl MonitorError {
    pub fn invalid_interval(session_id: impl Into<String>, seconds: i64) -> Self {
        MonitorError::InvalidInterval {
            session_id: session_id.into(),
            seconds,
        }
    }

    pub fn unknown_session(session_id: impl Into<String>) -> Self {
        MonitorError::UnknownSession(session_id.into())
    }
}
