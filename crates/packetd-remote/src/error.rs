//! Error types for packetd-remote

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a command on the test client
///
/// A command that runs and exits non-zero is not an error; its status is
/// returned as an ordinary value.
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Remote host unreachable, connection refused, or session dropped
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command did not complete in time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Credential could not be resolved or loaded
    #[error("credential error: {0}")]
    CredentialError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Timeout { .. }
        )
    }

    /// Check if the transport to the test client itself is broken
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::AuthenticationFailed(_)
        )
    }
}
