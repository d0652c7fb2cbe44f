//! Remote executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::ExecOutput;

/// A backend able to run shell commands on the test client
///
/// Implementations own their session and connect lazily: the first command
/// connects, later commands reuse the connection.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `cmd` through the remote shell and wait for it to finish
    async fn run(&self, cmd: &str) -> Result<ExecOutput, ExecError>;

    /// Run `cmd`, failing with `ExecError::Timeout` if it outlives `timeout`
    async fn run_with_timeout(&self, cmd: &str, timeout: Duration)
    -> Result<ExecOutput, ExecError>;

    /// Establish the session now instead of on first command
    async fn connect(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Tear down the session; a later command reconnects
    async fn disconnect(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Whether a live session is currently held
    fn is_connected(&self) -> bool {
        true
    }

    /// Short backend name for logging
    fn executor_type(&self) -> &'static str;
}
