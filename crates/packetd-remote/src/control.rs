//! Command facade used by test suites

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::{CommandRequest, CommandResult, ExecOutput};
use crate::traits::RemoteExecutor;

/// Default time a single command may run
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs commands on the test client and normalizes their results
///
/// Wraps a [`RemoteExecutor`] backend. The backend's session is reused
/// across calls; callers never manage it directly.
#[derive(Clone)]
pub struct RemoteControl {
    executor: Arc<dyn RemoteExecutor>,
    default_timeout: Duration,
}

impl std::fmt::Debug for RemoteControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteControl")
            .field("executor", &self.executor.executor_type())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl RemoteControl {
    /// Create a control over `executor` using [`DEFAULT_COMMAND_TIMEOUT`]
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the timeout applied when a request carries none
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The timeout applied when a request carries none
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Backend executor
    pub fn executor(&self) -> &Arc<dyn RemoteExecutor> {
        &self.executor
    }

    /// Run a request and return the result shape it asked for
    ///
    /// # Errors
    /// `ExecError::ConnectionFailed` if the client cannot be reached,
    /// `ExecError::Timeout` if the command outlives its timeout. A non-zero
    /// exit status is returned as `CommandResult::ExitStatus`, not an error.
    #[instrument(skip(self, request), fields(command = %request.command, mode = ?request.mode))]
    pub async fn run_command(&self, request: &CommandRequest) -> Result<CommandResult, ExecError> {
        let limit = request.timeout.unwrap_or(self.default_timeout);
        let output = self.exec(&request.shell_command(), limit).await?;
        Ok(CommandResult::from_output(request.mode, output))
    }

    /// Run `command` and return its exit status
    ///
    /// # Errors
    /// See [`RemoteControl::run_command`]
    pub async fn run_status(&self, command: &str) -> Result<i32, ExecError> {
        self.run_status_with_timeout(command, self.default_timeout)
            .await
    }

    /// Run `command` with an explicit timeout and return its exit status
    ///
    /// # Errors
    /// See [`RemoteControl::run_command`]
    pub async fn run_status_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<i32, ExecError> {
        let output = self.exec(command, timeout).await?;
        Ok(output.status)
    }

    /// Run `command` and return its stdout with surrounding whitespace stripped
    ///
    /// The exit status is ignored: a failing command that prints still
    /// returns what it printed.
    ///
    /// # Errors
    /// See [`RemoteControl::run_command`]
    pub async fn run_stdout(&self, command: &str) -> Result<String, ExecError> {
        self.run_stdout_with_timeout(command, self.default_timeout)
            .await
    }

    /// Run `command` with an explicit timeout and return its trimmed stdout
    ///
    /// # Errors
    /// See [`RemoteControl::run_command`]
    pub async fn run_stdout_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let output = self.exec(command, timeout).await?;
        Ok(output.trimmed_stdout().to_string())
    }

    /// Start `command` in the background on the client and return at once
    ///
    /// Returns the status of the launching shell, not of `command`.
    ///
    /// # Errors
    /// See [`RemoteControl::run_command`]
    pub async fn run_detached(&self, command: &str) -> Result<i32, ExecError> {
        let request = CommandRequest::detached(command);
        let output = self
            .exec(&request.shell_command(), self.default_timeout)
            .await?;
        Ok(output.status)
    }

    async fn exec(&self, command: &str, timeout: Duration) -> Result<ExecOutput, ExecError> {
        debug!(
            executor = self.executor.executor_type(),
            command = %command,
            "running command"
        );
        let output = self.executor.run_with_timeout(command, timeout).await?;
        if !output.success() {
            debug!(
                command = %command,
                status = output.status,
                stderr = %output.stderr.trim(),
                "command exited non-zero"
            );
        }
        Ok(output)
    }
}
