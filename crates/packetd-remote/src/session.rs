//! Suite-scoped session over the test client

use std::future::Future;

use tracing::{info, warn};

use crate::control::RemoteControl;
use crate::error::ExecError;
use crate::prober::{ConnectivityProber, ProbeConfig};
use crate::result::{CommandRequest, CommandResult};

/// One connection to the test client, held for the length of a suite
///
/// Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    control: RemoteControl,
    prober: ConnectivityProber,
}

impl RemoteSession {
    /// Connect to the client now rather than on first command
    ///
    /// # Errors
    /// Transport errors from the executor's connect
    pub async fn open(control: RemoteControl, probe: ProbeConfig) -> Result<Self, ExecError> {
        let executor = control.executor();
        executor.connect().await?;
        info!(executor = executor.executor_type(), "remote session opened");

        let prober = ConnectivityProber::new(control.clone()).with_config(probe);
        Ok(Self { control, prober })
    }

    /// Open a session, run `body`, and close the session whatever `body` returned
    ///
    /// A failed close is logged and does not replace the body's value.
    ///
    /// # Errors
    /// Only an error from opening the session; errors inside `body` are part
    /// of its own return value.
    pub async fn scoped<F, Fut, T>(
        control: RemoteControl,
        probe: ProbeConfig,
        body: F,
    ) -> Result<T, ExecError>
    where
        F: FnOnce(RemoteSession) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = Self::open(control, probe).await?;
        let value = body(session.clone()).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close remote session");
        }
        Ok(value)
    }

    /// Command facade
    pub fn control(&self) -> &RemoteControl {
        &self.control
    }

    /// Connectivity prober sharing this session
    pub fn prober(&self) -> &ConnectivityProber {
        &self.prober
    }

    /// See [`RemoteControl::run_command`]
    ///
    /// # Errors
    /// Transport or timeout failures
    pub async fn run_command(&self, request: &CommandRequest) -> Result<CommandResult, ExecError> {
        self.control.run_command(request).await
    }

    /// See [`RemoteControl::run_status`]
    ///
    /// # Errors
    /// Transport or timeout failures
    pub async fn run_status(&self, command: &str) -> Result<i32, ExecError> {
        self.control.run_status(command).await
    }

    /// See [`RemoteControl::run_stdout`]
    ///
    /// # Errors
    /// Transport or timeout failures
    pub async fn run_stdout(&self, command: &str) -> Result<String, ExecError> {
        self.control.run_stdout(command).await
    }

    /// See [`ConnectivityProber::is_online`]
    ///
    /// # Errors
    /// Transport failures to the client itself
    pub async fn is_online(&self) -> Result<i32, ExecError> {
        self.prober.is_online().await
    }

    /// Release the connection
    ///
    /// # Errors
    /// Errors from the executor's disconnect
    pub async fn close(self) -> Result<(), ExecError> {
        self.control.executor().disconnect().await?;
        info!("remote session closed");
        Ok(())
    }
}
