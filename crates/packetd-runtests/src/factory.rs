//! Executor factory for the configured test client

use std::sync::Arc;

use eyre::Result;
use packetd_remote::{ClientConfig, LocalExecutor, RemoteControl, RemoteExecutor, SshExecutor};

/// Create the executor backend for the client
///
/// # Errors
/// Returns error if no usable credential is configured for a remote client
pub fn create_executor(config: &ClientConfig) -> Result<Arc<dyn RemoteExecutor>> {
    if config.is_local() {
        tracing::info!(addr = %config.addr, "client is local, running commands directly");
        return Ok(Arc::new(LocalExecutor::new()));
    }

    let credential = config.credential()?;
    let executor = SshExecutor::new(config.connection_info(), &credential)
        .map_err(|e| eyre::eyre!("failed to create SSH executor: {e}"))?;
    Ok(Arc::new(executor))
}

/// Create the command facade for the client
///
/// # Errors
/// See [`create_executor`]
pub fn create_control(config: &ClientConfig) -> Result<RemoteControl> {
    let executor = create_executor(config)?;
    Ok(RemoteControl::new(executor).with_default_timeout(config.command_timeout()))
}
