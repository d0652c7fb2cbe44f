//! packetd-remote: Remote control of the packetd test client
//!
//! Runs shell commands on the client machine behind the appliance, over SSH
//! or locally, and probes the client's outbound connectivity.

pub mod config;
pub mod control;
pub mod credentials;
pub mod error;
pub mod local;
pub mod prober;
pub mod result;
pub mod session;
pub mod ssh;
pub mod traits;

pub use config::ClientConfig;
pub use control::{DEFAULT_COMMAND_TIMEOUT, RemoteControl};
pub use credentials::{Credential, CredentialError, ResolvedCredential};
pub use error::ExecError;
pub use local::LocalExecutor;
pub use prober::{ConnectivityProber, ProbeConfig};
pub use result::{
    CommandRequest, CommandResult, ConnectionInfo, ExecOutput, OutputMode, TIMEOUT_STATUS,
};
pub use session::RemoteSession;
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
