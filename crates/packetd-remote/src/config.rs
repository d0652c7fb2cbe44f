//! Configuration types for the test client

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::Credential;
use crate::error::ExecError;
use crate::result::ConnectionInfo;

/// Configuration for the remote test client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// IP address or hostname of the client behind the appliance
    #[serde(default = "default_addr")]
    pub addr: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// Path to SSH private key
    pub key_file: Option<PathBuf>,
    /// Environment variable holding a base64 private key
    pub key_env: Option<String>,
    /// Password, used when no key is configured
    pub password: Option<String>,
    /// Seconds allowed to establish the connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds a single command may run
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_addr() -> String {
    "192.0.2.2".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_command_timeout_secs() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
            user: default_user(),
            key_file: None,
            key_env: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Whether the client is this machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.addr.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// Connection details for the SSH backend
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(&self.addr, &self.user)
            .with_port(self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }

    /// Default per-command timeout
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Pick the credential: key file, then env key, then password
    ///
    /// # Errors
    /// `ExecError::ConfigError` when none is configured
    pub fn credential(&self) -> Result<Credential, ExecError> {
        if let Some(path) = &self.key_file {
            Ok(Credential::KeyFile(path.clone()))
        } else if let Some(var) = &self.key_env {
            Ok(Credential::EnvKey(var.clone()))
        } else if let Some(password) = &self.password {
            Ok(Credential::Password(password.clone()))
        } else {
            Err(ExecError::ConfigError(format!(
                "no key_file, key_env or password configured for {}",
                self.addr
            )))
        }
    }
}
