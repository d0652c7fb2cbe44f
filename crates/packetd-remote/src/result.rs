//! Request and result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Status reported when a command is cut off by a timeout, matching `timeout(1)`
pub const TIMEOUT_STATUS: i32 = 124;

/// Raw record of one command run, as produced by an executor backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl ExecOutput {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout with surrounding whitespace stripped
    #[must_use]
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }
}

/// What the caller wants back from a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Return the exit status
    #[default]
    ExitStatus,
    /// Return trimmed stdout, ignoring the exit status
    Stdout,
    /// Start the command in the background and return at once
    Detached,
}

/// A single command to run on the test client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Shell command, passed through verbatim
    pub command: String,
    /// Result shape
    pub mode: OutputMode,
    /// Per-call timeout; the control default applies when unset
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    /// Request the exit status of `command`
    pub fn status(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            mode: OutputMode::ExitStatus,
            timeout: None,
        }
    }

    /// Request the captured stdout of `command`
    pub fn stdout(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            mode: OutputMode::Stdout,
            timeout: None,
        }
    }

    /// Request a background launch of `command`
    pub fn detached(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            mode: OutputMode::Detached,
            timeout: None,
        }
    }

    /// Set a per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command line actually handed to the remote shell
    #[must_use]
    pub fn shell_command(&self) -> String {
        match self.mode {
            OutputMode::ExitStatus | OutputMode::Stdout => self.command.clone(),
            OutputMode::Detached => format!("( {} ) </dev/null >/dev/null 2>&1 &", self.command),
        }
    }
}

/// Normalized result of a [`CommandRequest`]
///
/// Exactly one shape is meaningful per request, chosen by its [`OutputMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResult {
    /// Process exit status
    ExitStatus(i32),
    /// Trimmed stdout
    Stdout(String),
}

impl CommandResult {
    /// Derive the result a request asked for from a raw execution record
    #[must_use]
    pub fn from_output(mode: OutputMode, output: ExecOutput) -> Self {
        match mode {
            OutputMode::ExitStatus | OutputMode::Detached => Self::ExitStatus(output.status),
            OutputMode::Stdout => Self::Stdout(output.trimmed_stdout().to_string()),
        }
    }

    /// Exit status, if this is a status result
    #[must_use]
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::ExitStatus(status) => Some(*status),
            Self::Stdout(_) => None,
        }
    }

    /// Captured stdout, if this is a capture result
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Stdout(text) => Some(text),
            Self::ExitStatus(_) => None,
        }
    }
}

/// Connection information for SSH
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Username
    pub user: String,
    /// Time allowed to establish the TCP and SSH handshake
    pub connect_timeout: Duration,
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
