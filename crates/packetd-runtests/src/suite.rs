//! Test suite trait and check outcomes

use async_trait::async_trait;
use packetd_remote::{ExecError, RemoteSession};
use thiserror::Error;

/// Why a check did not pass
#[derive(Error, Debug, Clone)]
pub enum CheckFailure {
    /// The client answered, but not as expected
    #[error("{0}")]
    Assertion(String),

    /// The command could not be run at all
    #[error("execution error: {0}")]
    Exec(#[from] ExecError),

    /// The suite has no check by this name
    #[error("unknown check: {0}")]
    UnknownCheck(String),
}

impl CheckFailure {
    /// Whether the failure points at the harness rather than the client's state
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CheckFailure::Exec(e) if e.is_transport())
    }
}

/// A named, ordered collection of checks run against one session
#[async_trait]
pub trait TestSuite: Send + Sync {
    /// Name the suite is registered under
    fn name(&self) -> &'static str;

    /// Check names, in run order
    fn checks(&self) -> &'static [&'static str];

    /// Run a single check
    async fn run_check(&self, name: &str, session: &RemoteSession) -> Result<(), CheckFailure>;

    /// Stop the suite at the first failed check
    fn fail_fast(&self) -> bool {
        false
    }
}

/// Assert that `command` exits with `expected`
///
/// # Errors
/// `Assertion` on a different status, `Exec` if the command could not run
pub async fn expect_status(
    session: &RemoteSession,
    command: &str,
    expected: i32,
) -> Result<(), CheckFailure> {
    let status = session.run_status(command).await?;
    if status == expected {
        Ok(())
    } else {
        Err(CheckFailure::Assertion(format!(
            "`{command}` exited {status}, expected {expected}"
        )))
    }
}
