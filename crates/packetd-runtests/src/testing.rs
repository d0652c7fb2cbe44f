//! Stub test client for suite and runner tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use packetd_remote::{
    ExecError, ExecOutput, ProbeConfig, RemoteControl, RemoteExecutor, RemoteSession,
};

pub const PROBE_TARGET: &str = "probe-target";

/// Answers every command with exit 0 and no output unless told otherwise
#[derive(Debug, Clone, Default)]
pub struct StubClient {
    replies: HashMap<String, (i32, String)>,
    unreachable: bool,
}

impl StubClient {
    /// A client set up the way the environment suite expects
    pub fn provisioned() -> Self {
        Self::default()
            .status("/bin/false", 1)
            .stdout("echo yay", "yay\n")
            .status("pidof openvpn", 1)
    }

    /// A client whose transport is down
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn status(mut self, cmd: &str, status: i32) -> Self {
        self.replies.insert(cmd.to_string(), (status, String::new()));
        self
    }

    pub fn stdout(mut self, cmd: &str, stdout: &str) -> Self {
        self.replies.insert(cmd.to_string(), (0, stdout.to_string()));
        self
    }

    pub fn offline(self) -> Self {
        self.status(PROBE_TARGET, 4)
    }
}

#[async_trait]
impl RemoteExecutor for StubClient {
    async fn run(&self, cmd: &str) -> Result<ExecOutput, ExecError> {
        if self.unreachable {
            return Err(ExecError::ConnectionFailed("no route to host".to_string()));
        }

        let (status, stdout) = self.replies.get(cmd).cloned().unwrap_or_default();
        Ok(ExecOutput {
            status,
            stdout,
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        self.run(cmd).await
    }

    fn executor_type(&self) -> &'static str {
        "stub"
    }
}

pub fn stub_probe() -> ProbeConfig {
    ProbeConfig {
        targets: vec![PROBE_TARGET.to_string()],
        tries: 1,
        pause: Duration::ZERO,
        probe_timeout: Duration::from_secs(1),
    }
}

pub fn stub_control(client: StubClient) -> RemoteControl {
    RemoteControl::new(Arc::new(client))
}

pub async fn session_over(client: StubClient) -> RemoteSession {
    RemoteSession::open(stub_control(client), stub_probe())
        .await
        .unwrap()
}
