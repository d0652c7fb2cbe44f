#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use packetd_remote::{ExecError, ExecOutput, RemoteExecutor};

/// Canned outcome for one command
#[derive(Debug, Clone)]
pub enum Reply {
    Exit(i32, &'static str),
    Timeout,
    Refused,
}

/// Executor that answers from a script and records what it was asked
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: HashMap<String, Reply>,
    pub calls: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, cmd: &str, reply: Reply) -> Self {
        self.replies.insert(cmd.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, cmd: &str) -> Result<ExecOutput, ExecError> {
        self.calls.lock().unwrap().push(cmd.to_string());

        // unscripted commands exit 127 like an unknown command
        match self.replies.get(cmd).cloned().unwrap_or(Reply::Exit(127, "")) {
            Reply::Exit(status, stdout) => Ok(ExecOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            }),
            Reply::Timeout => Err(ExecError::Timeout {
                timeout: Duration::from_secs(1),
            }),
            Reply::Refused => Err(ExecError::ConnectionFailed("connection refused".to_string())),
        }
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        self.run(cmd).await
    }

    async fn connect(&self) -> Result<(), ExecError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}
