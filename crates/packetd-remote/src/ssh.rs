//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{Channel, ChannelMsg, Disconnect, Sig, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::credentials::{Credential, ResolvedCredential};
use crate::error::ExecError;
use crate::result::{ConnectionInfo, ExecOutput};
use crate::traits::RemoteExecutor;

/// Keepalive interval, as `ServerAliveInterval=2`
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);
/// Missed keepalives before the session is considered dead
const KEEPALIVE_MAX: usize = 3;

type Session = client::Handle<SshClientHandler>;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Test clients are reprovisioned often; host keys are not pinned
        Ok(true)
    }
}

/// SSH command executor
///
/// Holds at most one SSH session to the test client. The session is opened
/// on first use, reused while it stays alive, and dropped on transport
/// failure so the next command reconnects.
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Resolved login credential
    credential: ResolvedCredential,
    /// SSH session (initialized on first use)
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("credential", &self.credential)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// # Errors
    /// Returns `ExecError::CredentialError` if the credential cannot be resolved
    pub fn new(conn_info: ConnectionInfo, credential: &Credential) -> Result<Self, ExecError> {
        let credential = credential
            .resolve()
            .map_err(|e| ExecError::CredentialError(e.to_string()))?;

        Ok(Self {
            conn_info,
            credential,
            session: Mutex::new(None),
        })
    }

    /// Make sure `slot` holds a live, authenticated session
    #[instrument(skip(self, slot), fields(host = %self.conn_info.host))]
    async fn ensure_session<'a>(
        &self,
        slot: &'a mut Option<Session>,
    ) -> Result<&'a Session, ExecError> {
        if slot.as_ref().is_some_and(Session::is_closed) {
            warn!(host = %self.conn_info.host, "SSH session closed, reconnecting");
            *slot = None;
        }

        if slot.is_none() {
            *slot = Some(self.open_session().await?);
        }

        slot.as_ref()
            .ok_or_else(|| ExecError::ConnectionFailed("no session".to_string()))
    }

    async fn open_session(&self) -> Result<Session, ExecError> {
        let host = &self.conn_info.host;
        let port = self.conn_info.port;

        info!(
            host = %host,
            port = port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        });

        let connect = client::connect(config, (&host[..], port), SshClientHandler);
        let mut session = match timeout(self.conn_info.connect_timeout, connect).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Err(ExecError::ConnectionFailed(format!(
                    "{host}:{port}: {e}"
                )));
            }
            Err(_) => {
                return Err(ExecError::ConnectionFailed(format!(
                    "{host}:{port}: no response after {:?}",
                    self.conn_info.connect_timeout
                )));
            }
        };

        self.authenticate(&mut session).await?;

        info!(host = %host, "SSH connected and authenticated");
        Ok(session)
    }

    async fn authenticate(&self, session: &mut Session) -> Result<(), ExecError> {
        let user = &self.conn_info.user;

        let auth_res = if let Some(key_path) = self.credential.key_path() {
            let key_pair = load_secret_key(key_path, None)
                .map_err(|e| ExecError::CredentialError(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            session
                .authenticate_publickey(
                    user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
        } else if let Some(password) = self.credential.password() {
            session
                .authenticate_password(user, password)
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
        } else {
            return Err(ExecError::AuthenticationFailed(
                "no authentication method available".to_string(),
            ));
        };

        if auth_res.success() {
            Ok(())
        } else {
            Err(ExecError::AuthenticationFailed(format!(
                "{user}@{} rejected credentials",
                self.conn_info.host
            )))
        }
    }

    /// Run `cmd` under the session lock, optionally bounded by `limit`
    async fn run_locked(
        &self,
        cmd: &str,
        limit: Option<Duration>,
    ) -> Result<ExecOutput, ExecError> {
        let mut slot = self.session.lock().await;

        // connecting is bounded by the connect timeout, not the command timeout
        let session = self.ensure_session(&mut slot).await?;

        let result = match open_channel(session).await {
            Err(e) => Err(e),
            Ok(mut channel) => match limit {
                None => execute_remote(&mut channel, cmd).await,
                Some(limit) => {
                    let start = Instant::now();
                    match timeout(limit, execute_remote(&mut channel, cmd)).await {
                        Ok(result) => result,
                        Err(_) => {
                            error!(
                                command = %cmd,
                                timeout = ?limit,
                                elapsed = ?start.elapsed(),
                                "command timed out"
                            );
                            // the remote process is left running; only the channel is released
                            if let Err(e) = channel.close().await {
                                debug!(error = %e, "failed to close timed out channel");
                            }
                            Err(ExecError::Timeout { timeout: limit })
                        }
                    }
                }
            },
        };

        if let Err(e) = &result
            && e.is_transport()
        {
            warn!(host = %self.conn_info.host, error = %e, "dropping SSH session");
            *slot = None;
        }

        result
    }
}

async fn open_channel(session: &Session) -> Result<Channel<client::Msg>, ExecError> {
    session
        .channel_open_session()
        .await
        .map_err(|e| ExecError::ConnectionFailed(format!("open channel: {e}")))
}

/// Execute command on an open session channel
async fn execute_remote(
    channel: &mut Channel<client::Msg>,
    cmd: &str,
) -> Result<ExecOutput, ExecError> {
    debug!(command = %cmd, "executing remote command");

    let start = Instant::now();

    channel
        .exec(true, cmd)
        .await
        .map_err(|e| ExecError::ConnectionFailed(format!("exec request: {e}")))?;

    let mut status: Option<i32> = None;
    let mut got_eof = false;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => {
                stdout.extend_from_slice(data);
            }
            ChannelMsg::ExtendedData { ref data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                status = Some(exit_status.cast_signed());
                if got_eof {
                    break;
                }
            }
            ChannelMsg::ExitSignal {
                ref signal_name, ..
            } => {
                status = Some(signal_status(signal_name));
                if got_eof {
                    break;
                }
            }
            ChannelMsg::Eof => {
                got_eof = true;
                if status.is_some() {
                    break;
                }
            }
            _ => {}
        }
    }

    let status = status.ok_or_else(|| {
        ExecError::ConnectionFailed("channel closed without exit status".to_string())
    })?;

    let duration = start.elapsed();

    debug!(
        command = %cmd,
        status = status,
        duration = ?duration,
        "remote command completed"
    );

    Ok(ExecOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        duration,
    })
}

/// Status a POSIX shell reports for a command killed by `sig`
fn signal_status(sig: &Sig) -> i32 {
    let signo = match sig {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => return 255,
    };
    128 + signo
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run(&self, cmd: &str) -> Result<ExecOutput, ExecError> {
        self.run_locked(cmd, None).await
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<ExecOutput, ExecError> {
        self.run_locked(cmd, Some(timeout_duration)).await
    }

    async fn connect(&self) -> Result<(), ExecError> {
        let mut slot = self.session.lock().await;
        self.ensure_session(&mut slot).await.map(|_| ())
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // a command in flight holds the lock, which implies a live session
        self.session
            .try_lock()
            .map(|s| s.as_ref().is_some_and(|h| !h.is_closed()))
            .unwrap_or(true)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Builder for `SshExecutor`
pub struct SshExecutorBuilder {
    conn_info: ConnectionInfo,
    credential: Option<Credential>,
}

impl SshExecutorBuilder {
    /// Create builder with required fields
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            conn_info: ConnectionInfo::new(host, user),
            credential: None,
        }
    }

    /// Set SSH key path
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.credential = Some(Credential::KeyFile(path.into()));
        self
    }

    /// Set key from environment variable (base64)
    #[must_use]
    pub fn with_env_key(mut self, var_name: impl Into<String>) -> Self {
        self.credential = Some(Credential::EnvKey(var_name.into()));
        self
    }

    /// Log in with a password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::Password(password.into()));
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.conn_info.port = port;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.conn_info.connect_timeout = timeout;
        self
    }

    /// Build the executor
    ///
    /// # Errors
    /// Returns `ExecError::ConfigError` if no credential was set, or
    /// `ExecError::CredentialError` if it cannot be resolved
    pub fn build(self) -> Result<SshExecutor, ExecError> {
        let credential = self.credential.ok_or_else(|| {
            ExecError::ConfigError(format!(
                "no credential configured for {}",
                self.conn_info.host
            ))
        })?;
        SshExecutor::new(self.conn_info, &credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port_executor() -> SshExecutor {
        // port 1 (tcpmux) is never served on test machines
        SshExecutorBuilder::new("127.0.0.1", "root")
            .with_port(1)
            .with_password("unused")
            .with_connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let executor = closed_port_executor();
        let result = executor.run("/bin/true").await;

        match result {
            Err(e) => assert!(e.is_transport(), "unexpected error: {e}"),
            Ok(output) => panic!("expected transport failure, got status {}", output.status),
        }
        assert!(!executor.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_session() {
        let executor = closed_port_executor();
        executor.disconnect().await.unwrap();
        assert!(!executor.is_connected());
    }

    #[test]
    fn test_builder_requires_credential() {
        let err = SshExecutorBuilder::new("192.0.2.2", "root").build().unwrap_err();
        assert!(matches!(err, ExecError::ConfigError(_)));
    }

    #[test]
    fn test_signal_status() {
        assert_eq!(signal_status(&Sig::KILL), 137);
        assert_eq!(signal_status(&Sig::TERM), 143);
        assert_eq!(signal_status(&Sig::Custom("WINCH".to_string())), 255);
    }
}
