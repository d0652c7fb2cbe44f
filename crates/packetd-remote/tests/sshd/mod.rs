//! Throwaway OpenSSH server for exercising the SSH backend

use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Time allowed for sshd to start listening
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts at finding a free port before giving up
const SPAWN_RETRY_CNT: usize = 3;

/// Fallback locations when sshd is not on PATH, as for non-root users
const SBIN_PATHS: &[&str] = &["/usr/sbin/sshd", "/usr/local/sbin/sshd", "/sbin/sshd"];

/// sshd listening on 127.0.0.1, accepting one generated key for the current user
pub struct Sshd {
    child: Child,
    pub port: u16,
    /// Private key authorized for `user`
    pub key: PathBuf,
    pub user: String,
    log_file: PathBuf,
    _tmp: TempDir,
}

impl Sshd {
    /// Start a server, or `None` when OpenSSH is not installed or will not run here
    pub fn spawn() -> Option<Self> {
        let Some(bin) = sshd_path() else {
            eprintln!("sshd not installed, skipping");
            return None;
        };
        if which::which("ssh-keygen").is_err() {
            eprintln!("ssh-keygen not installed, skipping");
            return None;
        }

        let tmp = tempfile::tempdir().ok()?;
        let key = tmp.path().join("id_ed25519");
        let host_key = tmp.path().join("ssh_host_ed25519_key");
        if !keygen(&key) || !keygen(&host_key) {
            eprintln!("ssh-keygen failed, skipping");
            return None;
        }

        let authorized_keys = tmp.path().join("authorized_keys");
        std::fs::copy(key.with_extension("pub"), &authorized_keys).ok()?;

        let config_file = tmp.path().join("sshd_config");
        std::fs::write(
            &config_file,
            sshd_config(&host_key, &authorized_keys, &tmp.path().join("sshd.pid")),
        )
        .ok()?;
        let log_file = tmp.path().join("sshd.log");

        let user = whoami::username();
        if user == "root" {
            // privilege separation directory on Debian-like systems
            let _ = std::fs::create_dir_all("/run/sshd");
        }

        for _ in 0..SPAWN_RETRY_CNT {
            let port = free_port()?;
            let child = Command::new(&bin)
                .arg("-D")
                .arg("-p")
                .arg(port.to_string())
                .arg("-f")
                .arg(&config_file)
                .arg("-E")
                .arg(&log_file)
                .stdin(Stdio::null())
                .spawn()
                .ok()?;

            if let Some(child) = wait_listening(child, port) {
                return Some(Self {
                    child,
                    port,
                    key,
                    user,
                    log_file,
                    _tmp: tmp,
                });
            }
        }

        eprintln!(
            "sshd would not start, skipping\n{}",
            std::fs::read_to_string(&log_file).unwrap_or_default()
        );
        None
    }

    /// Server log, for failure messages
    pub fn log(&self) -> String {
        std::fs::read_to_string(&self.log_file).unwrap_or_default()
    }
}

impl Drop for Sshd {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn sshd_path() -> Option<PathBuf> {
    which::which("sshd").ok().or_else(|| {
        SBIN_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    })
}

// ssh-keygen -t ed25519 -f $PATH -N "" -q
fn keygen(path: &Path) -> bool {
    Command::new("ssh-keygen")
        .args(["-t", "ed25519"])
        .arg("-f")
        .arg(path)
        .args(["-N", "", "-q"])
        .stdin(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

fn sshd_config(host_key: &Path, authorized_keys: &Path, pid_file: &Path) -> String {
    format!(
        "ListenAddress 127.0.0.1\n\
         HostKey {}\n\
         AuthorizedKeysFile {}\n\
         PidFile {}\n\
         AuthenticationMethods publickey\n\
         PubkeyAuthentication yes\n\
         PasswordAuthentication no\n\
         KbdInteractiveAuthentication no\n\
         UsePAM no\n\
         StrictModes no\n\
         MaxStartups 50\n\
         LogLevel VERBOSE\n",
        host_key.display(),
        authorized_keys.display(),
        pid_file.display(),
    )
}

fn free_port() -> Option<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).ok()?;
    listener.local_addr().ok().map(|addr| addr.port())
}

/// Wait until `child` accepts connections on `port`, or reap it if it exits
fn wait_listening(mut child: Child, port: u16) -> Option<Child> {
    let start = Instant::now();
    while start.elapsed() < STARTUP_TIMEOUT {
        if let Ok(Some(_)) = child.try_wait() {
            return None;
        }
        if TcpStream::connect((Ipv4Addr::LOCALHOST, port)).is_ok() {
            return Some(child);
        }
        thread::sleep(Duration::from_millis(50));
    }

    let _ = child.kill();
    let _ = child.wait();
    None
}
