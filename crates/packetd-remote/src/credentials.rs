//! Test client credential resolution

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

static TEMP_KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where the login credential for the test client comes from
#[derive(Clone)]
pub enum Credential {
    /// Private key file (`-i <file>`)
    KeyFile(PathBuf),
    /// Base64-encoded private key held in an environment variable
    EnvKey(String),
    /// Plain password
    Password(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Credential::EnvKey(var) => f.debug_tuple("EnvKey").field(var).finish(),
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

impl Credential {
    /// Resolve the credential into something the SSH client can use
    ///
    /// For `EnvKey`, decodes base64 and writes the key to a private temp file
    ///
    /// # Errors
    /// Returns `CredentialError` if the env var is unset, the key is not valid
    /// base64, or a key file is missing or readable by others
    pub fn resolve(&self) -> Result<ResolvedCredential, CredentialError> {
        match self {
            Credential::KeyFile(path) => {
                validate_key_permissions(path)?;
                Ok(ResolvedCredential::KeyFile(path.clone()))
            }
            Credential::EnvKey(var_name) => {
                let encoded = env::var(var_name)
                    .map_err(|_| CredentialError::EnvNotSet(var_name.clone()))?;
                let key_data =
                    base64_decode(&encoded).map_err(|_| CredentialError::InvalidBase64)?;
                let temp_path = write_temp_key(&key_data)?;
                Ok(ResolvedCredential::TempKey(temp_path))
            }
            Credential::Password(password) => Ok(ResolvedCredential::Password(password.clone())),
        }
    }
}

/// Resolved credential
pub enum ResolvedCredential {
    /// Path to key file
    KeyFile(PathBuf),
    /// Temporary key file (deleted on drop)
    TempKey(PathBuf),
    /// Password
    Password(String),
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedCredential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            ResolvedCredential::TempKey(path) => f.debug_tuple("TempKey").field(path).finish(),
            ResolvedCredential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

impl ResolvedCredential {
    /// Key file path, if this is key based
    #[must_use]
    pub fn key_path(&self) -> Option<&Path> {
        match self {
            ResolvedCredential::KeyFile(p) | ResolvedCredential::TempKey(p) => Some(p),
            ResolvedCredential::Password(_) => None,
        }
    }

    /// Password, if this is password based
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        match self {
            ResolvedCredential::Password(p) => Some(p),
            _ => None,
        }
    }
}

impl Drop for ResolvedCredential {
    fn drop(&mut self) {
        if let ResolvedCredential::TempKey(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}

/// Credential resolution errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CredentialError::NotFound(path.display().to_string()),
        _ => CredentialError::Io(e),
    })?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(CredentialError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, CredentialError> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let seq = TEMP_KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = env::temp_dir().join(format!(
        "packetd_runtests_key_{}_{seq}",
        std::process::id()
    ));

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&temp_path)?;
    file.write_all(key_data)?;

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}
