//! Configuration loading and types

use std::path::{Path, PathBuf};

use packetd_remote::{ClientConfig, ProbeConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the test runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote test client
    #[serde(default)]
    pub client: ClientConfig,
    /// Connectivity probe targets and retries
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
    /// Write logs here instead of stderr
    pub file: Option<PathBuf>,
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values given on the command line, which win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub user: Option<String>,
    pub identity: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        let mut config = Self::parse(&content)
            .map_err(|e| eyre::eyre!("failed to parse {}: {e}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("PACKETD_RUNTESTS_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let mut paths = vec![
            PathBuf::from("packetd-runtests.toml"),
            PathBuf::from("/etc/packetd/runtests.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("packetd/runtests.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Apply command line values over the loaded file
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.client.addr = host;
        }
        if let Some(user) = overrides.user {
            self.client.user = user;
        }
        if let Some(identity) = overrides.identity {
            self.client.key_file = Some(identity);
        }
        if let Some(file) = overrides.log_file {
            self.log.file = Some(file);
        }
    }
}
