//! Connectivity probe for the test client
//!
//! Collapses several outbound reachability checks into a single status:
//! `0` when any probe succeeds, the last failing status otherwise.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::control::RemoteControl;
use crate::error::ExecError;
use crate::result::TIMEOUT_STATUS;

/// Probe targets and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Commands run in order; any one exiting 0 means online
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
    /// Rounds over the full target list before giving up
    #[serde(default = "default_tries")]
    pub tries: u32,
    /// Pause between rounds
    #[serde(rename = "pause_ms", default = "default_pause", with = "millis")]
    pub pause: Duration,
    /// Time a single probe command may run
    #[serde(
        rename = "probe_timeout_ms",
        default = "default_probe_timeout",
        with = "millis"
    )]
    pub probe_timeout: Duration,
}

fn default_targets() -> Vec<String> {
    vec![
        "wget -q -O /dev/null -4 -t 2 --timeout=5 http://test.untangle.com/".to_string(),
        "host google.com 8.8.8.8".to_string(),
        "ping -W5 -c1 4.2.2.1".to_string(),
    ]
}

fn default_tries() -> u32 {
    2
}

fn default_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(15)
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            tries: default_tries(),
            pause: default_pause(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Answers "can the test client reach the outside network"
#[derive(Debug, Clone)]
pub struct ConnectivityProber {
    control: RemoteControl,
    config: ProbeConfig,
}

impl ConnectivityProber {
    /// Create a prober with the default targets
    pub fn new(control: RemoteControl) -> Self {
        Self {
            control,
            config: ProbeConfig::default(),
        }
    }

    /// Replace targets and retry policy
    #[must_use]
    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    /// Current probe configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe the client's outbound connectivity
    ///
    /// Returns `0` as soon as one probe succeeds. When every probe in every
    /// round fails, returns the status of the last failure; a probe cut off by
    /// its timeout counts as status 124.
    ///
    /// # Errors
    /// Only transport failures to the client itself propagate
    /// (`ConnectionFailed`, `AuthenticationFailed`). `ConfigError` if no
    /// targets are configured.
    #[instrument(skip(self), fields(targets = self.config.targets.len(), tries = self.config.tries))]
    pub async fn is_online(&self) -> Result<i32, ExecError> {
        if self.config.targets.is_empty() {
            return Err(ExecError::ConfigError(
                "no connectivity probe targets configured".to_string(),
            ));
        }

        let rounds = self.config.tries.max(1);
        let mut last_status = 1;

        for round in 1..=rounds {
            for target in &self.config.targets {
                let status = match self
                    .control
                    .run_status_with_timeout(target, self.config.probe_timeout)
                    .await
                {
                    Ok(status) => status,
                    Err(ExecError::Timeout { timeout }) => {
                        warn!(probe = %target, timeout = ?timeout, "probe timed out");
                        TIMEOUT_STATUS
                    }
                    Err(e) => {
                        warn!(
                            probe = %target,
                            error = %e,
                            retryable = e.is_retryable(),
                            "client unreachable, abandoning probes"
                        );
                        return Err(e);
                    }
                };

                if status == 0 {
                    info!(probe = %target, round, "client is online");
                    return Ok(0);
                }

                debug!(probe = %target, round, status, "probe failed");
                last_status = status;
            }

            if round < rounds {
                tokio::time::sleep(self.config.pause).await;
            }
        }

        warn!(status = last_status, "client is offline");
        Ok(last_status)
    }
}
