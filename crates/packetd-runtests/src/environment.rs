//! Environment suite: preconditions on the test client
//!
//! Verifies that the client is reachable, runs commands with correct
//! exit-code and output semantics, has the tools other suites rely on, is
//! online (TCP and UDP), and is not running a VPN client that would bypass
//! the appliance.

use std::sync::Arc;

use async_trait::async_trait;
use packetd_remote::RemoteSession;

use crate::registry::SuiteRegistry;
use crate::suite::{CheckFailure, TestSuite, expect_status};

/// Tools the other suites invoke on the client
pub const REQUIRED_TOOLS: &[&str] = &[
    "wget",
    "curl",
    "netcat",
    "nmap",
    "python",
    "mime-construct",
    "pidof",
    "host",
    "upnpc",
    "traceroute",
];

/// netcat options the other suites pass
pub const NETCAT_FLAGS: &[char] = &['d', 'z', 'w', 'l', '4', 'p'];

/// Resolvers queried over UDP
const UDP_LOOKUPS: &[&str] = &["host cnn.com 8.8.8.8", "host google.com 8.8.8.8"];

const CHECKS: &[&str] = &[
    "test_00_basic_test",
    "test_10_client_connectivity",
    "test_11_client_shell_return_code",
    "test_12_client_shell_output",
    "test_13_client_has_necessary_tools",
    "test_14_client_is_online",
    "test_15_client_is_online_udp",
    "test_16_client_not_running_openvpn",
];

/// Command that exits 0 when `netcat -h` documents `-<flag>`
pub fn netcat_flag_check(flag: char) -> String {
    format!(r"netcat -h 2>&1 | grep -q '\-{flag}\s'")
}

#[derive(Debug, Default)]
pub struct EnvironmentSuite;

impl EnvironmentSuite {
    pub const NAME: &'static str = "environment";

    pub fn register(registry: &mut SuiteRegistry) {
        registry.register(Self::NAME, Arc::new(Self));
    }

    async fn client_has_necessary_tools(session: &RemoteSession) -> Result<(), CheckFailure> {
        for tool in REQUIRED_TOOLS {
            let status = session.run_status(&format!("which {tool}")).await?;
            if status != 0 {
                return Err(CheckFailure::Assertion(format!(
                    "`{tool}` is not installed on the client"
                )));
            }
        }

        for flag in NETCAT_FLAGS {
            let status = session.run_status(&netcat_flag_check(*flag)).await?;
            if status != 0 {
                return Err(CheckFailure::Assertion(format!(
                    "netcat on the client does not support -{flag}"
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TestSuite for EnvironmentSuite {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn checks(&self) -> &'static [&'static str] {
        CHECKS
    }

    fn fail_fast(&self) -> bool {
        true
    }

    async fn run_check(&self, name: &str, session: &RemoteSession) -> Result<(), CheckFailure> {
        match name {
            "test_00_basic_test" => Ok(()),
            "test_10_client_connectivity" => expect_status(session, "/bin/true", 0).await,
            "test_11_client_shell_return_code" => expect_status(session, "/bin/false", 1).await,
            "test_12_client_shell_output" => {
                let output = session.run_stdout("echo yay").await?;
                if output == "yay" {
                    Ok(())
                } else {
                    Err(CheckFailure::Assertion(format!(
                        "`echo yay` printed {output:?}"
                    )))
                }
            }
            "test_13_client_has_necessary_tools" => Self::client_has_necessary_tools(session).await,
            "test_14_client_is_online" => {
                let status = session.is_online().await?;
                if status == 0 {
                    Ok(())
                } else {
                    Err(CheckFailure::Assertion(format!(
                        "client is offline (probe status {status})"
                    )))
                }
            }
            "test_15_client_is_online_udp" => {
                for lookup in UDP_LOOKUPS {
                    expect_status(session, lookup, 0).await?;
                }
                Ok(())
            }
            "test_16_client_not_running_openvpn" => {
                if session.run_status("pidof openvpn").await? == 0 {
                    Err(CheckFailure::Assertion(
                        "openvpn is running on the client".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
            other => Err(CheckFailure::UnknownCheck(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubClient, session_over};

    async fn run(client: StubClient, name: &str) -> Result<(), CheckFailure> {
        let session = session_over(client).await;
        EnvironmentSuite.run_check(name, &session).await
    }

    #[tokio::test]
    async fn test_provisioned_client_passes_everything() {
        let session = session_over(StubClient::provisioned()).await;
        for name in EnvironmentSuite.checks() {
            let result = EnvironmentSuite.run_check(name, &session).await;
            assert!(result.is_ok(), "{name} failed: {result:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_tool_is_named() {
        let client = StubClient::provisioned().status("which upnpc", 1);
        let err = run(client, "test_13_client_has_necessary_tools")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upnpc"), "{err}");
    }

    #[tokio::test]
    async fn test_netcat_without_flag() {
        let client = StubClient::provisioned().status(&netcat_flag_check('4'), 1);
        let err = run(client, "test_13_client_has_necessary_tools")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("-4"), "{err}");
    }

    #[tokio::test]
    async fn test_openvpn_running_fails() {
        let client = StubClient::provisioned().status("pidof openvpn", 0);
        let err = run(client, "test_16_client_not_running_openvpn")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckFailure::Assertion(_)));
    }

    #[tokio::test]
    async fn test_false_must_return_exactly_one() {
        let client = StubClient::provisioned().status("/bin/false", 2);
        assert!(run(client, "test_11_client_shell_return_code").await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_echo_output() {
        let client = StubClient::provisioned().stdout("echo yay", "yay yay\n");
        let err = run(client, "test_12_client_shell_output").await.unwrap_err();
        assert!(err.to_string().contains("yay yay"), "{err}");
    }

    #[tokio::test]
    async fn test_offline_client() {
        let client = StubClient::provisioned().offline();
        assert!(run(client, "test_14_client_is_online").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_client_is_infrastructure_failure() {
        let err = run(StubClient::unreachable(), "test_10_client_connectivity")
            .await
            .unwrap_err();
        assert!(err.is_infrastructure());
    }

    #[tokio::test]
    async fn test_unknown_check() {
        let err = run(StubClient::provisioned(), "test_99_nope").await.unwrap_err();
        assert!(matches!(err, CheckFailure::UnknownCheck(_)));
    }
}
