//! Sequential suite runner

use std::time::{Duration, Instant};

use packetd_remote::RemoteSession;
use tracing::{error, info};

use crate::suite::{CheckFailure, TestSuite};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Which checks to run, by name
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TestFilter {
    /// Empty `include` or one containing `all` selects every check
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn selects(&self, name: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|n| n == "all" || n == name);
        included && !self.exclude.iter().any(|n| n == name)
    }
}

/// Result of one check
#[derive(Debug)]
pub struct CheckReport {
    pub name: String,
    pub failure: Option<CheckFailure>,
}

/// Result of one suite run
#[derive(Debug)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub checks: Vec<CheckReport>,
    pub elapsed: Duration,
    /// Stopped early on a failure
    pub aborted: bool,
}

impl SuiteReport {
    pub fn failed(&self) -> usize {
        self.checks.iter().filter(|c| c.failure.is_some()).count()
    }

    pub fn passed(&self) -> usize {
        self.checks.len() - self.failed()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Run the selected checks of `suite` one after another
///
/// Stops at the first failure when `fast_fail` is set or the suite asks for it.
pub async fn run_suite(
    suite: &dyn TestSuite,
    session: &RemoteSession,
    filter: &TestFilter,
    fast_fail: bool,
) -> SuiteReport {
    let fast_fail = fast_fail || suite.fail_fast();
    let suite_start = Instant::now();
    let mut checks = Vec::new();
    let mut aborted = false;

    println!("== testing {} ==", suite.name());

    for name in suite.checks().iter().filter(|n| filter.selects(n)) {
        info!(check = %name, at = %chrono::Local::now().format(TIMESTAMP_FORMAT), "start");
        let start = Instant::now();

        let failure = suite.run_check(name, session).await.err();
        let elapsed = start.elapsed();

        info!(check = %name, at = %chrono::Local::now().format(TIMESTAMP_FORMAT), "end");

        let timing = format!("[{:.1}s]", elapsed.as_secs_f64());
        let failed = match &failure {
            None => {
                println!("Test success : {name} {timing}");
                false
            }
            Some(e) => {
                error!(check = %name, error = %e, infrastructure = e.is_infrastructure(), "check failed");
                println!("Test FAILED  : {name} {timing}");
                true
            }
        };

        checks.push(CheckReport {
            name: (*name).to_string(),
            failure,
        });

        if failed && fast_fail {
            aborted = true;
            break;
        }
    }

    let elapsed = suite_start.elapsed();
    println!("== testing {} [{:.1}s] ==", suite.name(), elapsed.as_secs_f64());

    SuiteReport {
        suite: suite.name(),
        checks,
        elapsed,
        aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentSuite;
    use crate::testing::{StubClient, session_over};

    #[test]
    fn test_filter() {
        let all = TestFilter::default();
        assert!(all.selects("test_10_client_connectivity"));

        let only = TestFilter::new(vec!["test_12_client_shell_output".to_string()], vec![]);
        assert!(only.selects("test_12_client_shell_output"));
        assert!(!only.selects("test_10_client_connectivity"));

        let excluded = TestFilter::new(
            vec!["all".to_string()],
            vec!["test_14_client_is_online".to_string()],
        );
        assert!(excluded.selects("test_00_basic_test"));
        assert!(!excluded.selects("test_14_client_is_online"));
    }

    #[tokio::test]
    async fn test_all_checks_pass() {
        let session = session_over(StubClient::provisioned()).await;
        let report = run_suite(&EnvironmentSuite, &session, &TestFilter::default(), false).await;

        assert!(report.success());
        assert!(!report.aborted);
        assert_eq!(report.passed(), EnvironmentSuite.checks().len());
    }

    #[tokio::test]
    async fn test_environment_stops_at_first_failure() {
        let client = StubClient::provisioned().status("/bin/true", 255);
        let session = session_over(client).await;
        let report = run_suite(&EnvironmentSuite, &session, &TestFilter::default(), false).await;

        assert!(report.aborted);
        assert_eq!(report.failed(), 1);
        let last = report.checks.last().unwrap();
        assert_eq!(last.name, "test_10_client_connectivity");
    }

    #[tokio::test]
    async fn test_filtered_run() {
        let session = session_over(StubClient::provisioned().offline()).await;
        let filter = TestFilter::new(vec![], vec!["test_14_client_is_online".to_string()]);
        let report = run_suite(&EnvironmentSuite, &session, &filter, false).await;

        assert!(report.success());
        assert_eq!(report.checks.len(), EnvironmentSuite.checks().len() - 1);
    }
}
