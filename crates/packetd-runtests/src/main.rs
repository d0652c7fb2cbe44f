//! packetd test runner
//!
//! Checks that the remote test client behind the appliance is ready for the
//! packetd test suites.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use color_eyre::Result;
use packetd_remote::RemoteSession;

mod config;
mod environment;
mod factory;
mod logging;
mod registry;
mod runner;
mod suite;
#[cfg(test)]
mod testing;

use config::{Config, Overrides};
use environment::EnvironmentSuite;
use registry::SuiteRegistry;
use runner::TestFilter;

#[derive(Parser)]
#[command(name = "packetd-runtests")]
#[command(about = "Verify the packetd test client environment", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Client host IP (behind the appliance)
    #[arg(short = 'h', long = "host")]
    host: Option<String>,

    /// Client host SSH login
    #[arg(short = 'u', long = "user")]
    user: Option<String>,

    /// Client host SSH identity (key) file
    #[arg(short = 'i', long = "identity")]
    identity: Option<PathBuf>,

    /// Log file
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<PathBuf>,

    /// Configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Comma separated suites to run
    #[arg(short = 't', long = "suites", value_delimiter = ',', default_value = "environment")]
    suites: Vec<String>,

    /// Comma separated tests within suites to run
    #[arg(short = 'T', long = "tests", value_delimiter = ',')]
    tests: Vec<String>,

    /// Comma separated tests within suites to exclude
    #[arg(short = 'E', long = "exclude-tests", value_delimiter = ',')]
    exclude_tests: Vec<String>,

    /// Quit on first failure
    #[arg(short = 'q', long = "fast-fail")]
    fast_fail: bool,

    /// Verbose (can be specified more than once)
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply(Overrides {
        host: cli.host,
        user: cli.user,
        identity: cli.identity,
        log_file: cli.log_file,
    });

    logging::init(&config.log, cli.verbose)?;
    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        None => tracing::debug!("no config file found, using defaults"),
    }

    let mut registry = SuiteRegistry::new();
    EnvironmentSuite::register(&mut registry);

    let suites = cli
        .suites
        .iter()
        .map(|name| {
            registry.get(name).ok_or_else(|| {
                eyre::eyre!(
                    "Unable to find tests for \"{name}\" (known: {})",
                    registry.names().join(", ")
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let control = factory::create_control(&config.client)?;
    let addr = config.client.addr.clone();
    let filter = TestFilter::new(cli.tests, cli.exclude_tests);
    let fast_fail = cli.fast_fail;

    let reports = RemoteSession::scoped(control, config.probe.clone(), |session| async move {
        let mut reports = Vec::new();
        for suite in &suites {
            let report = runner::run_suite(suite.as_ref(), &session, &filter, fast_fail).await;
            let stop = report.aborted;
            reports.push(report);
            if stop {
                break;
            }
        }
        reports
    })
    .await
    .map_err(|e| eyre::eyre!("cannot reach test client {addr}: {e}"))?;

    let passed: usize = reports.iter().map(runner::SuiteReport::passed).sum();
    let failed: usize = reports.iter().map(runner::SuiteReport::failed).sum();

    let elapsed: f64 = reports.iter().map(|r| r.elapsed.as_secs_f64()).sum();

    println!();
    println!("Tests complete. [{elapsed:.1} seconds]");
    println!("{passed} passed, {failed} failed");
    for report in &reports {
        for check in &report.checks {
            if let Some(failure) = &check.failure {
                println!("  {}/{}: {failure}", report.suite, check.name);
            }
        }
    }

    if let Some(report) = reports
        .iter()
        .find(|r| r.suite == EnvironmentSuite::NAME && !r.success())
    {
        tracing::error!(failed = report.failed(), "environment checks failed");
        println!("The test environment is not configured correctly. Aborting...");
    }

    if let Some(file) = &config.log.file {
        println!("More details found in {}", file.display());
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
