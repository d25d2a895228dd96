//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use super::config::{ReportFormat, RunConfig};
use super::test_interfaces::{NixArtifactResolver, NixSimulationInvoker, SystemCommandRunner};
use super::test_runner::{self, ConsoleReporter, JsonReporter, TestReporter};
use super::{CliError, CliResult, ExitCode};

fn command_runner(config: &RunConfig) -> SystemCommandRunner {
    SystemCommandRunner::new(config.harness.color, config.harness.format == ReportFormat::Json)
}

/// Run the selected tests and report.
///
/// Exits non-zero when any test failed or errored, so CI can gate on the harness itself.
pub fn run_suite(config: &RunConfig) -> CliResult<ExitCode> {
    let runner = command_runner(config);
    let resolver = NixArtifactResolver::new(&runner);
    let invoker = NixSimulationInvoker::new(&runner);

    let mut reporter: Box<dyn TestReporter> = match config.harness.format {
        ReportFormat::Text => Box::new(ConsoleReporter::stdout(config.harness.color)),
        ReportFormat::Json => Box::new(JsonReporter::stdout()),
    };

    let summary = test_runner::run_tests(config, &resolver, &invoker, reporter.as_mut()).map_err(|e| {
        if e.is_setup_error() {
            tracing::error!(selector = %config.selector, "no tests were run");
        }
        CliError::from(e)
    })?;

    if summary.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// Print the test binaries a run would execute, one per line.
pub fn list_suite(config: &RunConfig) -> CliResult<ExitCode> {
    let runner = command_runner(config);
    let resolver = NixArtifactResolver::new(&runner);

    let (dir, tests) = test_runner::list_tests(config, &resolver)?;
    match config.harness.format {
        ReportFormat::Text => {
            for test in &tests {
                println!("{}", test);
            }
        }
        ReportFormat::Json => {
            let doc = serde_json::json!({
                "dir": dir.display().to_string(),
                "tests": tests,
            });
            println!("{:#}", doc);
        }
    }
    tracing::debug!(dir = %dir.display(), count = tests.len(), "listed tests");
    Ok(ExitCode::SUCCESS)
}
