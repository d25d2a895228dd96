//! CLI module for the simrun harness
//!
//! ## Usage
//!
//! - `simrun <suite>` - run every test binary the suite builds
//! - `simrun <suite>/<prefix>` - run the first binary whose name starts with `prefix`
//! - `simrun <selector> --trace` - capture a waveform while simulating
//! - `simrun <selector> [SIM_ARGS]...` - forward extra arguments to the simulator
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `config` - `RunConfig` and harness settings
//! - `test_interfaces` - Build/simulator boundaries and the error taxonomy
//! - `test_runner` - Selection, batch loop and reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod test_interfaces;
pub mod test_runner;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::version::SIMRUN_VERSION;
use config::ReportFormat;
use test_interfaces::HarnessError;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Render a harness error with its diagnostic code and help text.
impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        let report = miette::Report::new(err);
        CliError::failure(format!("{:?}", report))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run compiled CPU test programs through the simulator
#[derive(Parser, Debug)]
#[command(name = "simrun")]
#[command(version = SIMRUN_VERSION)]
#[command(about = "Run compiled CPU test programs through the simulator", long_about = None)]
pub struct Cli {
    /// Tests to run: `suite` or `suite/prefix`
    #[arg(value_name = "SELECTOR")]
    pub selector: String,

    /// Arguments forwarded to the simulator verbatim (`--trace` is recognised anywhere)
    #[arg(value_name = "SIM_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub passthrough: Vec<String>,

    /// Capture a waveform with the trace-enabled simulator
    #[arg(long)]
    pub trace: bool,

    /// Flake providing the suite and simulator attributes
    #[arg(long, value_name = "FLAKE", default_value = ".")]
    pub flake: String,

    /// Program that provides `build` and `run` (a nix-compatible CLI)
    #[arg(long, value_name = "PROGRAM", default_value = "nix")]
    pub nix_program: String,

    /// First cycle of the waveform dump (trace mode)
    #[arg(long, value_name = "CYCLE")]
    pub dump_start: Option<u64>,

    /// Last cycle of the waveform dump (trace mode)
    #[arg(long, value_name = "CYCLE")]
    pub dump_end: Option<u64>,

    /// Waveform output file (trace mode)
    #[arg(long, value_name = "PATH")]
    pub wave_path: Option<PathBuf>,

    /// Run every binary matching the prefix, not only the first
    #[arg(long)]
    pub all_matches: bool,

    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub stop_on_fail: bool,

    /// Print the selected binaries without running them
    #[arg(long)]
    pub list: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = config::RunConfig::from_cli(&cli)?;
    if cli.list {
        commands::list_suite(&config)
    } else {
        commands::run_suite(&config)
    }
}

// ============================================================================
// Tests
// ============================================================================
