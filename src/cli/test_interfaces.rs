//! Test harness I/O boundary interfaces
//!
//! This module defines trait-based abstractions for the operations that leave the process:
//! - Build output resolution (`nix build` + output layout checks)
//! - Simulation (`nix run` of the simulator on one test binary)
//! - Process spawning itself, via [`CommandRunner`]
//!
//! External programs are described by [`ExternalCommand`] values (program plus ordered arguments) and never by
//! shell strings. Tests swap [`SystemCommandRunner`] for a fake to drive the harness without nix.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use miette::Diagnostic;
use simrun_core::{ELF_EXTENSION, SelectorError};
use thiserror::Error;

use super::config::RunConfig;
use super::test_runner::paint;

/// Errors that occur while resolving, selecting or running tests
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("build output path '{}' does not exist", .path.display())]
    #[diagnostic(
        code(simrun::build_artifact_not_found),
        help("check that the suite attribute exists and that the build printed its output path")
    )]
    BuildArtifactNotFound { path: PathBuf },

    #[error("test directory '{}' does not exist", .path.display())]
    #[diagnostic(
        code(simrun::test_subdirectory_missing),
        help("the suite's build output must contain a `test` directory with the compiled binaries")
    )]
    TestSubdirectoryMissing { path: PathBuf },

    #[error("{}", no_match_message(.dir, .prefix.as_deref()))]
    #[diagnostic(code(simrun::no_matching_test_binary))]
    NoMatchingTestBinary { dir: PathBuf, prefix: Option<String> },

    #[error("simulator reported unknown exit code {code}")]
    #[diagnostic(
        code(simrun::unknown_exit_code),
        help("known outcome codes are 0 (GoodTrap) through 4 (Unknown)")
    )]
    UnknownExitCode { code: i32 },

    #[error("simulator did not write '{}' (process exit status {status})", .path.display())]
    #[diagnostic(code(simrun::missing_outcome_file))]
    MissingOutcomeFile { path: PathBuf, status: i32 },

    #[error("outcome file '{}' does not hold an integer: {contents:?}", .path.display())]
    #[diagnostic(code(simrun::malformed_outcome_file))]
    MalformedOutcomeFile { path: PathBuf, contents: String },

    #[error("invalid test selector: {0}")]
    #[diagnostic(code(simrun::invalid_selector), help("use `suite` or `suite/prefix`"))]
    InvalidSelector(SelectorError),

    #[error("failed to run '{program}'")]
    #[diagnostic(code(simrun::command_spawn))]
    CommandSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on '{}'", .path.display())]
    #[diagnostic(code(simrun::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn no_match_message(dir: &Path, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!(
            "no {} files starting with '{}' found in '{}'",
            ELF_EXTENSION,
            prefix,
            dir.display()
        ),
        None => format!("no {} files found in '{}'", ELF_EXTENSION, dir.display()),
    }
}

impl HarnessError {
    /// Setup errors abort the run before any test executes.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            HarnessError::BuildArtifactNotFound { .. }
                | HarnessError::TestSubdirectoryMissing { .. }
                | HarnessError::NoMatchingTestBinary { .. }
                | HarnessError::InvalidSelector(_)
        )
    }
}

// ============================================================================
// External Commands
// ============================================================================

/// A program and its ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Renders the command the way an operator would type it, quoting arguments a shell would split.
impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a command whose stdout was captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub status: i32,
    pub stdout: String,
}

/// Spawn external commands and wait for them.
pub trait CommandRunner {
    /// Run to completion, capturing stdout. Stderr is inherited.
    fn capture(&self, command: &ExternalCommand) -> Result<CapturedOutput, HarnessError>;

    /// Run to completion with inherited stdio, returning the normalized exit status.
    fn status(&self, command: &ExternalCommand) -> Result<i32, HarnessError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn capture(&self, command: &ExternalCommand) -> Result<CapturedOutput, HarnessError> {
        (**self).capture(command)
    }

    fn status(&self, command: &ExternalCommand) -> Result<i32, HarnessError> {
        (**self).status(command)
    }
}

/// Map a process exit status to the conventional 0-255 range.
///
/// Signal-terminated processes map to `128 + signal` on Unix and to 255 elsewhere.
pub fn normalize_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code & 0xff;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    255
}

/// Runs commands on the host, echoing each command line before it starts.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    pub color: bool,
    /// Send echoed command lines and child stdout to stderr, keeping stdout for a machine-readable report
    pub stdout_to_stderr: bool,
}

impl SystemCommandRunner {
    pub fn new(color: bool, stdout_to_stderr: bool) -> Self {
        Self {
            color,
            stdout_to_stderr,
        }
    }

    /// The line printed before `command` starts.
    pub fn echo_line(&self, command: &ExternalCommand) -> String {
        paint("1;36", &command.to_string(), self.color)
    }

    fn echo(&self, command: &ExternalCommand) {
        let line = self.echo_line(command);
        if self.stdout_to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn spawn_error(command: &ExternalCommand, source: io::Error) -> HarnessError {
        HarnessError::CommandSpawn {
            program: command.program.clone(),
            source,
        }
    }
}

impl CommandRunner for SystemCommandRunner {
    #[tracing::instrument(skip_all, fields(program = %command.program))]
    fn capture(&self, command: &ExternalCommand) -> Result<CapturedOutput, HarnessError> {
        self.echo(command);
        let output = command
            .to_command()
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| Self::spawn_error(command, e))?;
        Ok(CapturedOutput {
            status: normalize_status(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    #[tracing::instrument(skip_all, fields(program = %command.program))]
    fn status(&self, command: &ExternalCommand) -> Result<i32, HarnessError> {
        self.echo(command);
        let mut process = command.to_command();
        if self.stdout_to_stderr {
            process.stdout(Stdio::from(io::stderr()));
        }
        let status = process.status().map_err(|e| Self::spawn_error(command, e))?;
        Ok(normalize_status(status))
    }
}

// ============================================================================
// Artifact Resolver Interface
// ============================================================================

/// Turn a suite name into the directory holding its compiled test binaries.
pub trait ArtifactResolver {
    /// Returns the `test` directory inside the suite's build output.
    fn resolve(&self, config: &RunConfig) -> Result<PathBuf, HarnessError>;
}

/// `nix build --print-out-paths` based resolution.
pub struct NixArtifactResolver<R> {
    runner: R,
}

impl<R: CommandRunner> NixArtifactResolver<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

/// The build command for the configured suite.
pub fn build_command(config: &RunConfig) -> ExternalCommand {
    let harness = &config.harness;
    ExternalCommand::new(&harness.build_program)
        .args(["build", "--no-link", "--no-warn-dirty", "--print-out-paths"])
        .arg(harness.installable(&config.selector.suite))
        .current_dir(harness.work_dir())
}

/// Validate a build output path and return its `test` subdirectory.
pub fn test_dir_of(out_path: &Path) -> Result<PathBuf, HarnessError> {
    if out_path.as_os_str().is_empty() || !out_path.exists() {
        return Err(HarnessError::BuildArtifactNotFound {
            path: out_path.to_path_buf(),
        });
    }
    let test_dir = out_path.join("test");
    if !test_dir.is_dir() {
        return Err(HarnessError::TestSubdirectoryMissing { path: test_dir });
    }
    Ok(test_dir)
}

impl<R: CommandRunner> ArtifactResolver for NixArtifactResolver<R> {
    #[tracing::instrument(skip_all, fields(suite = %config.selector.suite))]
    fn resolve(&self, config: &RunConfig) -> Result<PathBuf, HarnessError> {
        let command = build_command(config);
        let output = self.runner.capture(&command)?;
        if output.status != 0 {
            tracing::warn!(status = output.status, "build command exited with non-zero status");
        }
        // A derivation with several outputs prints one path per line; the first is the default output.
        let out_path = output.stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        test_dir_of(Path::new(out_path))
    }
}

// ============================================================================
// Simulation Invoker Interface
// ============================================================================

/// Run one test binary through the simulator.
pub trait SimulationInvoker {
    /// Blocks until the simulator exits and returns its normalized exit status.
    ///
    /// The status is diagnostic only; the outcome itself is read from the outcome file.
    fn run(&self, binary: &Path, config: &RunConfig) -> Result<i32, HarnessError>;
}

/// `nix run` based simulation.
pub struct NixSimulationInvoker<R> {
    runner: R,
}

impl<R: CommandRunner> NixSimulationInvoker<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

/// The simulator command for one binary.
///
/// Trace plusargs come before forwarded arguments so the caller can override them.
pub fn simulation_command(binary: &Path, config: &RunConfig) -> ExternalCommand {
    let harness = &config.harness;
    let mut command = ExternalCommand::new(&harness.sim_program)
        .arg("run")
        .arg(harness.installable(config.sim_attr()))
        .args(["--no-warn-dirty", "--"])
        .arg(format!("+elf-file={}", binary.display()));
    if config.trace {
        command = command.args(harness.trace_window.plusargs());
    }
    command.args(config.passthrough.iter().cloned()).current_dir(harness.work_dir())
}

impl<R: CommandRunner> SimulationInvoker for NixSimulationInvoker<R> {
    #[tracing::instrument(skip_all, fields(binary = %binary.display(), trace = config.trace))]
    fn run(&self, binary: &Path, config: &RunConfig) -> Result<i32, HarnessError> {
        self.runner.status(&simulation_command(binary, config))
    }
}
