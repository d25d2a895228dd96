//! Run configuration for the harness
//!
//! Everything the resolver, selector and invoker need is gathered into one immutable [`RunConfig`] built once from
//! the parsed command line. Nothing below the CLI layer looks at `std::env::args`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use simrun_core::TestSelector;

use super::Cli;
use super::test_interfaces::HarnessError;

/// Flag that switches the simulator into waveform-capturing mode.
pub const TRACE_FLAG: &str = "--trace";

/// Output format of the batch report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Line-oriented console report
    #[default]
    Text,
    /// One JSON document on stdout
    Json,
}

/// Cycle window and output path for waveform dumps in trace mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceWindow {
    pub dump_start: u64,
    pub dump_end: u64,
    pub wave_path: PathBuf,
}

impl Default for TraceWindow {
    fn default() -> Self {
        Self {
            dump_start: 0,
            dump_end: 1_000_000,
            wave_path: PathBuf::from("wave.fst"),
        }
    }
}

impl TraceWindow {
    /// Simulator plusargs for this window, in the order the simulator documents them.
    pub fn plusargs(&self) -> Vec<String> {
        vec![
            format!("+dump-start={}", self.dump_start),
            format!("+dump-end={}", self.dump_end),
            format!("+wave-path={}", self.wave_path.display()),
        ]
    }
}

/// Harness settings that do not come from the selector itself
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Flake reference prefixed to every installable (`<flake>#<attr>`)
    pub flake: String,
    /// Program used to resolve build outputs
    pub build_program: String,
    /// Program used to launch the simulator
    pub sim_program: String,
    /// Simulator attribute for plain runs
    pub sim_attr: String,
    /// Simulator attribute for trace runs
    pub trace_sim_attr: String,
    pub trace_window: TraceWindow,
    /// Name of the file the simulator writes its outcome code to
    pub outcome_file: PathBuf,
    /// Directory commands run in and where the outcome file appears
    pub work_dir: PathBuf,
    /// Run every prefix match instead of only the first
    pub all_matches: bool,
    /// Stop after the first failing test
    pub stop_on_fail: bool,
    pub color: bool,
    pub format: ReportFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            flake: ".".to_string(),
            build_program: "nix".to_string(),
            sim_program: "nix".to_string(),
            sim_attr: "cpu.verilated".to_string(),
            trace_sim_attr: "cpu.verilated-trace".to_string(),
            trace_window: TraceWindow::default(),
            outcome_file: PathBuf::from("exit_code.txt"),
            work_dir: PathBuf::from("."),
            all_matches: false,
            stop_on_fail: false,
            color: false,
            format: ReportFormat::Text,
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flake(mut self, flake: impl Into<String>) -> Self {
        self.flake = flake.into();
        self
    }

    /// Use the same program for both build resolution and simulation
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        let program = program.into();
        self.build_program = program.clone();
        self.sim_program = program;
        self
    }

    pub fn with_trace_window(mut self, window: TraceWindow) -> Self {
        self.trace_window = window;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_all_matches(mut self, all_matches: bool) -> Self {
        self.all_matches = all_matches;
        self
    }

    pub fn with_stop_on_fail(mut self, stop_on_fail: bool) -> Self {
        self.stop_on_fail = stop_on_fail;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// `<flake>#<attr>`
    pub fn installable(&self, attr: &str) -> String {
        format!("{}#{}", self.flake, attr)
    }

    /// Full path of the outcome side-channel file
    pub fn outcome_path(&self) -> PathBuf {
        self.work_dir.join(&self.outcome_file)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Immutable per-invocation configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub selector: TestSelector,
    pub trace: bool,
    /// Arguments forwarded to the simulator, never containing [`TRACE_FLAG`]
    pub passthrough: Vec<String>,
    pub harness: HarnessConfig,
}

impl RunConfig {
    /// Build a config from a raw selector and forwarded arguments.
    ///
    /// A `--trace` found among the forwarded arguments turns trace mode on and is removed from them.
    pub fn new(
        selector: &str,
        trace: bool,
        passthrough: Vec<String>,
        harness: HarnessConfig,
    ) -> Result<Self, HarnessError> {
        let selector = TestSelector::parse(selector).map_err(HarnessError::InvalidSelector)?;
        let trace = trace || passthrough.iter().any(|a| a == TRACE_FLAG);
        let passthrough = passthrough.into_iter().filter(|a| a != TRACE_FLAG).collect();
        Ok(Self {
            selector,
            trace,
            passthrough,
            harness,
        })
    }

    /// Single construction point from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self, HarnessError> {
        let defaults = TraceWindow::default();
        let window = TraceWindow {
            dump_start: cli.dump_start.unwrap_or(defaults.dump_start),
            dump_end: cli.dump_end.unwrap_or(defaults.dump_end),
            wave_path: cli.wave_path.clone().unwrap_or(defaults.wave_path),
        };
        let color = !cli.no_color
            && cli.format == ReportFormat::Text
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stdout().is_terminal();

        let harness = HarnessConfig::new()
            .with_flake(cli.flake.clone())
            .with_program(cli.nix_program.clone())
            .with_trace_window(window)
            .with_all_matches(cli.all_matches)
            .with_stop_on_fail(cli.stop_on_fail)
            .with_color(color)
            .with_format(cli.format);

        Self::new(&cli.selector, cli.trace, cli.passthrough.clone(), harness)
    }

    /// Simulator attribute for this run
    pub fn sim_attr(&self) -> &str {
        if self.trace {
            &self.harness.trace_sim_attr
        } else {
            &self.harness.sim_attr
        }
    }
}
