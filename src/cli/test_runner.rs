//! Test runner implementation
//!
//! ## TestReporter Trait
//!
//! The runner uses a `TestReporter` trait to separate reporting from execution. [`ConsoleReporter`] prints the
//! line-oriented report operators and CI scripts grep; [`JsonReporter`] emits one machine-readable document.
//!
//! ## I/O Boundaries
//!
//! Build resolution and simulation are abstracted via traits in `test_interfaces.rs`, so the batch loop here can be
//! driven by fakes in tests. The only filesystem access left in this module is listing the test directory and the
//! read-then-delete of the outcome file.
//!
//! ## Batch lifecycle
//!
//! Tests run strictly one after another in selection order. For each binary: clear any stale outcome file, invoke
//! the simulator, read and delete the outcome file, classify, record. Nothing is retried.

use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use simrun_core::{ExecutionOutcome, TestSelector, classify};

use super::config::RunConfig;
use super::test_interfaces::{ArtifactResolver, HarnessError, SimulationInvoker};
use crate::version::SIMRUN_VERSION;

/// Wrap `text` in an ANSI SGR sequence when `enabled`.
pub fn paint(sgr: &str, text: &str, enabled: bool) -> String {
    if enabled {
        format!("\x1b[{}m{}\x1b[0m", sgr, text)
    } else {
        text.to_string()
    }
}

// ============================================================================
// Verdicts and Summary
// ============================================================================

/// Result of running a single test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestVerdict {
    Passed,
    /// The simulator classified the run as anything other than a good trap
    Failed(ExecutionOutcome),
    /// The harness could not obtain a classification for this test
    Errored(String),
}

impl TestVerdict {
    pub fn from_outcome(outcome: ExecutionOutcome) -> Self {
        if outcome.is_pass() {
            TestVerdict::Passed
        } else {
            TestVerdict::Failed(outcome)
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, TestVerdict::Passed)
    }

    /// Reason text used in the failure list.
    pub fn reason(&self) -> String {
        match self {
            TestVerdict::Passed => ExecutionOutcome::GoodTrap.label().to_string(),
            TestVerdict::Failed(outcome) => outcome.label().to_string(),
            TestVerdict::Errored(message) => format!("Error: {}", message),
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    /// Failing tests in the order they ran
    pub failures: Vec<(String, TestVerdict)>,
}

impl RunSummary {
    pub fn record(&mut self, test: impl Into<String>, verdict: TestVerdict) {
        self.total += 1;
        if verdict.is_pass() {
            self.passed += 1;
        } else {
            self.failures.push((test.into(), verdict));
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Render the end-of-batch report.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        out.push('\n');
        out.push_str(&paint("1", "Test Results:", color));
        out.push('\n');
        out.push_str(&format!("Total: {}\n", self.total));
        out.push_str(&paint("1;32", &format!("Passed: {}", self.passed), color));
        out.push('\n');
        out.push_str(&paint("1;31", &format!("Failed: {}", self.failed()), color));
        out.push('\n');

        if !self.failures.is_empty() {
            out.push('\n');
            out.push_str(&paint("1;31", "Failed Tests:", color));
            out.push('\n');
            for (index, (test, verdict)) in self.failures.iter().enumerate() {
                let reason_color = match verdict {
                    TestVerdict::Failed(outcome) => outcome.info().color,
                    _ => "1;31",
                };
                out.push_str(&format!(
                    "  {} {} - reason: {}\n",
                    paint("1;36", &format!("{}.", index + 1), color),
                    paint("1;31", &format!("{:<15}", test), color),
                    paint(reason_color, &verdict.reason(), color),
                ));
            }
        }
        out
    }
}

// ============================================================================
// Test Reporter Trait
// ============================================================================

/// Trait for reporting batch progress and results.
pub trait TestReporter {
    /// Called once the binaries to run are known
    fn on_selection(&mut self, _dir: &Path, _tests: &[String]) {}

    /// Called before a test is handed to the simulator
    fn on_test_start(&mut self, test: &str);

    /// Called when a test has a verdict
    fn on_test_complete(&mut self, test: &str, verdict: &TestVerdict);

    /// Called when the batch has finished
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Log the first failed report write; later failures are dropped quietly.
fn note_write_error(already_failed: &mut bool, result: io::Result<()>) {
    if let Err(e) = result {
        if !*already_failed {
            *already_failed = true;
            tracing::warn!(error = %e, "report output could not be written");
        }
    }
}

/// Default console reporter
pub struct ConsoleReporter<W: Write> {
    out: W,
    pub color: bool,
    write_failed: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl Display) {
        let result = writeln!(self.out, "{}", text).and_then(|()| self.out.flush());
        note_write_error(&mut self.write_failed, result);
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_test_start(&mut self, test: &str) {
        let text = paint("1;36", &format!("Running: {}", test), self.color);
        self.line(text);
    }

    fn on_test_complete(&mut self, test: &str, verdict: &TestVerdict) {
        let text = match verdict {
            TestVerdict::Passed => paint("1;32", &format!("✓ {} PASSED", test), self.color),
            TestVerdict::Failed(outcome) => paint(
                "1;31",
                &format!("✗ {} FAILED (code {})", test, outcome.code()),
                self.color,
            ),
            TestVerdict::Errored(message) => {
                paint("1;31", &format!("✗ {} ERROR ({})", test, message), self.color)
            }
        };
        self.line(text);
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let text = summary.render(self.color);
        let result = write!(self.out, "{}", text).and_then(|()| self.out.flush());
        note_write_error(&mut self.write_failed, result);
    }
}

/// Machine-readable reporter (`--format json`)
pub struct JsonReporter<W: Write> {
    out: W,
    dir: Option<PathBuf>,
    write_failed: bool,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            dir: None,
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// JSON document for a finished batch.
pub fn summary_json(summary: &RunSummary) -> serde_json::Value {
    let failures: Vec<serde_json::Value> = summary
        .failures
        .iter()
        .enumerate()
        .map(|(index, (test, verdict))| {
            let code = match verdict {
                TestVerdict::Failed(outcome) => Some(outcome.code()),
                _ => None,
            };
            json!({
                "index": index + 1,
                "name": test,
                "reason": verdict.reason(),
                "code": code,
            })
        })
        .collect();

    json!({
        "version": SIMRUN_VERSION,
        "total": summary.total,
        "passed": summary.passed,
        "failed": summary.failed(),
        "failures": failures,
    })
}

impl<W: Write> TestReporter for JsonReporter<W> {
    fn on_selection(&mut self, dir: &Path, tests: &[String]) {
        tracing::info!(dir = %dir.display(), count = tests.len(), "selected tests");
        self.dir = Some(dir.to_path_buf());
    }

    fn on_test_start(&mut self, test: &str) {
        tracing::info!(test, "running");
    }

    fn on_test_complete(&mut self, test: &str, verdict: &TestVerdict) {
        tracing::info!(test, reason = %verdict.reason(), "finished");
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let mut doc = summary_json(summary);
        if let Some(dir) = &self.dir {
            doc["dir"] = json!(dir.display().to_string());
        }
        let result = writeln!(self.out, "{:#}", doc).and_then(|()| self.out.flush());
        note_write_error(&mut self.write_failed, result);
    }
}

// ============================================================================
// Selection
// ============================================================================

/// List the test binaries in `dir` that `selector` picks, in directory enumeration order.
///
/// With a prefix, only the first match is kept unless `all_matches` is set.
#[tracing::instrument(skip_all, fields(dir = %dir.display(), selector = %selector))]
pub fn select_tests(selector: &TestSelector, dir: &Path, all_matches: bool) -> Result<Vec<String>, HarnessError> {
    let io_err = |source: io::Error| HarnessError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut tests = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!(name = ?entry.file_name(), "skipping non UTF-8 file name");
            continue;
        };
        if !selector.matches(&name) || entry.path().is_dir() {
            continue;
        }
        tests.push(name);
    }

    if selector.prefix.is_some() && !all_matches {
        tests.truncate(1);
    }

    if tests.is_empty() {
        return Err(HarnessError::NoMatchingTestBinary {
            dir: dir.to_path_buf(),
            prefix: selector.prefix.clone(),
        });
    }
    tracing::debug!(count = tests.len(), "selected tests");
    Ok(tests)
}

/// Resolve the suite and select its tests without running anything.
pub fn list_tests(config: &RunConfig, resolver: &dyn ArtifactResolver) -> Result<(PathBuf, Vec<String>), HarnessError> {
    let dir = resolver.resolve(config)?;
    let tests = select_tests(&config.selector, &dir, config.harness.all_matches)?;
    Ok((dir, tests))
}

// ============================================================================
// Outcome side channel
// ============================================================================

/// Remove an outcome file left over from an earlier, interrupted run.
pub fn clear_stale_outcome(path: &Path) -> Result<(), HarnessError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "removed stale outcome file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(HarnessError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read the simulator's outcome code and delete the file.
///
/// `status` is the simulator's process exit status, carried into the error when the file is missing.
pub fn take_outcome(path: &Path, status: i32) -> Result<i32, HarnessError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(HarnessError::MissingOutcomeFile {
                path: path.to_path_buf(),
                status,
            });
        }
        Err(source) => {
            return Err(HarnessError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    fs::remove_file(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    contents.trim().parse::<i32>().map_err(|_| HarnessError::MalformedOutcomeFile {
        path: path.to_path_buf(),
        contents,
    })
}

// ============================================================================
// Batch driver
// ============================================================================

/// Resolve, select and run every test, reporting as each one finishes.
///
/// Setup errors are returned before any test runs. Per-test errors become [`TestVerdict::Errored`] and the batch
/// carries on unless `stop_on_fail` is set.
#[tracing::instrument(skip_all, fields(selector = %config.selector, trace = config.trace))]
pub fn run_tests(
    config: &RunConfig,
    resolver: &dyn ArtifactResolver,
    invoker: &dyn SimulationInvoker,
    reporter: &mut dyn TestReporter,
) -> Result<RunSummary, HarnessError> {
    let (dir, tests) = list_tests(config, resolver)?;
    reporter.on_selection(&dir, &tests);

    let mut summary = RunSummary::default();
    for test in tests {
        reporter.on_test_start(&test);
        let verdict = run_single_test(&dir.join(&test), config, invoker);
        reporter.on_test_complete(&test, &verdict);

        let stop = config.harness.stop_on_fail && !verdict.is_pass();
        summary.record(test, verdict);
        if stop {
            break;
        }
    }

    reporter.on_run_complete(&summary);
    Ok(summary)
}

fn run_single_test(binary: &Path, config: &RunConfig, invoker: &dyn SimulationInvoker) -> TestVerdict {
    match execute_test(binary, config, invoker) {
        Ok(outcome) => TestVerdict::from_outcome(outcome),
        Err(e) => {
            tracing::error!(binary = %binary.display(), error = %e, "test did not produce an outcome");
            TestVerdict::Errored(e.to_string())
        }
    }
}

fn execute_test(
    binary: &Path,
    config: &RunConfig,
    invoker: &dyn SimulationInvoker,
) -> Result<ExecutionOutcome, HarnessError> {
    let outcome_path = config.harness.outcome_path();
    clear_stale_outcome(&outcome_path)?;

    let status = invoker.run(binary, config)?;
    tracing::debug!(status, "simulator exited");

    let code = take_outcome(&outcome_path, status)?;
    classify(code).map_err(|e| HarnessError::UnknownExitCode { code: e.0 })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    // ========================================
    // Selection tests
    // ========================================

    #[test]
    fn test_select_all_binaries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["add.elf", "sub.elf", "mul.elf", "README.md"] {
            touch(dir.path(), name);
        }
        let selector = TestSelector::parse("rv64").unwrap();
        let mut tests = select_tests(&selector, dir.path(), false).unwrap();
        tests.sort();
        assert_eq!(tests, ["add.elf", "mul.elf", "sub.elf"]);
    }

    #[test]
    fn test_select_prefix_keeps_first_match_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["add.elf", "abs.elf", "sub.elf"] {
            touch(dir.path(), name);
        }
        let selector = TestSelector::parse("rv64/a").unwrap();
        let tests = select_tests(&selector, dir.path(), false).unwrap();
        assert_eq!(tests.len(), 1);

        let first_listed = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .find(|n| n.starts_with('a'))
            .unwrap();
        assert_eq!(tests[0], first_listed);
    }

    #[test]
    fn test_select_prefix_single_candidate() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["add.elf", "sub.elf", "mul.elf"] {
            touch(dir.path(), name);
        }
        let selector = TestSelector::parse("suite/a").unwrap();
        assert_eq!(select_tests(&selector, dir.path(), false).unwrap(), ["add.elf"]);
        assert_eq!(select_tests(&selector, dir.path(), true).unwrap(), ["add.elf"]);
    }

    #[test]
    fn test_select_prefix_all_matches() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["add.elf", "abs.elf", "sub.elf"] {
            touch(dir.path(), name);
        }
        let selector = TestSelector::parse("rv64/a").unwrap();
        let mut tests = select_tests(&selector, dir.path(), true).unwrap();
        tests.sort();
        assert_eq!(tests, ["abs.elf", "add.elf"]);
    }

    #[test]
    fn test_select_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested.elf")).unwrap();
        touch(dir.path(), "add.elf");
        let selector = TestSelector::parse("rv64").unwrap();
        assert_eq!(select_tests(&selector, dir.path(), false).unwrap(), ["add.elf"]);
    }

    #[test]
    fn test_select_empty_directory_fails_both_forms() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        for raw in ["rv64", "rv64/add"] {
            let selector = TestSelector::parse(raw).unwrap();
            let err = select_tests(&selector, dir.path(), false).unwrap_err();
            assert!(matches!(err, HarnessError::NoMatchingTestBinary { .. }), "{raw}: {err}");
        }
    }

    // ========================================
    // Outcome file tests
    // ========================================

    #[test]
    fn test_take_outcome_reads_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exit_code.txt");
        fs::write(&path, "3\n").unwrap();
        assert_eq!(take_outcome(&path, 0).unwrap(), 3);
        assert!(!path.exists());
    }

    #[test]
    fn test_take_outcome_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = take_outcome(&dir.path().join("exit_code.txt"), 139).unwrap_err();
        assert!(matches!(err, HarnessError::MissingOutcomeFile { status: 139, .. }));
    }

    #[test]
    fn test_take_outcome_malformed_file_is_still_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exit_code.txt");
        fs::write(&path, "good").unwrap();
        let err = take_outcome(&path, 0).unwrap_err();
        assert!(matches!(err, HarnessError::MalformedOutcomeFile { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_stale_outcome_is_quiet_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exit_code.txt");
        clear_stale_outcome(&path).unwrap();
        fs::write(&path, "0").unwrap();
        clear_stale_outcome(&path).unwrap();
        assert!(!path.exists());
    }

    // ========================================
    // Summary tests
    // ========================================

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record("add.elf", TestVerdict::Passed);
        summary.record("sub.elf", TestVerdict::Failed(ExecutionOutcome::Timeout));
        summary.record("mul.elf", TestVerdict::Errored("boom".to_string()));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed(), 2);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_render_without_failures_has_no_failure_list() {
        let mut summary = RunSummary::default();
        summary.record("add.elf", TestVerdict::Passed);
        let text = summary.render(false);
        assert_eq!(text, "\nTest Results:\nTotal: 1\nPassed: 1\nFailed: 0\n");
    }

    #[test]
    fn test_render_failure_line() {
        let mut summary = RunSummary::default();
        summary.record("sub.elf", TestVerdict::Failed(ExecutionOutcome::BadTrap));
        let text = summary.render(false);
        assert!(text.contains("  1. sub.elf         - reason: BadTrap\n"), "{text}");
    }

    #[test]
    fn test_errored_reason_is_not_bad_trap() {
        let verdict = TestVerdict::Errored("simulator did not write 'exit_code.txt'".to_string());
        assert_eq!(verdict.reason(), "Error: simulator did not write 'exit_code.txt'");
    }

    #[test]
    fn test_paint() {
        assert_eq!(paint("1;32", "ok", true), "\x1b[1;32mok\x1b[0m");
        assert_eq!(paint("1;32", "ok", false), "ok");
    }

    #[test]
    fn test_console_reporter_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        reporter.on_test_start("add.elf");
        reporter.on_test_complete("add.elf", &TestVerdict::Passed);
        reporter.on_test_complete("sub.elf", &TestVerdict::Failed(ExecutionOutcome::Running));
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "Running: add.elf\n✓ add.elf PASSED\n✗ sub.elf FAILED (code 2)\n");
    }

    struct ClosedPipe {
        attempts: usize,
    }

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_reporter_survives_closed_output() {
        let mut reporter = ConsoleReporter::new(ClosedPipe { attempts: 0 }, false);
        assert!(!reporter.write_failed);
        reporter.on_test_start("add.elf");
        reporter.on_test_complete("add.elf", &TestVerdict::Passed);
        reporter.on_run_complete(&RunSummary::default());
        assert!(reporter.write_failed);
        assert_eq!(reporter.into_inner().attempts, 3);
    }

    #[test]
    fn test_json_reporter_survives_closed_output() {
        let mut reporter = JsonReporter::new(ClosedPipe { attempts: 0 });
        reporter.on_run_complete(&RunSummary::default());
        assert!(reporter.write_failed);
    }

    #[test]
    fn test_json_reporter_includes_selected_dir() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.on_selection(Path::new("/out/test"), &["add.elf".to_string()]);
        reporter.on_run_complete(&RunSummary::default());
        let doc: serde_json::Value = serde_json::from_slice(&reporter.into_inner()).unwrap();
        assert_eq!(doc["dir"], "/out/test");
        assert_eq!(doc["total"], 0);
    }

    #[test]
    fn test_summary_json() {
        let mut summary = RunSummary::default();
        summary.record("add.elf", TestVerdict::Passed);
        summary.record("sub.elf", TestVerdict::Failed(ExecutionOutcome::BadTrap));
        let doc = summary_json(&summary);
        assert_eq!(doc["total"], 2);
        assert_eq!(doc["failed"], 1);
        assert_eq!(doc["failures"][0]["index"], 1);
        assert_eq!(doc["failures"][0]["reason"], "BadTrap");
        assert_eq!(doc["failures"][0]["code"], 1);
    }
}
