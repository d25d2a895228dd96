#![forbid(unsafe_code)]
//! simrun: run compiled CPU test programs through an external simulator
//!
//! Given a suite name (optionally narrowed by a file-name prefix), simrun asks the build system for the suite's
//! output directory, picks the `.elf` test binaries in it, runs each one through the simulator, classifies the
//! outcome the simulator reports, and prints a pass/fail summary.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod version;

pub use simrun_core::{ExecutionOutcome, TestSelector};
