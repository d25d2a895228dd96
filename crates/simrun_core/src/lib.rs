//! Provide the pure vocabulary of the simrun harness: the simulator outcome taxonomy and the test selector grammar.
//!
//! This crate is intentionally small and dependency-free. Both the CLI driver and its tests rely on it to agree on:
//! - which exit codes exist and what they are called in reports, and
//! - how a `suite` / `suite/prefix` argument is split and matched against binary file names.
//!
//! ## Notes
//!
//! - No IO, no global state. Filesystem enumeration and process spawning live in the `simrun` crate.

pub mod outcome;
pub mod selector;

pub use outcome::{ExecutionOutcome, OUTCOMES, OutcomeInfo, UnknownExitCode, classify};
pub use selector::{ELF_EXTENSION, SelectorError, TestSelector};
