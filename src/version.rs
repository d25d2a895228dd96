//! Harness version information.
//!
//! The CLI `--version` output and the JSON summary both read this constant so they agree.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.

/// The simrun version string (for example, `0.1.0`).
pub const SIMRUN_VERSION: &str = env!("CARGO_PKG_VERSION");
