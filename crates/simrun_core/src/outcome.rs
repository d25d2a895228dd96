//! Simulator outcome registry.
//!
//! The simulator reports how a test program ended by writing a small integer to its outcome file. The mapping from
//! that integer to a name is closed: five codes exist and anything else is a contract violation between the harness
//! and the simulator, surfaced as [`UnknownExitCode`].
//!
//! The labels are part of the external report format; scripts grep for them, so they must not change.
//!
//! ## Examples
//! ```rust
//! use simrun_core::outcome::{self, ExecutionOutcome};
//!
//! assert_eq!(outcome::classify(1), Ok(ExecutionOutcome::BadTrap));
//! assert_eq!(ExecutionOutcome::Timeout.label(), "Timeout");
//! assert!(outcome::classify(7).is_err());
//! ```

use std::fmt;

/// How a simulated test program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionOutcome {
    /// The program hit the trap instruction with a zero result register.
    GoodTrap,
    /// The program hit the trap instruction with a non-zero result register.
    BadTrap,
    /// The simulation stopped while the program was still running.
    Running,
    /// The commit watchdog fired.
    Timeout,
    Unknown,
}

/// Metadata for one outcome kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeInfo {
    pub id: ExecutionOutcome,
    /// Integer written by the simulator.
    pub code: i32,
    /// Spelling used in reports.
    pub label: &'static str,
    /// ANSI SGR parameters used when the report is coloured.
    pub color: &'static str,
    pub description: &'static str,
}

/// Registry of outcome kinds, ordered by code.
pub const OUTCOMES: &[OutcomeInfo] = &[
    OutcomeInfo {
        id: ExecutionOutcome::GoodTrap,
        code: 0,
        label: "GoodTrap",
        color: "1;32",
        description: "Test program trapped with a success result.",
    },
    OutcomeInfo {
        id: ExecutionOutcome::BadTrap,
        code: 1,
        label: "BadTrap",
        color: "1;31",
        description: "Test program trapped with a failure result.",
    },
    OutcomeInfo {
        id: ExecutionOutcome::Running,
        code: 2,
        label: "Running",
        color: "1;33",
        description: "Simulation ended before the test program trapped.",
    },
    OutcomeInfo {
        id: ExecutionOutcome::Timeout,
        code: 3,
        label: "Timeout",
        color: "1;35",
        description: "No instruction committed within the watchdog window.",
    },
    OutcomeInfo {
        id: ExecutionOutcome::Unknown,
        code: 4,
        label: "Unknown",
        color: "1;36",
        description: "Simulator could not determine how the test ended.",
    },
];

/// Error for an outcome code outside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownExitCode(pub i32);

impl fmt::Display for UnknownExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown simulator exit code {}", self.0)
    }
}

impl std::error::Error for UnknownExitCode {}

/// Map a simulator outcome code to its outcome.
///
/// ## Returns
/// - `Ok(outcome)` for codes `0..=4`.
/// - `Err(UnknownExitCode)` for every other integer. Codes are never coerced to a default.
pub fn classify(code: i32) -> Result<ExecutionOutcome, UnknownExitCode> {
    OUTCOMES
        .iter()
        .find(|info| info.code == code)
        .map(|info| info.id)
        .ok_or(UnknownExitCode(code))
}

impl ExecutionOutcome {
    /// Registry entry for this outcome.
    pub fn info(self) -> &'static OutcomeInfo {
        match self {
            ExecutionOutcome::GoodTrap => &OUTCOMES[0],
            ExecutionOutcome::BadTrap => &OUTCOMES[1],
            ExecutionOutcome::Running => &OUTCOMES[2],
            ExecutionOutcome::Timeout => &OUTCOMES[3],
            ExecutionOutcome::Unknown => &OUTCOMES[4],
        }
    }

    pub fn code(self) -> i32 {
        self.info().code
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    /// Only a good trap counts as a passing test.
    pub fn is_pass(self) -> bool {
        self == ExecutionOutcome::GoodTrap
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_codes() {
        assert_eq!(classify(0), Ok(ExecutionOutcome::GoodTrap));
        assert_eq!(classify(1), Ok(ExecutionOutcome::BadTrap));
        assert_eq!(classify(2), Ok(ExecutionOutcome::Running));
        assert_eq!(classify(3), Ok(ExecutionOutcome::Timeout));
        assert_eq!(classify(4), Ok(ExecutionOutcome::Unknown));
    }

    #[test]
    fn test_classify_rejects_out_of_range() {
        assert_eq!(classify(5), Err(UnknownExitCode(5)));
        assert_eq!(classify(-1), Err(UnknownExitCode(-1)));
        assert_eq!(classify(255), Err(UnknownExitCode(255)));
    }

    #[test]
    fn test_info_matches_registry_position() {
        for info in OUTCOMES {
            assert_eq!(info.id.info(), info);
        }
    }

    #[test]
    fn test_only_good_trap_passes() {
        let passing: Vec<_> = OUTCOMES.iter().filter(|i| i.id.is_pass()).map(|i| i.id).collect();
        assert_eq!(passing, vec![ExecutionOutcome::GoodTrap]);
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(ExecutionOutcome::BadTrap.to_string(), "BadTrap");
        assert_eq!(UnknownExitCode(9).to_string(), "unknown simulator exit code 9");
    }
}
