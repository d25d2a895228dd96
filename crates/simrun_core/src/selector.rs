//! Test selector grammar.
//!
//! A selector is the single positional argument of the harness:
//! - `suite` selects every test binary the suite builds.
//! - `suite/prefix` selects binaries whose file name starts with `prefix`.
//!
//! The split happens at the first `/`, so a prefix may itself contain `/`. An empty prefix (`suite/`) is kept as a
//! prefix that matches everything.

use std::fmt;

/// File extension that marks a test binary.
pub const ELF_EXTENSION: &str = ".elf";

/// Parsed form of the selector argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelector {
    pub suite: String,
    pub prefix: Option<String>,
}

/// Error for a selector that cannot name a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    Empty,
    EmptySuite(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Empty => write!(f, "test selector is empty"),
            SelectorError::EmptySuite(raw) => write!(f, "test selector '{}' does not name a suite", raw),
        }
    }
}

impl std::error::Error for SelectorError {}

impl TestSelector {
    /// Parse `suite` or `suite/prefix`.
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        if raw.is_empty() {
            return Err(SelectorError::Empty);
        }
        let (suite, prefix) = match raw.split_once('/') {
            Some((suite, prefix)) => (suite, Some(prefix.to_string())),
            None => (raw, None),
        };
        if suite.is_empty() {
            return Err(SelectorError::EmptySuite(raw.to_string()));
        }
        Ok(Self {
            suite: suite.to_string(),
            prefix,
        })
    }

    /// Whether `file_name` is a test binary this selector picks up.
    ///
    /// This does not apply first-match narrowing; that is a property of the whole listing.
    pub fn matches(&self, file_name: &str) -> bool {
        if !file_name.ends_with(ELF_EXTENSION) {
            return false;
        }
        match &self.prefix {
            Some(prefix) => file_name.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for TestSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}/{}", self.suite, prefix),
            None => f.write_str(&self.suite),
        }
    }
}
