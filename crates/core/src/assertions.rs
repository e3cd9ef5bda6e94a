//! Assertion primitives with accumulated pass/fail state
//!
//! Assertions never abort the enclosing scenario. A mismatch is recorded,
//! reported on a diagnostic line and flips the suite outcome to failed;
//! execution of the remaining scenario statements continues.

use serde::Serialize;
use tracing::{debug, error};

/// Kind of check an assertion performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssertionKind {
    /// Exact equality
    Equal,
    /// Contiguous substring containment
    Contains,
}

impl std::fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// One evaluated assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionRecord {
    /// Scenario the assertion was evaluated in, if any
    pub scenario: Option<String>,
    pub kind: AssertionKind,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

impl AssertionRecord {
    /// Human-readable mismatch line
    pub fn diagnostic(&self) -> String {
        let scope = self.scenario.as_deref().unwrap_or("-");
        match self.kind {
            AssertionKind::Equal => format!(
                "[{}] assert equal failed: expected {:?}, actual {:?}",
                scope, self.expected, self.actual
            ),
            AssertionKind::Contains => format!(
                "[{}] assert contains failed: expected {:?} in {:?}",
                scope, self.expected, self.actual
            ),
        }
    }
}

/// Pass/fail counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssertionSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Accumulator for assertion outcomes across a suite
#[derive(Debug, Default)]
pub struct Assertions {
    records: Vec<AssertionRecord>,
    current_scenario: Option<String>,
    echo: bool,
}

impl Assertions {
    /// Create an accumulator that prints mismatch diagnostics to stdout
    pub fn new() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Create an accumulator that only records (used in tests)
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Tag subsequent records with a scenario name
    pub fn begin_scenario(&mut self, name: &str) {
        self.current_scenario = Some(name.to_string());
    }

    /// Clear the scenario tag
    pub fn end_scenario(&mut self) {
        self.current_scenario = None;
    }

    /// Passes iff `actual` and `expected` are identical, whitespace included
    pub fn assert_equal(&mut self, actual: &str, expected: &str) -> bool {
        let passed = actual == expected;
        self.record(AssertionKind::Equal, expected, actual, passed)
    }

    /// Passes iff `needle` occurs as a contiguous substring of `haystack`
    pub fn assert_contains(&mut self, haystack: &str, needle: &str) -> bool {
        let passed = haystack.contains(needle);
        self.record(AssertionKind::Contains, needle, haystack, passed)
    }

    fn record(&mut self, kind: AssertionKind, expected: &str, actual: &str, passed: bool) -> bool {
        let record = AssertionRecord {
            scenario: self.current_scenario.clone(),
            kind,
            expected: expected.to_string(),
            actual: actual.to_string(),
            passed,
        };
        if passed {
            debug!(kind = %kind, expected = %expected, "assertion passed");
        } else {
            error!(kind = %kind, expected = %expected, actual = %actual, "assertion failed");
            if self.echo {
                println!("{}", record.diagnostic());
            }
        }
        self.records.push(record);
        passed
    }

    /// Append the records of another accumulator, keeping their order
    pub fn absorb(&mut self, other: Assertions) {
        self.records.extend(other.records);
    }

    /// True iff no recorded assertion failed
    pub fn passed(&self) -> bool {
        self.records.iter().all(|r| r.passed)
    }

    /// All records in evaluation order
    pub fn records(&self) -> &[AssertionRecord] {
        &self.records
    }

    /// Failed records in evaluation order
    pub fn failures(&self) -> impl Iterator<Item = &AssertionRecord> {
        self.records.iter().filter(|r| !r.passed)
    }

    /// Failed records belonging to one scenario
    pub fn failures_in(&self, scenario: &str) -> usize {
        self.failures()
            .filter(|r| r.scenario.as_deref() == Some(scenario))
            .count()
    }

    pub fn summary(&self) -> AssertionSummary {
        let failed = self.failures().count();
        AssertionSummary {
            total: self.records.len(),
            passed: self.records.len() - failed,
            failed,
        }
    }
}
