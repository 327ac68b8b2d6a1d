//! Run report handed back to the external test orchestrator.
//!
//! A [`RunReport`] is the flattened view of a run: the engine's failure
//! count plus one [`ResultRecord`] per finished case, in emission order.
//! [`json`] and [`junit`] render it for downstream tools.

use std::slice;
use std::time::Duration;

/// JSON writer using the orchestrator's `camelCase` schema.
pub mod json;
/// `JUnit` XML writer.
pub mod junit;

/// Outcome of the single assertion attached to each case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// The case passed.
    Passed,
    /// The case failed.
    Failed {
        /// Message of the first failing step.
        error_msg: String,
        /// Stack trace of the first failing step.
        stack_trace: String,
    },
}

impl Assertion {
    /// Returns `true` for a passing assertion.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn error_msg(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed { error_msg, .. } => Some(error_msg),
        }
    }

    /// Returns the stack trace, if any.
    #[must_use]
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed { stack_trace, .. } => Some(stack_trace),
        }
    }
}

/// Normalised result of one finished case.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bdd_flow::reporting::{Assertion, ResultRecord};
///
/// let record = ResultRecord::new("Login --> admin", Assertion::Passed, Duration::from_millis(12));
/// assert_eq!(record.description(), "Login --> admin");
/// assert_eq!(record.assertions(), [Assertion::Passed]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    description: String,
    assertion: Assertion,
    duration: Duration,
}

impl ResultRecord {
    /// Creates a record holding exactly one assertion.
    #[must_use]
    pub fn new(description: impl Into<String>, assertion: Assertion, duration: Duration) -> Self {
        Self {
            description: description.into(),
            assertion,
            duration,
        }
    }

    /// Returns the case description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the assertions. There is always exactly one.
    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        slice::from_ref(&self.assertion)
    }

    /// Returns the single assertion.
    #[must_use]
    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// Returns the case duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Final, immutable outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    failed_count: usize,
    spec_results: Vec<ResultRecord>,
}

impl RunReport {
    /// Creates a report.
    ///
    /// `failed_count` is taken from the engine as is and is not derived from
    /// `spec_results`.
    #[must_use]
    pub fn new(failed_count: usize, spec_results: Vec<ResultRecord>) -> Self {
        Self {
            failed_count,
            spec_results,
        }
    }

    /// Returns the failure count reported by the engine.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    /// Returns the case records in emission order.
    #[must_use]
    pub fn spec_results(&self) -> &[ResultRecord] {
        &self.spec_results
    }

    /// Returns the number of records with a failing assertion.
    #[must_use]
    pub fn failing_records(&self) -> usize {
        self.spec_results
            .iter()
            .filter(|record| !record.assertion().is_passed())
            .count()
    }
}
