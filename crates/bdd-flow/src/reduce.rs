//! Reduces engine case events into result records.

use std::cell::{Cell, RefCell};

use tracing::{debug, error};

use crate::engine::{CaseOutcome, RunObserver};
use crate::error::RunError;
use crate::host::{HostEvent, HostRunner, TestInfo};
use crate::reporting::{Assertion, ResultRecord, RunReport};

/// Separator between the scenario, variant and step parts of a description.
pub const TITLE_SEPARATOR: &str = " --> ";

/// Step part of the description used when a failed case names no step.
pub const UNKNOWN_STEP: &str = "<unknown step>";

/// Failure message used when a failed case names no step.
pub const INCONSISTENT_CASE_MESSAGE: &str = "case reported as failed but no step failed";

/// Turns one finished case into the host notification and the result record.
///
/// A failed case is described by its first failed step. A failed case
/// without one is reduced to a failure against [`UNKNOWN_STEP`].
///
/// # Examples
///
/// ```
/// use bdd_flow::{CaseOutcome, HostEvent, reduce_case};
///
/// let (event, record) = reduce_case(&CaseOutcome::new("Login", "Valid login", "admin"));
/// assert!(matches!(event, HostEvent::TestPass(_)));
/// assert_eq!(record.description(), "Valid login --> admin");
/// ```
#[must_use]
pub fn reduce_case(outcome: &CaseOutcome) -> (HostEvent, ResultRecord) {
    let name = outcome.display_name();
    let info = TestInfo::new(name.clone(), outcome.category());
    if !outcome.is_buggy() {
        let record = ResultRecord::new(name, Assertion::Passed, outcome.duration());
        return (HostEvent::TestPass(info), record);
    }

    let (step_title, assertion) = outcome.first_failed_step().map_or_else(
        || {
            error!(case = %name, "case reported as failed without a failed step");
            (
                UNKNOWN_STEP,
                Assertion::Failed {
                    error_msg: INCONSISTENT_CASE_MESSAGE.to_owned(),
                    stack_trace: String::new(),
                },
            )
        },
        |(step, failure)| {
            (
                step.title(),
                Assertion::Failed {
                    error_msg: failure.message().to_owned(),
                    stack_trace: failure.stack().to_owned(),
                },
            )
        },
    );
    let description = format!("{name}{TITLE_SEPARATOR}{step_title}");
    let record = ResultRecord::new(description, assertion, outcome.duration());
    (HostEvent::TestFail(info), record)
}

/// Run observer that forwards notifications to the host and accumulates the
/// report.
pub struct ResultCollector<'h> {
    host: &'h dyn HostRunner,
    records: RefCell<Vec<ResultRecord>>,
    failed_count: Cell<Option<usize>>,
}

impl<'h> ResultCollector<'h> {
    /// Creates an empty collector notifying `host`.
    #[must_use]
    pub fn new(host: &'h dyn HostRunner) -> Self {
        Self {
            host,
            records: RefCell::new(Vec::new()),
            failed_count: Cell::new(None),
        }
    }

    /// Returns the number of records collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Returns `true` when no case has finished yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Builds the final report.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::MissingFailureCount`] when the engine never
    /// reported the end of the run.
    pub fn into_report(self) -> Result<RunReport, RunError> {
        let failed_count = self
            .failed_count
            .get()
            .ok_or(RunError::MissingFailureCount)?;
        Ok(RunReport::new(failed_count, self.records.into_inner()))
    }
}

impl RunObserver for ResultCollector<'_> {
    fn on_case_finished(&self, outcome: &CaseOutcome) {
        let (event, record) = reduce_case(outcome);
        debug!(
            case = %record.description(),
            passed = record.assertion().is_passed(),
            "case finished"
        );
        self.host.emit(event);
        self.records.borrow_mut().push(record);
    }

    fn on_run_finished(&self, failed_count: usize) {
        debug!(failed_count, "run finished");
        self.failed_count.set(Some(failed_count));
    }
}
