//! Boundary with the host runner that owns the browser session.

use futures::future::LocalBoxFuture;

use crate::config::RunnerConfig;
use crate::error::BoxError;

/// Identifies a finished case in host notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInfo {
    name: String,
    category: String,
}

impl TestInfo {
    /// Creates a notification payload.
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Returns the case name (`"<scenario> --> <variant>"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the feature title.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Live notification sent to the host as each case finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The case passed.
    TestPass(TestInfo),
    /// The case failed.
    TestFail(TestInfo),
}

impl HostEvent {
    /// Returns the payload.
    #[must_use]
    pub fn info(&self) -> &TestInfo {
        match self {
            Self::TestPass(info) | Self::TestFail(info) => info,
        }
    }
}

/// Host runner driving a run.
pub trait HostRunner {
    /// Returns the runner configuration.
    fn config(&self) -> &RunnerConfig;

    /// Prepares the host (for example a browser session) before spec files
    /// are added to the engine.
    fn run_test_preparer(&self) -> LocalBoxFuture<'_, Result<(), BoxError>>;

    /// Receives a live pass/fail notification.
    fn emit(&self, event: HostEvent);
}
