//! Host runner that records what it is told.

use std::cell::{Cell, RefCell};

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::Journal;
use crate::config::RunnerConfig;
use crate::error::{BoxError, MessageError};
use crate::host::{HostEvent, HostRunner};

/// [`HostRunner`] keeping every emitted event.
#[derive(Debug, Default)]
pub struct RecordingHost {
    config: RunnerConfig,
    events: RefCell<Vec<HostEvent>>,
    preparer_error: Option<String>,
    preparer_calls: Cell<usize>,
    journal: Journal,
}

impl RecordingHost {
    /// Creates a host exposing `config`.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Makes the test preparer fail with `message`.
    #[must_use]
    pub fn with_preparer_error(mut self, message: impl Into<String>) -> Self {
        self.preparer_error = Some(message.into());
        self
    }

    /// Records preparer calls and events in `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Returns the emitted events in order.
    #[must_use]
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    /// Returns how many times the preparer ran.
    #[must_use]
    pub fn preparer_calls(&self) -> usize {
        self.preparer_calls.get()
    }
}

impl HostRunner for RecordingHost {
    fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn run_test_preparer(&self) -> LocalBoxFuture<'_, Result<(), BoxError>> {
        self.preparer_calls.set(self.preparer_calls.get() + 1);
        self.journal.record("run_test_preparer");
        let outcome = self
            .preparer_error
            .as_ref()
            .map_or(Ok(()), |message| Err(MessageError::boxed(message.clone())));
        async move { outcome }.boxed_local()
    }

    fn emit(&self, event: HostEvent) {
        let kind = match &event {
            HostEvent::TestPass(_) => "testPass",
            HostEvent::TestFail(_) => "testFail",
        };
        self.journal.record(format!("{kind} {}", event.info().name()));
        self.events.borrow_mut().push(event);
    }
}
