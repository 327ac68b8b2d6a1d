//! Shared test support utilities for bdd-flow tests.
//!
//! Enabled with the `test-support` feature. This module provides:
//! - [`ScriptedEngine`], an in-memory specification engine that runs
//!   declaratively scripted features through the real registration and
//!   completion paths
//! - [`RecordingHost`], a host runner that records every notification
//! - [`Journal`], a shared log for asserting call order across both

use std::cell::RefCell;
use std::rc::Rc;

mod engine;
mod host;
mod script;

pub use engine::{ScriptedEngine, StepMode};
pub use host::RecordingHost;
pub use script::{DEFAULT_VARIANT, Definitions, FeatureScript, ScenarioScript, SpecFile};

/// Shared, ordered log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    /// Returns a copy of every entry in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
