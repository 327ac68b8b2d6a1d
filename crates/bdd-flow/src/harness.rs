//! Tokio current-thread harness for driving a run to completion.

use std::future::Future;
use std::io;

use camino::Utf8PathBuf;

use crate::engine::SpecEngine;
use crate::error::RunError;
use crate::host::HostRunner;
use crate::reporting::RunReport;

/// Drives futures inside a Tokio current-thread runtime with a
/// [`LocalSet`](tokio::task::LocalSet).
///
/// Each call builds a fresh runtime and `LocalSet`, so
/// `tokio::task::spawn_local` and Tokio timers are available to everything
/// the future awaits, including the default task queue.
///
/// # Examples
///
/// ```
/// use bdd_flow::LocalHarness;
///
/// let harness = LocalHarness::new();
/// let value = harness.block_on(async {
///     tokio::task::spawn_local(async { 2 + 2 }).await
/// });
/// assert!(matches!(value, Ok(Ok(4))));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHarness;

impl LocalHarness {
    /// Creates a new harness instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs `future` to completion.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the runtime cannot be built.
    pub fn block_on<F: Future>(&self, future: F) -> io::Result<F::Output> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let local_set = tokio::task::LocalSet::new();
        Ok(local_set.block_on(&runtime, future))
    }

    /// Runs `specs` with a fresh engine of type `E` and returns the report.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Runtime`] when the runtime cannot be built, and
    /// otherwise whatever the run itself rejects with.
    pub fn run<E: SpecEngine>(
        &self,
        host: &dyn HostRunner,
        specs: Vec<Utf8PathBuf>,
    ) -> Result<RunReport, RunError> {
        self.block_on(crate::orchestrator::run::<E>(host, specs))?
    }
}
