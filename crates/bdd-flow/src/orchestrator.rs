//! Drives one run from engine construction to the final report.
//!
//! The orchestrator walks a fixed sequence of states:
//!
//! ```text
//! Idle -> Initializing -> LoadingFixtures -> Executing -> Finalizing -> Resolved
//!                                                                    \-> Rejected
//! ```
//!
//! Any failure along the way moves it straight to `Rejected`. There are no
//! retries at this layer.

use std::cell::RefCell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use camino::Utf8PathBuf;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::adapter::FlowAdapter;
use crate::config::CompletionHook;
use crate::engine::SpecEngine;
use crate::error::{MessageError, RunError, SetupError};
use crate::host::HostRunner;
use crate::panic::panic_message;
use crate::reduce::ResultCollector;
use crate::reporting::RunReport;
use crate::scheduler::{Scheduler, TaskQueue};

/// Lifecycle state of an [`Orchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, not yet run.
    Idle,
    /// Installing the adapted registration functions.
    Initializing,
    /// Loading the engine's static files.
    LoadingFixtures,
    /// Preparing the host and executing spec files.
    Executing,
    /// Running the post-run hook and building the report.
    Finalizing,
    /// The run produced a report.
    Resolved,
    /// The run was rejected.
    Rejected,
}

impl RunState {
    /// Returns a lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::LoadingFixtures => "loading-fixtures",
            Self::Executing => "executing",
            Self::Finalizing => "finalizing",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs spec files through a [`SpecEngine`] on behalf of a host runner.
pub struct Orchestrator<'h, E> {
    host: &'h dyn HostRunner,
    engine: E,
    scheduler: Rc<dyn Scheduler>,
    state: RunState,
}

impl<'h, E: SpecEngine> Orchestrator<'h, E> {
    /// Builds the engine from the host's configured engine options.
    ///
    /// Nothing else happens until [`Orchestrator::run`] is awaited.
    #[must_use]
    pub fn initialize(host: &'h dyn HostRunner) -> Self {
        let engine = E::from_options(&host.config().engine);
        Self::with_engine(host, engine)
    }
}

impl<'h, E> Orchestrator<'h, E> {
    /// Uses an engine built by the caller.
    #[must_use]
    pub fn with_engine(host: &'h dyn HostRunner, engine: E) -> Self {
        Self {
            host,
            engine,
            scheduler: Rc::new(TaskQueue::new()),
            state: RunState::Idle,
        }
    }

    /// Replaces the scheduler wrapped bodies are queued on.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Consumes the orchestrator, returning the engine.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    fn enter(&mut self, state: RunState) {
        info!(from = %self.state, to = %state, "run state changed");
        self.state = state;
    }
}

impl<E: SpecEngine> Orchestrator<'_, E> {
    /// Runs `specs` and settles the whole run.
    ///
    /// Must be awaited inside a Tokio `LocalSet`, since wrapped bodies are
    /// queued on a local task queue.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AlreadyStarted`] on a second call, and otherwise
    /// the first failure among setup, file loading, host preparation, engine
    /// execution, report assembly and the post-run hook.
    pub async fn run(&mut self, specs: Vec<Utf8PathBuf>) -> Result<RunReport, RunError> {
        if self.state != RunState::Idle {
            warn!(state = %self.state, "run requested twice");
            return Err(RunError::AlreadyStarted);
        }
        let outcome = self.drive(specs).await;
        match &outcome {
            Ok(report) => {
                self.enter(RunState::Resolved);
                info!(
                    failed_count = report.failed_count(),
                    results = report.spec_results().len(),
                    "run resolved"
                );
            }
            Err(err) => {
                self.enter(RunState::Rejected);
                error!(error = %err, "run rejected");
            }
        }
        outcome
    }

    async fn drive(&mut self, specs: Vec<Utf8PathBuf>) -> Result<RunReport, RunError> {
        self.enter(RunState::Initializing);
        let setup_error = self.install_setup();

        self.enter(RunState::LoadingFixtures);
        let loaded = self.engine.load_files();
        take_setup_error(&setup_error)?;
        loaded?;

        self.enter(RunState::Executing);
        self.host
            .run_test_preparer()
            .await
            .map_err(RunError::Preparer)?;
        self.engine.add_files(specs);
        let collector = ResultCollector::new(self.host);
        self.engine.run(&collector).await?;
        take_setup_error(&setup_error)?;

        self.enter(RunState::Finalizing);
        let report = collector.into_report()?;
        if let Some(hook) = &self.host.config().on_complete {
            call_post_run_hook(hook).await?;
        }
        Ok(report)
    }

    fn install_setup(&mut self) -> Rc<RefCell<Option<SetupError>>> {
        let setup_error = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&setup_error);
        let adapter = FlowAdapter::new(Rc::clone(&self.scheduler));
        self.engine.on_context_ready(Box::new(move |context| {
            if let Err(err) = adapter.adapt_context(context) {
                error!(error = %err, "registration functions could not be adapted");
                *sink.borrow_mut() = Some(err);
            }
        }));
        setup_error
    }
}

/// Awaits the post-run hook, turning a panic into a rejection.
async fn call_post_run_hook(hook: &CompletionHook) -> Result<(), RunError> {
    AssertUnwindSafe(async { hook.call().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(MessageError::boxed(panic_message(payload.as_ref()))))
        .map_err(RunError::PostRunHook)
}

fn take_setup_error(slot: &RefCell<Option<SetupError>>) -> Result<(), SetupError> {
    slot.borrow_mut().take().map_or(Ok(()), Err)
}

/// Runs `specs` with a fresh engine of type `E`.
///
/// Must be awaited inside a Tokio `LocalSet`; [`LocalHarness`] sets one up.
///
/// # Errors
///
/// See [`Orchestrator::run`].
///
/// [`LocalHarness`]: crate::harness::LocalHarness
pub async fn run<E: SpecEngine>(
    host: &dyn HostRunner,
    specs: Vec<Utf8PathBuf>,
) -> Result<RunReport, RunError> {
    Orchestrator::<E>::initialize(host).run(specs).await
}
