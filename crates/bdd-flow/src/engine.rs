//! Boundary with the specification engine.
//!
//! The engine parses feature files, builds the runnable tree and executes it.
//! This crate only drives it through [`SpecEngine`] and listens to it
//! through [`RunObserver`].

use std::time::Duration;

use camino::Utf8PathBuf;
use futures::future::LocalBoxFuture;

use crate::config::EngineOptions;
use crate::error::{EngineError, StepFailure};
use crate::registration::RegistrationContext;

/// One-time callback fired when the engine's registration context is ready.
pub type SetupHook = Box<dyn FnOnce(&mut RegistrationContext)>;

/// Receives run events from the engine.
pub trait RunObserver {
    /// Called once per finished case, in execution order.
    fn on_case_finished(&self, outcome: &CaseOutcome);

    /// Called once when the whole run finishes.
    fn on_run_finished(&self, failed_count: usize);
}

/// Specification engine driven by the orchestrator.
pub trait SpecEngine {
    /// Builds the engine from configured options.
    fn from_options(options: &EngineOptions) -> Self
    where
        Self: Sized;

    /// Installs the callback fired once the registration context exists and
    /// before any spec file is loaded.
    fn on_context_ready(&mut self, hook: SetupHook);

    /// Loads the engine's static files, firing the context-ready callback
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when loading fails.
    fn load_files(&mut self) -> Result<(), EngineError>;

    /// Queues spec files for the next run.
    fn add_files(&mut self, specs: Vec<Utf8PathBuf>);

    /// Executes every queued spec file, reporting to `observer`.
    ///
    /// Individual case failures are reported through the observer; the
    /// returned error is reserved for engine-level failures.
    fn run<'a>(&'a mut self, observer: &'a dyn RunObserver)
    -> LocalBoxFuture<'a, Result<(), EngineError>>;
}

/// State of one step within a finished case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    /// The step ran and passed.
    Passed,
    /// The step ran and failed.
    Failed(StepFailure),
    /// The step has no body.
    Pending,
    /// The step did not run because an earlier one failed.
    Skipped,
}

impl StepState {
    /// Returns the lowercase state label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed(_) => "failed",
            Self::Pending => "pending",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one step within a finished case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    title: String,
    state: StepState,
}

impl StepOutcome {
    /// Creates a step outcome.
    #[must_use]
    pub fn new(title: impl Into<String>, state: StepState) -> Self {
        Self {
            title: title.into(),
            state,
        }
    }

    /// Returns the step title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the step state.
    #[must_use]
    pub fn state(&self) -> &StepState {
        &self.state
    }

    /// Returns the failure when the step failed.
    #[must_use]
    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.state {
            StepState::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// One finished scenario variant, as reported by the engine.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bdd_flow::{CaseOutcome, StepOutcome, StepState};
///
/// let outcome = CaseOutcome::new("Login", "Valid credentials", "default user")
///     .with_duration(Duration::from_millis(42))
///     .with_step(StepOutcome::new("Given a user", StepState::Passed));
/// assert_eq!(outcome.display_name(), "Valid credentials --> default user");
/// assert_eq!(outcome.category(), "Login");
/// assert!(!outcome.is_buggy());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    feature_title: String,
    scenario_title: String,
    variant_title: String,
    buggy: bool,
    duration: Duration,
    steps: Vec<StepOutcome>,
}

impl CaseOutcome {
    /// Creates a passing outcome with no steps.
    #[must_use]
    pub fn new(
        feature_title: impl Into<String>,
        scenario_title: impl Into<String>,
        variant_title: impl Into<String>,
    ) -> Self {
        Self {
            feature_title: feature_title.into(),
            scenario_title: scenario_title.into(),
            variant_title: variant_title.into(),
            buggy: false,
            duration: Duration::ZERO,
            steps: Vec::new(),
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Appends a step outcome. A failed step marks the case buggy.
    #[must_use]
    pub fn with_step(mut self, step: StepOutcome) -> Self {
        self.buggy |= matches!(step.state(), StepState::Failed(_));
        self.steps.push(step);
        self
    }

    /// Overrides the buggy flag reported by the engine.
    #[must_use]
    pub fn marked_buggy(mut self, buggy: bool) -> Self {
        self.buggy = buggy;
        self
    }

    /// Returns `"<scenario> --> <variant>"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{}{}{}",
            self.scenario_title,
            crate::reduce::TITLE_SEPARATOR,
            self.variant_title
        )
    }

    /// Returns the feature title the case belongs to.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.feature_title
    }

    /// Returns the scenario title.
    #[must_use]
    pub fn scenario_title(&self) -> &str {
        &self.scenario_title
    }

    /// Returns the variant title.
    #[must_use]
    pub fn variant_title(&self) -> &str {
        &self.variant_title
    }

    /// Returns `true` when the engine marked the case as failed.
    #[must_use]
    pub fn is_buggy(&self) -> bool {
        self.buggy
    }

    /// Returns the case duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the step outcomes in document order.
    #[must_use]
    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    /// Returns the first failed step in document order.
    #[must_use]
    pub fn first_failed_step(&self) -> Option<(&StepOutcome, &StepFailure)> {
        self.steps
            .iter()
            .find_map(|step| step.failure().map(|failure| (step, failure)))
    }
}
