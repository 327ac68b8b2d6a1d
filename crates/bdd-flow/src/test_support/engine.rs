//! In-memory specification engine.
//!
//! The engine owns raw registration functions that store bodies in a shared
//! library. Spec files register through whatever the context holds when they
//! load, so adapted functions installed by the context-ready hook see every
//! registration. Bodies are invoked with the engine's completion convention
//! (`StepBody::run_with`) and awaited under the configured timeout.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use camino::Utf8PathBuf;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::debug;

use super::Journal;
use super::script::{Definitions, FeatureScript, ScenarioScript, SpecFile};
use crate::body::StepBody;
use crate::completion::Completion;
use crate::config::EngineOptions;
use crate::engine::{CaseOutcome, RunObserver, SetupHook, SpecEngine, StepOutcome, StepState};
use crate::error::{EngineError, RegistrationError, StepFailure, StepResult};
use crate::keyword::{HookKind, StepKeyword};
use crate::registration::{
    HookCapabilities, ManualVariant, RegisterFn, Registration, RegistrationContext,
    StepCapabilities,
};

/// How a registered step takes part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Registered through the primary function or its alias.
    Automatic,
    /// Registered through the manual variant; reported as pending.
    Manual,
    /// Registered through a skip variant; reported as skipped.
    Skipped,
}

type StepKey = (StepKeyword, String);

#[derive(Default)]
struct Library {
    steps: BTreeMap<StepKey, (StepMode, Option<StepBody>)>,
    hooks: BTreeMap<HookKind, Vec<StepBody>>,
}

fn step_recorder(
    library: &Rc<RefCell<Library>>,
    keyword: StepKeyword,
    mode: StepMode,
) -> RegisterFn {
    let library = Rc::clone(library);
    Rc::new(move |registration: Registration| {
        let key = (keyword, registration.title().to_owned());
        let mut library = library.borrow_mut();
        if library.steps.contains_key(&key) {
            return Err(RegistrationError::Duplicate {
                keyword: keyword.to_string(),
                title: key.1,
            });
        }
        library.steps.insert(key, (mode, registration.body().cloned()));
        Ok(())
    })
}

fn hook_recorder(library: &Rc<RefCell<Library>>, hook: HookKind) -> RegisterFn {
    let library = Rc::clone(library);
    Rc::new(move |registration: Registration| {
        if let Some(body) = registration.body() {
            library
                .borrow_mut()
                .hooks
                .entry(hook)
                .or_default()
                .push(body.clone());
        }
        Ok(())
    })
}

/// Scripted [`SpecEngine`] for tests.
///
/// # Examples
///
/// ```
/// use bdd_flow::{LocalHarness, RunnerConfig, StepBody, StepKeyword, Registration};
/// use bdd_flow::orchestrator::Orchestrator;
/// use bdd_flow::test_support::{
///     FeatureScript, RecordingHost, ScenarioScript, ScriptedEngine, SpecFile,
/// };
///
/// let spec = SpecFile::new("login.spec")
///     .with_definitions(|context| {
///         context.register_step(
///             StepKeyword::Given,
///             Registration::new("a user").with_body(StepBody::sync(|| Ok(()))),
///         )
///     })
///     .with_feature(FeatureScript::new("Login").with_scenario(
///         ScenarioScript::new("Valid login").with_step(StepKeyword::Given, "a user"),
///     ));
/// let host = RecordingHost::new(RunnerConfig::default());
/// let engine = ScriptedEngine::default().with_spec(spec);
/// let report = LocalHarness::new()
///     .block_on(async {
///         Orchestrator::with_engine(&host, engine)
///             .run(vec!["login.spec".into()])
///             .await
///     })
///     .unwrap()
///     .unwrap();
/// assert_eq!(report.failed_count(), 0);
/// assert_eq!(report.spec_results()[0].description(), "Valid login --> default");
/// ```
pub struct ScriptedEngine {
    options: EngineOptions,
    library: Rc<RefCell<Library>>,
    context: Option<RegistrationContext>,
    setup: Option<SetupHook>,
    fixtures: Vec<Definitions>,
    specs: BTreeMap<Utf8PathBuf, SpecFile>,
    queued: Vec<Utf8PathBuf>,
    omitted_steps: Vec<StepKeyword>,
    omitted_hooks: Vec<HookKind>,
    load_error: Option<String>,
    fatal_error: Option<String>,
    reports_run_finished: bool,
    failed_count_override: Option<usize>,
    journal: Journal,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl ScriptedEngine {
    /// Creates an engine with no spec files.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            library: Rc::default(),
            context: None,
            setup: None,
            fixtures: Vec::new(),
            specs: BTreeMap::new(),
            queued: Vec::new(),
            omitted_steps: Vec::new(),
            omitted_hooks: Vec::new(),
            load_error: None,
            fatal_error: None,
            reports_run_finished: true,
            failed_count_override: None,
            journal: Journal::default(),
        }
    }

    /// Makes a spec file known under its path.
    #[must_use]
    pub fn with_spec(mut self, spec: SpecFile) -> Self {
        self.specs.insert(spec.path().to_owned(), spec);
        self
    }

    /// Adds definitions registered by [`SpecEngine::load_files`].
    #[must_use]
    pub fn with_fixture(
        mut self,
        definitions: impl Fn(&RegistrationContext) -> Result<(), RegistrationError> + 'static,
    ) -> Self {
        self.fixtures.push(Rc::new(definitions));
        self
    }

    /// Leaves a step keyword out of the registration context.
    #[must_use]
    pub fn without_step(mut self, keyword: StepKeyword) -> Self {
        self.omitted_steps.push(keyword);
        self
    }

    /// Leaves a hook out of the registration context.
    #[must_use]
    pub fn without_hook(mut self, hook: HookKind) -> Self {
        self.omitted_hooks.push(hook);
        self
    }

    /// Makes [`SpecEngine::load_files`] fail.
    #[must_use]
    pub fn with_load_error(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Makes the run fail after every case has finished.
    #[must_use]
    pub fn with_fatal_error(mut self, message: impl Into<String>) -> Self {
        self.fatal_error = Some(message.into());
        self
    }

    /// Stops the engine from reporting the end of the run.
    #[must_use]
    pub fn without_run_finished(mut self) -> Self {
        self.reports_run_finished = false;
        self
    }

    /// Reports `count` as the failure count instead of the number of failed
    /// steps and hooks.
    #[must_use]
    pub fn reporting_failed_count(mut self, count: usize) -> Self {
        self.failed_count_override = Some(count);
        self
    }

    /// Records engine calls in `journal`.
    #[must_use]
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Returns the engine options.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Returns the registration context once files are loaded.
    #[must_use]
    pub fn context(&self) -> Option<&RegistrationContext> {
        self.context.as_ref()
    }

    /// Returns the body stored for a step, if one was registered.
    #[must_use]
    pub fn registered_step(&self, keyword: StepKeyword, title: &str) -> Option<StepBody> {
        self.library
            .borrow()
            .steps
            .get(&(keyword, title.to_owned()))
            .and_then(|(_, body)| body.clone())
    }

    /// Returns how a step was registered.
    #[must_use]
    pub fn registered_mode(&self, keyword: StepKeyword, title: &str) -> Option<StepMode> {
        self.library
            .borrow()
            .steps
            .get(&(keyword, title.to_owned()))
            .map(|(mode, _)| *mode)
    }

    /// Returns the number of bodies registered for a hook.
    #[must_use]
    pub fn hook_count(&self, hook: HookKind) -> usize {
        self.library.borrow().hooks.get(&hook).map_or(0, Vec::len)
    }

    fn recording_context(&self) -> RegistrationContext {
        let mut context = RegistrationContext::new();
        for keyword in StepKeyword::ALL {
            if self.omitted_steps.contains(&keyword) {
                continue;
            }
            let library = &self.library;
            let primary = step_recorder(library, keyword, StepMode::Automatic);
            let capabilities = StepCapabilities::new(primary)
                .with_manual(ManualVariant {
                    register: step_recorder(library, keyword, StepMode::Manual),
                    skip: Some(step_recorder(library, keyword, StepMode::Skipped)),
                })
                .with_skip(step_recorder(library, keyword, StepMode::Skipped));
            context.insert_step(keyword, capabilities);
        }
        for hook in HookKind::ALL {
            if !self.omitted_hooks.contains(&hook) {
                let primary = hook_recorder(&self.library, hook);
                context.insert_hook(hook, HookCapabilities::new(primary));
            }
        }
        context
    }

    fn hook_bodies(&self, hook: HookKind) -> Vec<StepBody> {
        self.library
            .borrow()
            .hooks
            .get(&hook)
            .cloned()
            .unwrap_or_default()
    }

    fn lookup(
        &self,
        keyword: StepKeyword,
        inherited: StepKeyword,
        title: &str,
    ) -> Option<(StepMode, Option<StepBody>)> {
        let library = self.library.borrow();
        let conjunction = || match keyword {
            StepKeyword::And | StepKeyword::But => {
                library.steps.get(&(inherited, title.to_owned()))
            }
            StepKeyword::Given | StepKeyword::When | StepKeyword::Then => None,
        };
        library
            .steps
            .get(&(keyword, title.to_owned()))
            .or_else(conjunction)
            .cloned()
    }

    async fn invoke(&self, body: &StepBody) -> StepResult {
        let (done, receiver) = Completion::channel();
        body.run_with(done).await;
        let Some(limit) = self.options.timeout() else {
            return receiver.await;
        };
        tokio::time::timeout(limit, receiver).await.unwrap_or_else(|_| {
            Err(StepFailure::new(format!(
                "timeout of {}ms exceeded",
                self.options.timeout_ms
            )))
        })
    }

    async fn run_hooks(&self, hook: HookKind, failed: &mut usize) -> Result<(), EngineError> {
        for body in self.hook_bodies(hook) {
            if let Err(failure) = self.invoke(&body).await {
                *failed += 1;
                return Err(EngineError::Execution(format!("`{hook}` hook failed: {failure}")));
            }
        }
        Ok(())
    }

    async fn run_variant_hooks(&self, hook: HookKind, label: &str) -> Option<StepOutcome> {
        for body in self.hook_bodies(hook) {
            if let Err(failure) = self.invoke(&body).await {
                return Some(StepOutcome::new(label, StepState::Failed(failure)));
            }
        }
        None
    }

    async fn run_step(
        &self,
        keyword: StepKeyword,
        inherited: StepKeyword,
        title: &str,
    ) -> StepState {
        match self.lookup(keyword, inherited, title) {
            Some((StepMode::Automatic, Some(body))) => match self.invoke(&body).await {
                Ok(()) => StepState::Passed,
                Err(failure) => StepState::Failed(failure),
            },
            Some((StepMode::Skipped, _)) => StepState::Skipped,
            Some((StepMode::Automatic | StepMode::Manual, _)) | None => StepState::Pending,
        }
    }

    async fn run_variant(
        &self,
        feature: &FeatureScript,
        scenario: &ScenarioScript,
        variant: &str,
    ) -> CaseOutcome {
        let started = Instant::now();
        let mut steps = Vec::new();
        let mut failed = false;
        if let Some(outcome) = self
            .run_variant_hooks(HookKind::BeforeEachVariant, "\"before each variant\" hook")
            .await
        {
            steps.push(outcome);
            failed = true;
        }
        let mut inherited = StepKeyword::Given;
        for (keyword, title) in scenario.steps() {
            let state = if failed {
                StepState::Skipped
            } else {
                self.run_step(*keyword, inherited, title).await
            };
            if !matches!(keyword, StepKeyword::And | StepKeyword::But) {
                inherited = *keyword;
            }
            failed |= matches!(state, StepState::Failed(_));
            steps.push(StepOutcome::new(title.as_str(), state));
        }
        if let Some(outcome) = self
            .run_variant_hooks(HookKind::AfterEachVariant, "\"after each variant\" hook")
            .await
        {
            steps.push(outcome);
        }

        let outcome = steps.into_iter().fold(
            CaseOutcome::new(feature.title(), scenario.title(), variant)
                .with_duration(started.elapsed()),
            CaseOutcome::with_step,
        );
        if scenario.is_reported_failed() {
            outcome.marked_buggy(true)
        } else {
            outcome
        }
    }

    fn selected(&self, scenario: &ScenarioScript) -> bool {
        self.options
            .filter
            .as_deref()
            .is_none_or(|filter| scenario.title().contains(filter))
    }

    async fn execute(&mut self, observer: &dyn RunObserver) -> Result<(), EngineError> {
        let context = self.context.clone().ok_or_else(|| {
            EngineError::Load("registration context is not ready; load files first".into())
        })?;
        let queued = mem::take(&mut self.queued);
        let mut features = Vec::new();
        for path in &queued {
            let spec = self
                .specs
                .get(path)
                .ok_or_else(|| EngineError::UnknownSpec(path.clone()))?;
            if let Some(definitions) = spec.definitions() {
                definitions(&context)?;
            }
            features.extend(spec.features().iter().cloned());
        }

        let mut failed = 0;
        self.run_hooks(HookKind::BeforeAll, &mut failed).await?;
        'features: for feature in &features {
            self.run_hooks(HookKind::BeforeFeature, &mut failed).await?;
            for scenario in feature.scenarios().iter().filter(|s| self.selected(s)) {
                self.run_hooks(HookKind::BeforeScenario, &mut failed).await?;
                self.run_hooks(HookKind::BeforeEachScenario, &mut failed).await?;
                for variant in scenario.variant_titles() {
                    let outcome = self.run_variant(feature, scenario, variant).await;
                    failed += outcome
                        .steps()
                        .iter()
                        .filter(|step| step.failure().is_some())
                        .count();
                    debug!(
                        case = %outcome.display_name(),
                        buggy = outcome.is_buggy(),
                        "variant end"
                    );
                    observer.on_case_finished(&outcome);
                    if outcome.is_buggy() && self.options.bail {
                        break 'features;
                    }
                }
                self.run_hooks(HookKind::AfterEachScenario, &mut failed).await?;
                self.run_hooks(HookKind::AfterScenario, &mut failed).await?;
            }
            self.run_hooks(HookKind::AfterFeature, &mut failed).await?;
        }
        self.run_hooks(HookKind::AfterAll, &mut failed).await?;

        if let Some(message) = &self.fatal_error {
            return Err(EngineError::Execution(message.clone()));
        }
        if self.reports_run_finished {
            observer.on_run_finished(self.failed_count_override.unwrap_or(failed));
        }
        Ok(())
    }
}

impl SpecEngine for ScriptedEngine {
    fn from_options(options: &EngineOptions) -> Self {
        Self::new(options.clone())
    }

    fn on_context_ready(&mut self, hook: SetupHook) {
        self.setup = Some(hook);
    }

    fn load_files(&mut self) -> Result<(), EngineError> {
        self.journal.record("load_files");
        if let Some(message) = &self.load_error {
            return Err(EngineError::Load(message.clone()));
        }
        let mut context = self.recording_context();
        if let Some(setup) = self.setup.take() {
            setup(&mut context);
        }
        for fixture in &self.fixtures {
            fixture(&context)?;
        }
        self.context = Some(context);
        Ok(())
    }

    fn add_files(&mut self, specs: Vec<Utf8PathBuf>) {
        self.journal.record("add_files");
        self.queued.extend(specs);
    }

    fn run<'a>(
        &'a mut self,
        observer: &'a dyn RunObserver,
    ) -> LocalBoxFuture<'a, Result<(), EngineError>> {
        self.journal.record("run");
        self.execute(observer).boxed_local()
    }
}
