//! Behavioural tests for whole runs driven through the scripted engine.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bdd_flow::error::{EngineError, MessageError, RegistrationError, SetupError};
use bdd_flow::reduce::INCONSISTENT_CASE_MESSAGE;
use bdd_flow::test_support::{
    FeatureScript, Journal, RecordingHost, ScenarioScript, ScriptedEngine, SpecFile, StepMode,
};
use bdd_flow::{
    Assertion, BodyStyle, Completion, CompletionHook, EngineOptions, HookKind, HostEvent,
    LocalHarness, Orchestrator, Registration, RunError, RunState, RunnerConfig, StepBody,
    StepFailure, StepKeyword, StepVariant, TaskQueue, TestInfo,
};
use common::run_scripted;
use rstest::{fixture, rstest};

const LOGIN: &str = "features/login.spec";
const CATALOGUE: &str = "features/catalogue.spec";

fn passing() -> StepBody {
    StepBody::sync(|| Ok(()))
}

fn login_spec(submit: StepBody) -> SpecFile {
    SpecFile::new(LOGIN)
        .with_definitions(move |context| {
            context.register_step(
                StepKeyword::Given,
                Registration::new("a registered user")
                    .with_body(passing().with_signature("fn a_registered_user()")),
            )?;
            context.register_step(
                StepKeyword::When,
                Registration::new("they submit their password").with_body(submit.clone()),
            )?;
            context.register_step(
                StepKeyword::Then,
                Registration::new("the dashboard is shown")
                    .with_body(StepBody::future(|| async { Ok(()) })),
            )
        })
        .with_feature(
            FeatureScript::new("Login").with_scenario(
                ScenarioScript::new("Password login")
                    .with_variant("admin user")
                    .with_step(StepKeyword::Given, "a registered user")
                    .with_step(StepKeyword::When, "they submit their password")
                    .with_step(StepKeyword::Then, "the dashboard is shown"),
            ),
        )
}

fn search() -> ScenarioScript {
    ScenarioScript::new("Search")
        .with_variant("books")
        .with_variant("films")
        .with_step(StepKeyword::Given, "the catalogue is open")
        .with_step(StepKeyword::When, "they search")
        .with_step(StepKeyword::Then, "results are shown")
}

fn empty_search() -> ScenarioScript {
    ScenarioScript::new("Empty search")
        .with_step(StepKeyword::Given, "the catalogue is open")
        .with_step(StepKeyword::Then, "no results are shown")
        .with_step(StepKeyword::And, "results are shown")
}

fn catalogue_spec(scenarios: Vec<ScenarioScript>) -> SpecFile {
    let feature = scenarios
        .into_iter()
        .fold(FeatureScript::new("Catalogue"), FeatureScript::with_scenario);
    SpecFile::new(CATALOGUE)
        .with_definitions(|context| {
            context.register_step(
                StepKeyword::Given,
                Registration::new("the catalogue is open").with_body(passing()),
            )?;
            context.register_step(
                StepKeyword::When,
                Registration::new("they search").with_body(StepBody::future(|| async {
                    tokio::task::yield_now().await;
                    Ok(())
                })),
            )?;
            context.register_step(
                StepKeyword::Then,
                Registration::new("no results are shown").with_body(StepBody::sync(|| {
                    Err(StepFailure::with_stack("3 results shown", "at results.rs:7"))
                })),
            )?;
            context.register_step(
                StepKeyword::Then,
                Registration::new("results are shown").with_body(StepBody::callback(
                    |done: Completion| {
                        done.pass();
                    },
                )),
            )
        })
        .with_feature(feature)
}

#[fixture]
fn queue() -> TaskQueue {
    TaskQueue::new()
}

#[rstest]
fn all_passing_steps_produce_one_passing_record(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default().with_spec(login_spec(passing()));

    let finished = run_scripted(&host, engine, &queue, &[LOGIN]);

    assert_eq!(finished.state, RunState::Resolved);
    let report = finished.report();
    assert_eq!(report.failed_count(), 0);
    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert_eq!(record.description(), "Password login --> admin user");
    assert_eq!(record.assertions(), [Assertion::Passed]);
    assert_eq!(
        host.events(),
        [HostEvent::TestPass(TestInfo::new(
            "Password login --> admin user",
            "Login"
        ))]
    );
    assert_eq!(queue.resets(), 3);
}

#[rstest]
fn failing_step_is_named_in_the_record(queue: TaskQueue) {
    let host = RecordingHost::default();
    let submit = StepBody::sync(|| {
        Err(StepFailure::with_stack(
            "boom",
            "at submit_password (login.rs:12)",
        ))
    });
    let engine = ScriptedEngine::default().with_spec(login_spec(submit));

    let report = run_scripted(&host, engine, &queue, &[LOGIN]).report();

    assert_eq!(report.failed_count(), 1);
    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert_eq!(
        record.description(),
        "Password login --> admin user --> they submit their password"
    );
    assert_eq!(
        record.assertions(),
        [Assertion::Failed {
            error_msg: "boom".into(),
            stack_trace: "at submit_password (login.rs:12)".into(),
        }]
    );
    assert!(matches!(host.events().as_slice(), [HostEvent::TestFail(_)]));
    // The step after the failure never runs, so only two bodies settled.
    assert_eq!(queue.resets(), 2);
}

#[rstest]
fn records_follow_case_emission_order(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine =
        ScriptedEngine::default().with_spec(catalogue_spec(vec![search(), empty_search()]));

    let report = run_scripted(&host, engine, &queue, &[CATALOGUE]).report();

    let descriptions: Vec<_> = report
        .spec_results()
        .iter()
        .map(|record| record.description())
        .collect();
    assert_eq!(
        descriptions,
        [
            "Search --> books",
            "Search --> films",
            "Empty search --> default --> no results are shown",
        ]
    );
    assert_eq!(host.events().len(), report.spec_results().len());
    assert_eq!(report.failed_count(), 1);
    assert_eq!(queue.resets(), 8);
}

#[rstest]
fn failed_count_comes_from_the_engine(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default()
        .with_spec(login_spec(passing()))
        .reporting_failed_count(9);

    let report = run_scripted(&host, engine, &queue, &[LOGIN]).report();

    assert_eq!(report.failed_count(), 9);
    assert_eq!(report.failing_records(), 0);
}

#[rstest]
fn rejected_post_run_hook_rejects_the_run(queue: TaskQueue) {
    let config = RunnerConfig::default().with_on_complete(CompletionHook::new(|| async {
        Err(MessageError::boxed("upload failed"))
    }));
    let host = RecordingHost::new(config);
    let engine = ScriptedEngine::default().with_spec(login_spec(passing()));

    let finished = run_scripted(&host, engine, &queue, &[LOGIN]);

    assert_eq!(finished.state, RunState::Rejected);
    let RunError::PostRunHook(reason) = finished.rejection() else {
        panic!("expected the post-run hook's rejection");
    };
    assert_eq!(reason.to_string(), "upload failed");
    assert_eq!(host.events().len(), 1);
}

#[rstest]
fn panicking_post_run_hook_rejects_the_run(queue: TaskQueue) {
    let config = RunnerConfig::default()
        .with_on_complete(CompletionHook::sync(|| panic!("upload crashed")));
    let host = RecordingHost::new(config);
    let engine = ScriptedEngine::default().with_spec(login_spec(passing()));

    let finished = run_scripted(&host, engine, &queue, &[LOGIN]);

    assert_eq!(finished.state, RunState::Rejected);
    let RunError::PostRunHook(reason) = finished.rejection() else {
        panic!("expected the post-run hook's panic as a rejection");
    };
    assert_eq!(reason.to_string(), "upload crashed");
}

#[rstest]
fn post_run_hook_is_awaited_before_resolving(queue: TaskQueue) {
    let completed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&completed);
    let config = RunnerConfig::default().with_on_complete(CompletionHook::new(move || {
        let flag = Rc::clone(&flag);
        async move {
            tokio::task::yield_now().await;
            flag.set(true);
            Ok(())
        }
    }));
    let host = RecordingHost::new(config);

    let finished = run_scripted(&host, ScriptedEngine::default(), &queue, &[]);

    assert!(finished.outcome.is_ok());
    assert!(completed.get());
}

#[rstest]
#[case::missing_step(
    ScriptedEngine::default().without_step(StepKeyword::When),
    SetupError::MissingStep(StepKeyword::When)
)]
#[case::missing_hook(
    ScriptedEngine::default().without_hook(HookKind::AfterEachVariant),
    SetupError::MissingHook(HookKind::AfterEachVariant)
)]
fn incomplete_context_rejects_before_preparing(
    queue: TaskQueue,
    #[case] engine: ScriptedEngine,
    #[case] expected: SetupError,
) {
    let host = RecordingHost::default();

    let finished = run_scripted(&host, engine.with_spec(login_spec(passing())), &queue, &[LOGIN]);

    assert_eq!(finished.state, RunState::Rejected);
    let RunError::Setup(error) = finished.rejection() else {
        panic!("expected a setup error");
    };
    assert_eq!(error, expected);
    assert_eq!(host.preparer_calls(), 0);
    assert!(host.events().is_empty());
}

#[rstest]
fn load_failure_rejects_the_run(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default().with_load_error("fixtures missing");

    let error = run_scripted(&host, engine, &queue, &[]).rejection();

    assert!(matches!(
        error,
        RunError::Engine(EngineError::Load(ref message)) if message == "fixtures missing"
    ));
    assert_eq!(host.preparer_calls(), 0);
}

#[rstest]
fn preparer_failure_stops_before_adding_files(queue: TaskQueue) {
    let journal = Journal::new();
    let host = RecordingHost::default()
        .with_preparer_error("browser unavailable")
        .with_journal(journal.clone());
    let engine = ScriptedEngine::default()
        .with_spec(login_spec(passing()))
        .with_journal(journal.clone());

    let error = run_scripted(&host, engine, &queue, &[LOGIN]).rejection();

    let RunError::Preparer(reason) = error else {
        panic!("expected a preparer error");
    };
    assert_eq!(reason.to_string(), "browser unavailable");
    assert_eq!(journal.entries(), ["load_files", "run_test_preparer"]);
}

#[rstest]
fn collaborators_are_called_in_order(queue: TaskQueue) {
    let journal = Journal::new();
    let host = RecordingHost::default().with_journal(journal.clone());
    let engine = ScriptedEngine::default()
        .with_spec(login_spec(passing()))
        .with_journal(journal.clone());

    let finished = run_scripted(&host, engine, &queue, &[LOGIN]);

    assert!(finished.outcome.is_ok());
    assert_eq!(
        journal.entries(),
        [
            "load_files",
            "run_test_preparer",
            "add_files",
            "run",
            "testPass Password login --> admin user",
        ]
    );
}

#[rstest]
fn fatal_engine_failure_rejects_after_cases(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default()
        .with_spec(login_spec(passing()))
        .with_fatal_error("driver crashed");

    let error = run_scripted(&host, engine, &queue, &[LOGIN]).rejection();

    assert_eq!(
        error.to_string(),
        "engine failed: engine execution failed: driver crashed"
    );
    assert_eq!(host.events().len(), 1);
}

#[rstest]
fn missing_run_completion_rejects(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default()
        .with_spec(login_spec(passing()))
        .without_run_finished();

    let error = run_scripted(&host, engine, &queue, &[LOGIN]).rejection();

    assert!(matches!(error, RunError::MissingFailureCount));
}

#[rstest]
fn unknown_spec_rejects(queue: TaskQueue) {
    let host = RecordingHost::default();

    let error =
        run_scripted(&host, ScriptedEngine::default(), &queue, &["nowhere.spec"]).rejection();

    assert!(matches!(
        error,
        RunError::Engine(EngineError::UnknownSpec(ref path)) if path == "nowhere.spec"
    ));
}

#[rstest]
fn duplicate_registration_rejects(queue: TaskQueue) {
    let host = RecordingHost::default();
    let spec = SpecFile::new("dup.spec").with_definitions(|context| {
        context.register_step(StepKeyword::Given, Registration::new("twice").with_body(passing()))?;
        context.register_step(StepKeyword::Given, Registration::new("twice").with_body(passing()))
    });
    let engine = ScriptedEngine::default().with_spec(spec);

    let error = run_scripted(&host, engine, &queue, &["dup.spec"]).rejection();

    let RunError::Engine(EngineError::Registration(RegistrationError::Duplicate {
        keyword,
        title,
    })) = error
    else {
        panic!("expected a duplicate registration");
    };
    assert_eq!((keyword.as_str(), title.as_str()), ("given", "twice"));
}

#[rstest]
fn adapted_context_keeps_auxiliary_variants(queue: TaskQueue) {
    let host = RecordingHost::default();
    let spec = SpecFile::new("variants.spec").with_definitions(|context| {
        context.register_step(
            StepKeyword::Given,
            Registration::new("an automated check")
                .with_body(passing().with_signature("fn automated_check()")),
        )?;
        context.register_step_variant(
            StepKeyword::Given,
            StepVariant::Async,
            Registration::new("an aliased check").with_body(passing()),
        )?;
        context.register_step_variant(
            StepKeyword::Then,
            StepVariant::Manual,
            Registration::new("a manual check").with_body(passing()),
        )?;
        context.register_step_variant(
            StepKeyword::Then,
            StepVariant::ManualSkip,
            Registration::new("a skipped manual check"),
        )?;
        context.register_step_variant(
            StepKeyword::When,
            StepVariant::Skip,
            Registration::new("a skipped check").with_body(passing()),
        )
    });
    let engine = ScriptedEngine::default().with_spec(spec);

    let finished = run_scripted(&host, engine, &queue, &["variants.spec"]);
    assert!(finished.outcome.is_ok());
    let engine = finished.engine;

    let Some(given) = engine.context().and_then(|context| context.step(StepKeyword::Given)) else {
        panic!("context should hold the given keyword");
    };
    assert!(Rc::ptr_eq(&given.primary, &given.alias));

    let automated = engine.registered_step(StepKeyword::Given, "an automated check");
    assert_eq!(automated.as_ref().map(StepBody::style), Some(BodyStyle::Callback));
    assert_eq!(
        automated.as_ref().map(StepBody::signature),
        Some("fn automated_check()")
    );
    let aliased = engine.registered_step(StepKeyword::Given, "an aliased check");
    assert_eq!(aliased.map(|body| body.style()), Some(BodyStyle::Callback));

    let manual = engine.registered_step(StepKeyword::Then, "a manual check");
    assert_eq!(manual.map(|body| body.style()), Some(BodyStyle::Sync));
    assert_eq!(
        engine.registered_mode(StepKeyword::Then, "a manual check"),
        Some(StepMode::Manual)
    );
    assert_eq!(
        engine.registered_mode(StepKeyword::Then, "a skipped manual check"),
        Some(StepMode::Skipped)
    );
    let skipped = engine.registered_step(StepKeyword::When, "a skipped check");
    assert_eq!(skipped.map(|body| body.style()), Some(BodyStyle::Sync));
}

#[rstest]
fn pending_registration_passes_through(queue: TaskQueue) {
    let host = RecordingHost::default();
    let spec = SpecFile::new("pending.spec")
        .with_definitions(|context| {
            context.register_step(
                StepKeyword::Given,
                Registration::new("a pending step").with_data(serde_json::json!({"user": "admin"})),
            )
        })
        .with_feature(FeatureScript::new("Pending").with_scenario(
            ScenarioScript::new("Not yet written").with_step(StepKeyword::Given, "a pending step"),
        ));
    let engine = ScriptedEngine::default().with_spec(spec);

    let finished = run_scripted(&host, engine, &queue, &["pending.spec"]);

    assert_eq!(
        finished
            .engine
            .registered_mode(StepKeyword::Given, "a pending step"),
        Some(StepMode::Automatic)
    );
    assert!(
        finished
            .engine
            .registered_step(StepKeyword::Given, "a pending step")
            .is_none()
    );
    let report = finished.report();
    assert_eq!(report.failing_records(), 0);
    assert_eq!(queue.resets(), 0);
}

#[rstest]
fn case_failed_without_failed_step_gets_synthetic_record(queue: TaskQueue) {
    let host = RecordingHost::default();
    let spec = catalogue_spec(vec![
        ScenarioScript::new("Flaky")
            .with_step(StepKeyword::Given, "the catalogue is open")
            .reported_failed(),
    ]);
    let engine = ScriptedEngine::default().with_spec(spec);

    let report = run_scripted(&host, engine, &queue, &[CATALOGUE]).report();

    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert_eq!(record.description(), "Flaky --> default --> <unknown step>");
    assert_eq!(record.assertion().error_msg(), Some(INCONSISTENT_CASE_MESSAGE));
    assert_eq!(report.failed_count(), 0);
    assert!(matches!(host.events().as_slice(), [HostEvent::TestFail(_)]));
}

#[rstest]
fn bail_stops_after_first_failing_case(queue: TaskQueue) {
    let host = RecordingHost::default();
    let options = EngineOptions {
        bail: true,
        ..EngineOptions::default()
    };
    let engine =
        ScriptedEngine::new(options).with_spec(catalogue_spec(vec![empty_search(), search()]));

    let report = run_scripted(&host, engine, &queue, &[CATALOGUE]).report();

    assert_eq!(report.spec_results().len(), 1);
    assert_eq!(report.failing_records(), 1);
}

#[rstest]
fn filter_selects_scenarios_by_title(queue: TaskQueue) {
    let host = RecordingHost::default();
    let options = EngineOptions {
        filter: Some("Empty".into()),
        ..EngineOptions::default()
    };
    let engine =
        ScriptedEngine::new(options).with_spec(catalogue_spec(vec![search(), empty_search()]));

    let report = run_scripted(&host, engine, &queue, &[CATALOGUE]).report();

    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert!(record.description().starts_with("Empty search"));
}

#[rstest]
fn never_settled_step_times_out(queue: TaskQueue) {
    let parked: Rc<RefCell<Vec<Completion>>> = Rc::default();
    let keep = Rc::clone(&parked);
    let hanging = StepBody::callback(move |done: Completion| keep.borrow_mut().push(done));
    let options = EngineOptions {
        timeout_ms: 20,
        ..EngineOptions::default()
    };
    let host = RecordingHost::default();
    let engine = ScriptedEngine::new(options).with_spec(login_spec(hanging));

    let report = run_scripted(&host, engine, &queue, &[LOGIN]).report();

    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert_eq!(
        record.assertion().error_msg(),
        Some("timeout of 20ms exceeded")
    );
    assert_eq!(parked.borrow().len(), 1);
}

#[rstest]
fn failing_variant_hook_is_reported_as_the_failed_step(queue: TaskQueue) {
    let host = RecordingHost::default();
    let hooked = SpecFile::new("hooks.spec").with_definitions(|context| {
        context.register_hook(
            HookKind::BeforeEachVariant,
            Registration::new("").with_body(StepBody::sync(|| {
                Err(StepFailure::with_stack("session expired", ""))
            })),
        )
    });
    let engine = ScriptedEngine::default()
        .with_spec(hooked)
        .with_spec(login_spec(passing()));

    let finished = run_scripted(&host, engine, &queue, &["hooks.spec", LOGIN]);

    assert_eq!(finished.engine.hook_count(HookKind::BeforeEachVariant), 1);
    let report = finished.report();
    let [record] = report.spec_results() else {
        panic!("expected exactly one record");
    };
    assert_eq!(
        record.description(),
        "Password login --> admin user --> \"before each variant\" hook"
    );
    assert_eq!(queue.resets(), 1);
}

#[rstest]
fn failing_suite_hook_rejects_the_run(queue: TaskQueue) {
    let host = RecordingHost::default();
    let engine = ScriptedEngine::default()
        .with_fixture(|context| {
            context.register_hook(
                HookKind::BeforeAll,
                Registration::new("").with_body(StepBody::sync(|| {
                    Err(StepFailure::with_stack("no browser", ""))
                })),
            )
        })
        .with_spec(login_spec(passing()));

    let error = run_scripted(&host, engine, &queue, &[LOGIN]).rejection();

    assert!(error.to_string().contains("`beforeAll` hook failed: no browser"));
    assert!(host.events().is_empty());
}

#[test]
fn second_run_is_refused() {
    let host = RecordingHost::default();
    let outcome = LocalHarness::new().block_on(async {
        let mut orchestrator = Orchestrator::with_engine(&host, ScriptedEngine::default());
        let first = orchestrator.run(Vec::new()).await;
        let second = orchestrator.run(Vec::new()).await;
        (first.is_ok(), second, orchestrator.state())
    });
    let Ok((first_ok, second, state)) = outcome else {
        panic!("runtime should build");
    };
    assert!(first_ok);
    assert!(matches!(second, Err(RunError::AlreadyStarted)));
    assert_eq!(state, RunState::Resolved);
}

#[test]
fn initialize_builds_engine_from_configured_options() {
    let config = RunnerConfig::default().apply_overrides(None, Some(75));
    let host = RecordingHost::new(config);
    let orchestrator = Orchestrator::<ScriptedEngine>::initialize(&host);
    assert_eq!(orchestrator.state(), RunState::Idle);
    assert_eq!(orchestrator.engine().options().timeout_ms, 75);
}

#[test]
fn harness_runs_with_a_fresh_engine() {
    let host = RecordingHost::default();
    let Ok(report) = LocalHarness::new().run::<ScriptedEngine>(&host, Vec::new()) else {
        panic!("empty run should resolve");
    };
    assert_eq!(report.failed_count(), 0);
    assert!(report.spec_results().is_empty());
    assert_eq!(host.preparer_calls(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn run_inside_a_local_set() {
    let host = RecordingHost::default();
    let outcome = tokio::task::LocalSet::new()
        .run_until(bdd_flow::run::<ScriptedEngine>(&host, vec!["missing.spec".into()]))
        .await;
    assert!(matches!(
        outcome,
        Err(RunError::Engine(EngineError::UnknownSpec(_)))
    ));
}
