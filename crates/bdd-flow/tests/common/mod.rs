//! Common helpers for behavioural tests.

use std::rc::Rc;

use bdd_flow::test_support::{RecordingHost, ScriptedEngine};
use bdd_flow::{LocalHarness, Orchestrator, RunError, RunReport, RunState, TaskQueue};
use camino::Utf8PathBuf;

/// Everything a finished scripted run leaves behind.
pub struct Finished {
    /// Outcome of the run.
    pub outcome: Result<RunReport, RunError>,
    /// Engine, for inspecting what was registered.
    pub engine: ScriptedEngine,
    /// Orchestrator state once the run settled.
    pub state: RunState,
}

impl Finished {
    /// Returns the report, failing the test when the run was rejected.
    pub fn report(self) -> RunReport {
        match self.outcome {
            Ok(report) => report,
            Err(err) => panic!("run should resolve: {err}"),
        }
    }

    /// Returns the rejection, failing the test when the run resolved.
    pub fn rejection(self) -> RunError {
        match self.outcome {
            Ok(report) => panic!("run should reject, got {report:?}"),
            Err(err) => err,
        }
    }
}

/// Runs `specs` through `engine`, queueing wrapped bodies on `queue`.
pub fn run_scripted(
    host: &RecordingHost,
    engine: ScriptedEngine,
    queue: &TaskQueue,
    specs: &[&str],
) -> Finished {
    let specs: Vec<Utf8PathBuf> = specs.iter().copied().map(Utf8PathBuf::from).collect();
    let finished = LocalHarness::new().block_on(async {
        let mut orchestrator =
            Orchestrator::with_engine(host, engine).with_scheduler(Rc::new(queue.clone()));
        let outcome = orchestrator.run(specs).await;
        let state = orchestrator.state();
        Finished {
            outcome,
            engine: orchestrator.into_engine(),
            state,
        }
    });
    match finished {
        Ok(finished) => finished,
        Err(err) => panic!("runtime should build: {err}"),
    }
}
