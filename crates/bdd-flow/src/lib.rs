//! Runs behaviour-driven step and hook bodies on a cooperative task queue.
//!
//! A specification engine (features, scenarios, variants, steps, hooks)
//! exposes registration functions for every step keyword and hook. This
//! crate replaces them during the engine's setup phase so each registered
//! body runs as one task on a single-threaded [`Scheduler`], with the queue
//! reset whenever a wrapped body settles. It then drives the run and reduces
//! every finished case into a [`ResultRecord`] for an external orchestrator.
//!
//! # Overview
//!
//! - [`FlowAdapter`] wraps registration functions and bodies.
//! - [`TaskQueue`] is the default [`Scheduler`], built on Tokio's `LocalSet`.
//! - [`Orchestrator`](orchestrator::Orchestrator) walks one run from engine
//!   construction to the final [`RunReport`].
//! - [`reporting`] renders a report as JSON or `JUnit` XML.
//!
//! # Configuration
//!
//! [`RunnerConfig::from_env`] reads:
//!
//! - `BDD_FLOW_LOG_LEVEL`: log verbosity (trace, debug, info, warn, error)
//! - `BDD_FLOW_ENGINE_OPTIONS`: engine options as a JSON object
//!
//! # Example
//!
//! ```ignore
//! use bdd_flow::{LocalHarness, RunnerConfig};
//!
//! let config = RunnerConfig::from_env()?;
//! bdd_flow::logging::init_logging(&config);
//! let host = MyHost::new(config);
//! let report = LocalHarness::new().run::<MyEngine>(&host, specs)?;
//! ```

pub mod adapter;
pub mod body;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod harness;
pub mod host;
pub mod keyword;
pub mod logging;
pub mod orchestrator;
mod panic;
pub mod reduce;
pub mod registration;
pub mod reporting;
pub mod scheduler;

/// Test support utilities for unit and integration tests.
///
/// This module is hidden from documentation as it's intended for test use
/// only.
#[cfg(feature = "test-support")]
#[doc(hidden)]
pub mod test_support;

pub use adapter::FlowAdapter;
pub use body::{BodyStyle, StepBody};
pub use completion::{Completion, CompletionReceiver};
pub use config::{CompletionHook, EngineOptions, LogLevel, RunnerConfig};
pub use engine::{CaseOutcome, RunObserver, SetupHook, SpecEngine, StepOutcome, StepState};
pub use error::{RunError, SetupError, StepFailure, StepResult};
pub use harness::LocalHarness;
pub use host::{HostEvent, HostRunner, TestInfo};
pub use keyword::{HookKind, StepKeyword};
pub use orchestrator::{Orchestrator, RunState, run};
pub use panic::panic_message;
pub use reduce::{ResultCollector, reduce_case};
pub use registration::{
    HookCapabilities, ManualVariant, RegisterFn, Registration, RegistrationContext,
    StepCapabilities, StepVariant,
};
pub use reporting::{Assertion, ResultRecord, RunReport};
pub use scheduler::{Scheduler, Task, TaskHandle, TaskQueue};
