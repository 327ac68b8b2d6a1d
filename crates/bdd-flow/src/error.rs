//! Error types shared across the adapter and the run orchestrator.
//!
//! Each concern gets its own enum so callers can tell a setup problem apart
//! from an engine failure or a failing post-run hook. Everything funnels into
//! [`RunError`], the single rejection type of a run.

use std::backtrace::Backtrace;
use std::fmt;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::keyword::{HookKind, StepKeyword};

/// Boxed error returned by host-supplied operations such as the test preparer
/// and the post-run hook.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Outcome of one step or hook body.
pub type StepResult = Result<(), StepFailure>;

/// Failure raised by a step or hook body.
///
/// Carries the error message and a rendered stack trace. Failures created
/// with [`StepFailure::new`] capture a backtrace at the construction site;
/// [`StepFailure::with_stack`] stores a caller-supplied trace verbatim.
///
/// # Examples
///
/// ```
/// use bdd_flow::StepFailure;
///
/// let failure = StepFailure::with_stack("boom", "at step.rs:12");
/// assert_eq!(failure.message(), "boom");
/// assert_eq!(failure.stack(), "at step.rs:12");
/// assert_eq!(failure.to_string(), "boom");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepFailure {
    message: String,
    stack: String,
}

impl StepFailure {
    /// Creates a failure and captures the current backtrace as its stack.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Backtrace::capture().to_string(),
        }
    }

    /// Creates a failure with an explicit stack trace.
    #[must_use]
    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Converts any error into a failure using its `Display` output.
    #[must_use]
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        Self::new(error.to_string())
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the rendered stack trace.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }
}

/// Errors raised by a registration function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A body with the same keyword and title is already registered.
    #[error("duplicate {keyword} registration: {title}")]
    Duplicate {
        /// Registration keyword or hook name.
        keyword: String,
        /// Title of the rejected registration.
        title: String,
    },

    /// The requested variant (for example `manual` or `skip`) is not offered
    /// for this keyword.
    #[error("{keyword} does not offer a {variant} variant")]
    UnsupportedVariant {
        /// Registration keyword or hook name.
        keyword: String,
        /// Name of the missing variant.
        variant: &'static str,
    },

    /// The registration context has no entry for the keyword.
    #[error("no registration function for {0}")]
    Unavailable(String),
}

/// Errors raised while installing adapted registration functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// The engine context has no registration function for a step keyword.
    #[error("registration context has no `{0}` step function")]
    MissingStep(StepKeyword),

    /// The engine context has no registration function for a hook.
    #[error("registration context has no `{0}` hook function")]
    MissingHook(HookKind),
}

/// Errors reported by the specification engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading spec or fixture files failed.
    #[error("failed to load spec files: {0}")]
    Load(String),

    /// A spec path handed to the engine is unknown to it.
    #[error("unknown spec file: {0}")]
    UnknownSpec(Utf8PathBuf),

    /// A spec file's registrations were rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The engine failed while executing cases.
    #[error("engine execution failed: {0}")]
    Execution(String),
}

/// Errors raised while reading runner configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value could not be interpreted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Engine options were not valid JSON for [`EngineOptions`].
    ///
    /// [`EngineOptions`]: crate::config::EngineOptions
    #[error("invalid engine options: {0}")]
    EngineOptions(#[from] serde_json::Error),
}

/// Rejection reason of a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Installing the adapted registration functions failed.
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    /// The engine reported a fatal failure.
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),

    /// The host's test preparer failed.
    #[error("test preparer failed: {0}")]
    Preparer(BoxError),

    /// The configured post-run hook failed.
    #[error("post-run hook failed: {0}")]
    PostRunHook(BoxError),

    /// The engine finished without reporting its failure count.
    #[error("engine finished without reporting a failure count")]
    MissingFailureCount,

    /// The orchestrator was asked to run more than once.
    #[error("run already started")]
    AlreadyStarted,

    /// The local runtime driving the run could not be built.
    #[error("failed to build local runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Plain message error used to box string failures from host callbacks.
///
/// # Examples
///
/// ```
/// use bdd_flow::error::{BoxError, MessageError};
///
/// let error: BoxError = MessageError::boxed("browser unavailable");
/// assert_eq!(error.to_string(), "browser unavailable");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError(pub String);

impl MessageError {
    /// Boxes a message as a [`BoxError`].
    #[must_use]
    pub fn boxed(message: impl Into<String>) -> BoxError {
        Box::new(Self(message.into()))
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}
