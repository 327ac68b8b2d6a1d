//! Runner configuration.
//!
//! The host runner hands a [`RunnerConfig`] to the orchestrator. It carries
//! the engine-specific options forwarded verbatim to the specification
//! engine, the log level, and an optional post-run hook. Values can be read
//! from environment variables prefixed with `BDD_FLOW_`.

use std::env;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::Deserialize;

use crate::error::{BoxError, ConfigError};

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "BDD_FLOW_LOG_LEVEL";

/// Environment variable holding engine options as a JSON object.
pub const ENGINE_OPTIONS_ENV: &str = "BDD_FLOW_ENGINE_OPTIONS";

/// Default per-runnable timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Info` when not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose logging, includes every queued task.
    Trace,
    /// Debug-level information for development.
    Debug,
    /// Standard informational messages.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for failures.
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidConfig(format!(
                "unknown log level '{s}', expected one of: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Options forwarded to the specification engine.
///
/// Unknown keys are kept in [`EngineOptions::extra`] so engines can read
/// settings this crate does not know about.
///
/// # Examples
///
/// ```
/// use bdd_flow::config::EngineOptions;
///
/// let options: EngineOptions =
///     serde_json::from_str(r#"{"timeoutMs": 500, "reporter": "dot"}"#).unwrap();
/// assert_eq!(options.timeout_ms, 500);
/// assert!(!options.bail);
/// assert_eq!(options.extra["reporter"], "dot");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    /// Per-runnable timeout in milliseconds; `0` disables it.
    pub timeout_ms: u64,
    /// Stop after the first failing case.
    pub bail: bool,
    /// Only run scenarios whose title contains this text.
    pub filter: Option<String>,
    /// Engine-specific keys not interpreted by this crate.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            bail: false,
            filter: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl EngineOptions {
    /// Returns the timeout as a [`Duration`], or `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Parses options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EngineOptions`] when the text is not a valid
    /// options object.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

type HookFn = dyn Fn() -> LocalBoxFuture<'static, Result<(), BoxError>>;

/// Optional hook awaited once every case has run.
///
/// The hook may be asynchronous. When its future resolves to an error the
/// whole run is rejected.
#[derive(Clone)]
pub struct CompletionHook(Rc<HookFn>);

impl CompletionHook {
    /// Wraps an asynchronous hook.
    #[must_use]
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), BoxError>> + 'static,
    {
        Self(Rc::new(move || hook().boxed_local()))
    }

    /// Wraps a synchronous hook.
    #[must_use]
    pub fn sync(hook: impl Fn() -> Result<(), BoxError> + 'static) -> Self {
        Self(Rc::new(move || std::future::ready(hook()).boxed_local()))
    }

    /// Invokes the hook.
    #[must_use]
    pub fn call(&self) -> LocalBoxFuture<'static, Result<(), BoxError>> {
        (self.0)()
    }
}

impl fmt::Debug for CompletionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionHook(..)")
    }
}

/// Configuration exposed by the host runner.
///
/// # Environment Variables
///
/// - `BDD_FLOW_LOG_LEVEL`: log level (trace, debug, info, warn, error)
/// - `BDD_FLOW_ENGINE_OPTIONS`: engine options as a JSON object
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Options forwarded to the specification engine.
    pub engine: EngineOptions,
    /// Log level used by [`init_logging`](crate::logging::init_logging).
    pub log_level: LogLevel,
    /// Hook awaited after the engine finishes and before the run resolves.
    pub on_complete: Option<CompletionHook>,
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Falls back to defaults for missing values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_level = lookup(LOG_LEVEL_ENV)
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();
        let engine = lookup(ENGINE_OPTIONS_ENV)
            .map(|value| EngineOptions::from_json(&value))
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            engine,
            log_level,
            on_complete: None,
        })
    }

    /// Apply optional overrides that take precedence over environment-based
    /// values.
    #[must_use]
    pub fn apply_overrides(
        mut self,
        log_level: Option<LogLevel>,
        timeout_ms: Option<u64>,
    ) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }

        if let Some(ms) = timeout_ms {
            self.engine.timeout_ms = ms;
        }

        self
    }

    /// Create a new configuration with the specified log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create a new configuration with the specified engine options.
    #[must_use]
    pub fn with_engine_options(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    /// Create a new configuration with a post-run hook.
    #[must_use]
    pub fn with_on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }
}
