//! Registration functions and the capability sets that group them.
//!
//! The specification engine exposes one registration function per step
//! keyword and per hook. Each step keyword also carries an `async` alias and
//! optional `manual`, `manual.skip` and `skip` variants. Instead of hanging
//! those off a function object, they are grouped into [`StepCapabilities`]
//! and [`HookCapabilities`] and collected in a [`RegistrationContext`].

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::body::StepBody;
use crate::error::RegistrationError;
use crate::keyword::{HookKind, StepKeyword};

/// A registration function as exposed by the specification engine.
pub type RegisterFn = Rc<dyn Fn(Registration) -> Result<(), RegistrationError>>;

/// Arguments of one registration call.
///
/// `data` carries configuration values (for example a dataset for variants).
/// A registration without a body describes a pending step.
///
/// # Examples
///
/// ```
/// use bdd_flow::{Registration, StepBody};
///
/// let pending = Registration::new("the user is logged in")
///     .with_data(serde_json::json!({"user": "admin"}));
/// assert!(pending.body().is_none());
///
/// let step = Registration::new("the user is logged in").with_body(StepBody::sync(|| Ok(())));
/// assert!(step.body().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Registration {
    title: String,
    data: Vec<serde_json::Value>,
    body: Option<StepBody>,
}

impl Registration {
    /// Starts a registration with a title and no body.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: Vec::new(),
            body: None,
        }
    }

    /// Appends a configuration value.
    #[must_use]
    pub fn with_data(mut self, value: serde_json::Value) -> Self {
        self.data.push(value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: StepBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the configuration values.
    #[must_use]
    pub fn data(&self) -> &[serde_json::Value] {
        &self.data
    }

    /// Returns the body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&StepBody> {
        self.body.as_ref()
    }

    /// Replaces the body through `map`, leaving body-less registrations
    /// untouched.
    #[must_use]
    pub fn map_body(self, map: impl FnOnce(&str, StepBody) -> StepBody) -> Self {
        let Self { title, data, body } = self;
        let body = body.map(|body| map(&title, body));
        Self { title, data, body }
    }
}

/// Manual variant of a step keyword and its own skip variant.
#[derive(Clone)]
pub struct ManualVariant {
    /// Registers a manual step.
    pub register: RegisterFn,
    /// Registers a skipped manual step.
    pub skip: Option<RegisterFn>,
}

/// Registration functions available for one step keyword.
#[derive(Clone)]
pub struct StepCapabilities {
    /// Main registration function.
    pub primary: RegisterFn,
    /// Backwards-compatible `async` alias.
    pub alias: RegisterFn,
    /// Manual variant, when the engine offers one.
    pub manual: Option<ManualVariant>,
    /// Skip variant, when the engine offers one.
    pub skip: Option<RegisterFn>,
}

impl StepCapabilities {
    /// Creates capabilities whose alias points at `primary`.
    #[must_use]
    pub fn new(primary: RegisterFn) -> Self {
        Self {
            alias: Rc::clone(&primary),
            primary,
            manual: None,
            skip: None,
        }
    }

    /// Sets the manual variant.
    #[must_use]
    pub fn with_manual(mut self, manual: ManualVariant) -> Self {
        self.manual = Some(manual);
        self
    }

    /// Sets the skip variant.
    #[must_use]
    pub fn with_skip(mut self, skip: RegisterFn) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Registers through the primary function.
    ///
    /// # Errors
    ///
    /// Propagates the engine's [`RegistrationError`].
    pub fn register(&self, registration: Registration) -> Result<(), RegistrationError> {
        (self.primary)(registration)
    }

    /// Registers through the `async` alias.
    ///
    /// # Errors
    ///
    /// Propagates the engine's [`RegistrationError`].
    pub fn register_async(&self, registration: Registration) -> Result<(), RegistrationError> {
        (self.alias)(registration)
    }
}

/// Registration functions available for one hook.
#[derive(Clone)]
pub struct HookCapabilities {
    /// Main registration function.
    pub primary: RegisterFn,
    /// Backwards-compatible `async` alias.
    pub alias: RegisterFn,
}

impl HookCapabilities {
    /// Creates capabilities whose alias points at `primary`.
    #[must_use]
    pub fn new(primary: RegisterFn) -> Self {
        Self {
            alias: Rc::clone(&primary),
            primary,
        }
    }

    /// Registers through the primary function.
    ///
    /// # Errors
    ///
    /// Propagates the engine's [`RegistrationError`].
    pub fn register(&self, registration: Registration) -> Result<(), RegistrationError> {
        (self.primary)(registration)
    }
}

/// Variant of a step registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepVariant {
    /// The primary function.
    Primary,
    /// The `async` alias.
    Async,
    /// The manual variant.
    Manual,
    /// The manual variant's skip function.
    ManualSkip,
    /// The skip variant.
    Skip,
}

impl StepVariant {
    const fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Async => "async",
            Self::Manual => "manual",
            Self::ManualSkip => "manual.skip",
            Self::Skip => "skip",
        }
    }
}

/// Registration functions the engine exposes to spec files.
#[derive(Clone, Default)]
pub struct RegistrationContext {
    steps: BTreeMap<StepKeyword, StepCapabilities>,
    hooks: BTreeMap<HookKind, HookCapabilities>,
}

impl RegistrationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the capabilities of a step keyword, returning the previous
    /// ones.
    pub fn insert_step(
        &mut self,
        keyword: StepKeyword,
        capabilities: StepCapabilities,
    ) -> Option<StepCapabilities> {
        self.steps.insert(keyword, capabilities)
    }

    /// Installs the capabilities of a hook, returning the previous ones.
    pub fn insert_hook(
        &mut self,
        hook: HookKind,
        capabilities: HookCapabilities,
    ) -> Option<HookCapabilities> {
        self.hooks.insert(hook, capabilities)
    }

    /// Returns the capabilities of a step keyword.
    #[must_use]
    pub fn step(&self, keyword: StepKeyword) -> Option<&StepCapabilities> {
        self.steps.get(&keyword)
    }

    /// Returns the capabilities of a hook.
    #[must_use]
    pub fn hook(&self, hook: HookKind) -> Option<&HookCapabilities> {
        self.hooks.get(&hook)
    }

    /// Registers a step through the primary function of `keyword`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Unavailable`] when the keyword has no
    /// entry, or the engine's own error.
    pub fn register_step(
        &self,
        keyword: StepKeyword,
        registration: Registration,
    ) -> Result<(), RegistrationError> {
        self.register_step_variant(keyword, StepVariant::Primary, registration)
    }

    /// Registers a step through one of the variants of `keyword`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Unavailable`] when the keyword has no
    /// entry, [`RegistrationError::UnsupportedVariant`] when the engine does
    /// not offer `variant`, or the engine's own error.
    pub fn register_step_variant(
        &self,
        keyword: StepKeyword,
        variant: StepVariant,
        registration: Registration,
    ) -> Result<(), RegistrationError> {
        let capabilities = self
            .step(keyword)
            .ok_or_else(|| RegistrationError::Unavailable(keyword.to_string()))?;
        let register = match variant {
            StepVariant::Primary => Some(&capabilities.primary),
            StepVariant::Async => Some(&capabilities.alias),
            StepVariant::Manual => capabilities.manual.as_ref().map(|manual| &manual.register),
            StepVariant::ManualSkip => capabilities
                .manual
                .as_ref()
                .and_then(|manual| manual.skip.as_ref()),
            StepVariant::Skip => capabilities.skip.as_ref(),
        };
        let register = register.ok_or_else(|| RegistrationError::UnsupportedVariant {
            keyword: keyword.to_string(),
            variant: variant.name(),
        })?;
        register(registration)
    }

    /// Registers a hook body.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Unavailable`] when the hook has no entry,
    /// or the engine's own error.
    pub fn register_hook(
        &self,
        hook: HookKind,
        registration: Registration,
    ) -> Result<(), RegistrationError> {
        self.hook(hook)
            .ok_or_else(|| RegistrationError::Unavailable(hook.to_string()))?
            .register(registration)
    }
}
