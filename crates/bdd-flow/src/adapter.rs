//! Runs step and hook bodies as tasks on the cooperative scheduler.
//!
//! [`FlowAdapter`] replaces registration functions with versions whose
//! registered body is a completion-style wrapper. When the engine invokes the
//! wrapper with its completion handle, the wrapper:
//!
//! 1. instruments the handle so the scheduler queue is reset right before
//!    the engine's own callback runs;
//! 2. queues the user body as one [`Task`], without passing it the engine's
//!    handle;
//! 3. settles the handle with the task's outcome once the task settles.
//!
//! Success and failure both go through the instrumented handle, so every
//! invocation resets the queue exactly once.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::body::StepBody;
use crate::completion::Completion;
use crate::error::SetupError;
use crate::keyword::{HookKind, StepKeyword};
use crate::registration::{
    HookCapabilities, RegisterFn, Registration, RegistrationContext, StepCapabilities,
};
use crate::scheduler::{Scheduler, Task};

/// Wraps registration functions so bodies run on a [`Scheduler`].
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use bdd_flow::{FlowAdapter, StepBody, TaskQueue};
///
/// let adapter = FlowAdapter::new(Rc::new(TaskQueue::new()));
/// let body = StepBody::sync(|| Ok(())).with_signature("fn a_user()");
/// let wrapped = adapter.wrap_body("Given a user", body);
/// assert_eq!(wrapped.signature(), "fn a_user()");
/// ```
#[derive(Clone)]
pub struct FlowAdapter {
    scheduler: Rc<dyn Scheduler>,
}

impl FlowAdapter {
    /// Creates an adapter queuing work on `scheduler`.
    #[must_use]
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Returns the scheduler the adapter queues work on.
    #[must_use]
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    /// Wraps one body. The wrapper keeps the body's signature.
    ///
    /// The wrapper spawns a local task to observe the queued task's outcome,
    /// so the engine must invoke it inside a Tokio `LocalSet`.
    #[must_use]
    pub fn wrap_body(&self, label: &str, body: StepBody) -> StepBody {
        let scheduler = Rc::clone(&self.scheduler);
        let signature = body.shared_signature();
        let label: Rc<str> = Rc::from(label);
        StepBody::callback(move |done: Completion| {
            let reset_target = Rc::clone(&scheduler);
            done.instrument(move || reset_target.reset());

            let handle = scheduler.execute(Task::new(label.as_ref(), body.settle()));
            trace!(task = %label, "wrapped body queued");
            tokio::task::spawn_local(async move {
                done.complete(handle.await);
            });
        })
        .with_signature(signature)
    }

    /// Wraps a registration function.
    ///
    /// Registrations without a body are forwarded unchanged.
    #[must_use]
    pub fn wrap_register(&self, register: RegisterFn) -> RegisterFn {
        let adapter = self.clone();
        Rc::new(move |registration: Registration| {
            let registration = registration.map_body(|title, body| adapter.wrap_body(title, body));
            register(registration)
        })
    }

    /// Adapts the capabilities of one step keyword.
    ///
    /// The primary function is wrapped and the `async` alias points at the
    /// wrapped function. Manual and skip variants are kept as they are.
    #[must_use]
    pub fn adapt_step(&self, capabilities: &StepCapabilities) -> StepCapabilities {
        let primary = self.wrap_register(Rc::clone(&capabilities.primary));
        StepCapabilities {
            alias: Rc::clone(&primary),
            primary,
            manual: capabilities.manual.clone(),
            skip: capabilities.skip.clone(),
        }
    }

    /// Adapts the capabilities of one hook.
    #[must_use]
    pub fn adapt_hook(&self, capabilities: &HookCapabilities) -> HookCapabilities {
        HookCapabilities::new(self.wrap_register(Rc::clone(&capabilities.primary)))
    }

    /// Adapts every step keyword and hook of an engine context in place.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] naming the first keyword or hook missing from
    /// the context. Entries adapted before the error stay adapted.
    pub fn adapt_context(&self, context: &mut RegistrationContext) -> Result<(), SetupError> {
        for keyword in StepKeyword::ALL {
            let adapted = self.adapt_step(
                context
                    .step(keyword)
                    .ok_or(SetupError::MissingStep(keyword))?,
            );
            context.insert_step(keyword, adapted);
        }
        for hook in HookKind::ALL {
            let adapted = self.adapt_hook(context.hook(hook).ok_or(SetupError::MissingHook(hook))?);
            context.insert_hook(hook, adapted);
        }
        debug!("step and hook registration functions adapted");
        Ok(())
    }
}
