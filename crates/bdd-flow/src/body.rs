//! User-authored step and hook bodies.
//!
//! A [`StepBody`] can be written in three styles: a synchronous function, a
//! function returning a future, or a function receiving an explicit
//! [`Completion`]. [`StepBody::settle`] folds all three into one
//! `LocalBoxFuture<StepResult>`, catching panics on the way so a body that
//! blows up still produces a failure instead of unwinding through the
//! scheduler.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::completion::Completion;
use crate::error::StepResult;
use crate::panic::panic_failure;

type SyncFn = dyn Fn() -> StepResult;
type FutureFn = dyn Fn() -> LocalBoxFuture<'static, StepResult>;
type CallbackFn = dyn Fn(Completion);

#[derive(Clone)]
enum BodyKind {
    Sync(Rc<SyncFn>),
    Future(Rc<FutureFn>),
    Callback(Rc<CallbackFn>),
}

/// Invocation style of a [`StepBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStyle {
    /// Returns its outcome directly.
    Sync,
    /// Returns a future resolving to its outcome.
    Future,
    /// Settles an explicit [`Completion`].
    Callback,
}

/// A step or hook body together with its displayed signature.
///
/// The signature is what engines see when they introspect a registered body.
/// Wrapping a body keeps the original signature.
///
/// # Examples
///
/// ```
/// use bdd_flow::{BodyStyle, StepBody};
///
/// let body = StepBody::sync(|| Ok(())).with_signature("fn open_login_page()");
/// assert_eq!(body.style(), BodyStyle::Sync);
/// assert_eq!(body.to_string(), "fn open_login_page()");
/// ```
#[derive(Clone)]
pub struct StepBody {
    signature: Rc<str>,
    kind: BodyKind,
}

impl StepBody {
    /// Creates a body from a synchronous function.
    #[must_use]
    pub fn sync(body: impl Fn() -> StepResult + 'static) -> Self {
        Self {
            signature: Rc::from("fn()"),
            kind: BodyKind::Sync(Rc::new(body)),
        }
    }

    /// Creates a body from a function returning a future.
    #[must_use]
    pub fn future<F, Fut>(body: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = StepResult> + 'static,
    {
        Self {
            signature: Rc::from("async fn()"),
            kind: BodyKind::Future(Rc::new(move || body().boxed_local())),
        }
    }

    /// Creates a body that settles an explicit completion handle.
    ///
    /// The body may settle the handle later, for example from a task it
    /// spawns. Dropping every clone without settling counts as a failure.
    #[must_use]
    pub fn callback(body: impl Fn(Completion) + 'static) -> Self {
        Self {
            signature: Rc::from("fn(done)"),
            kind: BodyKind::Callback(Rc::new(body)),
        }
    }

    /// Replaces the displayed signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<Rc<str>>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Returns the displayed signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub(crate) fn shared_signature(&self) -> Rc<str> {
        Rc::clone(&self.signature)
    }

    /// Returns the invocation style.
    #[must_use]
    pub fn style(&self) -> BodyStyle {
        match self.kind {
            BodyKind::Sync(_) => BodyStyle::Sync,
            BodyKind::Future(_) => BodyStyle::Future,
            BodyKind::Callback(_) => BodyStyle::Callback,
        }
    }

    /// Runs the body and resolves with its outcome, whatever its style.
    ///
    /// The body is not called until the returned future is first polled.
    /// Panics raised by the body, or by the future it returns, resolve as
    /// failures carrying the panic message.
    #[must_use]
    pub fn settle(&self) -> LocalBoxFuture<'static, StepResult> {
        let kind = self.kind.clone();
        async move {
            match kind {
                BodyKind::Sync(body) => catch_unwind(AssertUnwindSafe(|| body()))
                    .unwrap_or_else(|payload| Err(panic_failure(payload.as_ref()))),
                BodyKind::Future(body) => {
                    let future = catch_unwind(AssertUnwindSafe(|| body()))
                        .map_err(|payload| panic_failure(payload.as_ref()))?;
                    AssertUnwindSafe(future)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| Err(panic_failure(payload.as_ref())))
                }
                BodyKind::Callback(body) => {
                    let (signal, receiver) = Completion::channel();
                    let handed_out = signal.clone();
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || body(handed_out))) {
                        signal.fail(panic_failure(payload.as_ref()));
                    }
                    // The body's clones alone decide whether the handle is dropped.
                    drop(signal);
                    receiver.await
                }
            }
        }
        .boxed_local()
    }

    /// Invokes the body using the engine's own convention.
    ///
    /// Callback bodies receive `completion` directly and the returned future
    /// is already complete. Other bodies are settled by the returned future,
    /// which then settles `completion`.
    #[must_use]
    pub fn run_with(&self, completion: Completion) -> LocalBoxFuture<'static, ()> {
        match &self.kind {
            BodyKind::Callback(body) => {
                let body = Rc::clone(body);
                let handed_out = completion.clone();
                if let Err(payload) = catch_unwind(AssertUnwindSafe(move || body(handed_out))) {
                    completion.fail(panic_failure(payload.as_ref()));
                }
                std::future::ready(()).boxed_local()
            }
            BodyKind::Sync(_) | BodyKind::Future(_) => {
                let outcome = self.settle();
                async move {
                    completion.complete(outcome.await);
                }
                .boxed_local()
            }
        }
    }
}

impl fmt::Display for StepBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature)
    }
}

impl fmt::Debug for StepBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBody")
            .field("signature", &self.signature)
            .field("style", &self.style())
            .finish()
    }
}
