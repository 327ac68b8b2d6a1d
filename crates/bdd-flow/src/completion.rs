//! Settle-once completion handles.
//!
//! The engine hands every runnable invocation a [`Completion`]. The handle is
//! cheap to clone; all clones share one callback slot, so the callback runs at
//! most once no matter how many clones try to settle it. Instrumenting a
//! handle replaces the shared callback in place, which means the engine's own
//! clone observes the instrumentation too.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{StepFailure, StepResult};

type Callback = Box<dyn FnOnce(StepResult)>;

/// Completion callback for one runnable invocation.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use bdd_flow::Completion;
///
/// let calls = Rc::new(Cell::new(0));
/// let seen = Rc::clone(&calls);
/// let done = Completion::new(move |_| seen.set(seen.get() + 1));
/// assert!(done.pass());
/// assert!(!done.clone().pass());
/// assert_eq!(calls.get(), 1);
/// ```
#[derive(Clone)]
pub struct Completion {
    slot: Rc<RefCell<Option<Callback>>>,
}

impl Completion {
    /// Wraps a completion callback.
    #[must_use]
    pub fn new(callback: impl FnOnce(StepResult) + 'static) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(Box::new(callback)))),
        }
    }

    /// Creates a handle together with a future resolving to its outcome.
    ///
    /// If every clone of the handle is dropped without settling, the receiver
    /// resolves to a failure.
    #[must_use]
    pub fn channel() -> (Self, CompletionReceiver) {
        let (sender, receiver) = oneshot::channel();
        let completion = Self::new(move |result| {
            let _ = sender.send(result);
        });
        (completion, CompletionReceiver { receiver })
    }

    /// Runs `before` ahead of the current callback when the handle settles.
    ///
    /// Returns `false` when the handle has already settled, in which case
    /// `before` is dropped without running.
    pub fn instrument(&self, before: impl FnOnce() + 'static) -> bool {
        let mut slot = self.slot.borrow_mut();
        let Some(callback) = slot.take() else {
            return false;
        };
        *slot = Some(Box::new(move |result| {
            before();
            callback(result);
        }));
        true
    }

    /// Settles the handle with `result`.
    ///
    /// Returns `false` if the handle was already settled; the second outcome
    /// is discarded.
    pub fn complete(&self, result: StepResult) -> bool {
        let callback = self.slot.borrow_mut().take();
        let Some(callback) = callback else {
            warn!(outcome = ?result, "completion settled more than once; ignoring");
            return false;
        };
        callback(result);
        true
    }

    /// Settles the handle successfully.
    pub fn pass(&self) -> bool {
        self.complete(Ok(()))
    }

    /// Settles the handle with a failure.
    pub fn fail(&self, failure: StepFailure) -> bool {
        self.complete(Err(failure))
    }

    /// Returns `true` once the handle has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Future resolving to the outcome of a [`Completion`] created by
/// [`Completion::channel`].
#[derive(Debug)]
pub struct CompletionReceiver {
    receiver: oneshot::Receiver<StepResult>,
}

impl Future for CompletionReceiver {
    type Output = StepResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(StepFailure::new(
                    "completion dropped before it was settled",
                ))
            })
        })
    }
}
