//! Cooperative task scheduling.
//!
//! [`Scheduler`] is the seam the adapter talks to: queue a [`Task`], get a
//! [`TaskHandle`] that resolves once the task settles, and reset the queue at
//! case boundaries. [`TaskQueue`] is the default implementation. It runs on
//! the current thread's Tokio [`LocalSet`](tokio::task::LocalSet): every task
//! is spawned locally and waits for its predecessor's turn signal, so tasks
//! run strictly one after another even when they suspend.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{StepFailure, StepResult};

/// One unit of work submitted to a [`Scheduler`].
pub struct Task {
    label: String,
    work: LocalBoxFuture<'static, StepResult>,
}

impl Task {
    /// Creates a task from a label and a lazily started future.
    #[must_use]
    pub fn new(label: impl Into<String>, work: impl Future<Output = StepResult> + 'static) -> Self {
        Self {
            label: label.into(),
            work: work.boxed_local(),
        }
    }

    /// Returns the task label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the task to completion.
    pub async fn run(self) -> StepResult {
        self.work.await
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}

/// Future resolving to the outcome of a queued [`Task`].
#[derive(Debug)]
pub struct TaskHandle {
    receiver: oneshot::Receiver<StepResult>,
}

impl TaskHandle {
    /// Creates a handle fed by `receiver`.
    ///
    /// If the sender is dropped without sending, the handle resolves to a
    /// failure.
    #[must_use]
    pub fn from_receiver(receiver: oneshot::Receiver<StepResult>) -> Self {
        Self { receiver }
    }

    /// Creates a handle that is already settled with `outcome`.
    #[must_use]
    pub fn settled(outcome: StepResult) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(outcome);
        Self { receiver }
    }
}

impl Future for TaskHandle {
    type Output = StepResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received
                .unwrap_or_else(|_| Err(StepFailure::new("task dropped before it settled")))
        })
    }
}

/// Single-threaded cooperative scheduler used by the adapter.
pub trait Scheduler {
    /// Queues `task` behind every task queued since the last reset.
    fn execute(&self, task: Task) -> TaskHandle;

    /// Starts a fresh queue.
    ///
    /// Tasks queued before the reset that have not started yet never run.
    fn reset(&self);
}

#[derive(Default)]
struct QueueState {
    generation: u64,
    tail: Option<oneshot::Receiver<()>>,
    in_flight: usize,
    resets: u64,
}

/// Default [`Scheduler`] built on Tokio's local task set.
///
/// # Panics
///
/// [`Scheduler::execute`] spawns with [`tokio::task::spawn_local`] and
/// therefore panics when called outside a `LocalSet` context.
#[derive(Clone, Default)]
pub struct TaskQueue {
    state: Rc<RefCell<QueueState>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of resets performed so far.
    #[must_use]
    pub fn resets(&self) -> u64 {
        self.state.borrow().resets
    }

    /// Returns the number of queued or running tasks.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    /// Returns the current queue generation; it increases on every reset.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }
}

impl Scheduler for TaskQueue {
    fn execute(&self, task: Task) -> TaskHandle {
        let (turn_sender, turn_receiver) = oneshot::channel();
        let (result_sender, result_receiver) = oneshot::channel();
        let (previous, generation) = {
            let mut state = self.state.borrow_mut();
            state.in_flight += 1;
            (state.tail.replace(turn_receiver), state.generation)
        };
        trace!(task = task.label(), generation, "task queued");

        let state = Rc::clone(&self.state);
        tokio::task::spawn_local(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let current = state.borrow().generation;
            let outcome = if current == generation {
                debug!(task = task.label(), "task started");
                let label = task.label.clone();
                let outcome = task.run().await;
                debug!(task = %label, passed = outcome.is_ok(), "task settled");
                outcome
            } else {
                debug!(task = task.label(), generation, current, "task discarded by reset");
                Err(StepFailure::new(format!(
                    "task `{}` discarded by a queue reset",
                    task.label()
                )))
            };
            {
                let mut state = state.borrow_mut();
                state.in_flight = state.in_flight.saturating_sub(1);
            }
            let _ = turn_sender.send(());
            let _ = result_sender.send(outcome);
        });

        TaskHandle::from_receiver(result_receiver)
    }

    fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        state.tail = None;
        state.resets += 1;
        debug!(generation = state.generation, "task queue reset");
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("generation", &state.generation)
            .field("in_flight", &state.in_flight)
            .field("resets", &state.resets)
            .finish()
    }
}
