//! Behavioural tests for wrapped bodies running on the task queue.

use std::cell::RefCell;
use std::rc::Rc;

use bdd_flow::{
    Completion, FlowAdapter, LocalHarness, StepBody, StepFailure, StepResult, TaskQueue,
};
use rstest::{fixture, rstest};

#[fixture]
fn queue() -> TaskQueue {
    TaskQueue::new()
}

async fn exploding_step() -> StepResult {
    std::future::ready(()).await;
    panic!("async kaboom")
}

fn invoke(harness: LocalHarness, body: &StepBody) -> StepResult {
    let outcome = harness.block_on(async {
        let (done, receiver) = Completion::channel();
        body.run_with(done).await;
        receiver.await
    });
    match outcome {
        Ok(result) => result,
        Err(err) => panic!("runtime should build: {err}"),
    }
}

#[rstest]
#[case::sync_pass(StepBody::sync(|| Ok(())), None)]
#[case::sync_fail(
    StepBody::sync(|| Err(StepFailure::with_stack("boom", "at step.rs:3"))),
    Some("boom")
)]
#[case::future_pass(
    StepBody::future(|| async {
        tokio::task::yield_now().await;
        Ok(())
    }),
    None
)]
#[case::future_fail(
    StepBody::future(|| async { Err(StepFailure::with_stack("late boom", "")) }),
    Some("late boom")
)]
#[case::callback_settled_later(
    StepBody::callback(|done: Completion| {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            done.pass();
        });
    }),
    None
)]
#[case::callback_dropped(
    StepBody::callback(drop),
    Some("completion dropped before it was settled")
)]
#[case::sync_panic(StepBody::sync(|| panic!("kaboom")), Some("kaboom"))]
#[case::future_panic(StepBody::future(exploding_step), Some("async kaboom"))]
fn wrapped_body_settles_engine_completion(
    queue: TaskQueue,
    #[case] body: StepBody,
    #[case] failure: Option<&str>,
) {
    let adapter = FlowAdapter::new(Rc::new(queue.clone()));
    let wrapped = adapter.wrap_body("step", body);

    let result = invoke(LocalHarness::new(), &wrapped);

    assert_eq!(result.as_ref().err().map(StepFailure::message), failure);
    assert_eq!(queue.resets(), 1);
    assert_eq!(queue.in_flight(), 0);
}

#[rstest]
fn wrapped_body_keeps_signature(queue: TaskQueue) {
    let adapter = FlowAdapter::new(Rc::new(queue));
    let body = StepBody::future(|| async { Ok(()) }).with_signature("async fn open_login_page()");
    let wrapped = adapter.wrap_body("I open the login page", body);
    assert_eq!(wrapped.signature(), "async fn open_login_page()");
    assert_eq!(wrapped.to_string(), "async fn open_login_page()");
}

#[rstest]
fn second_settlement_does_not_reset_again(queue: TaskQueue) {
    let adapter = FlowAdapter::new(Rc::new(queue.clone()));
    let wrapped = adapter.wrap_body("step", StepBody::sync(|| Ok(())));

    let outcome = LocalHarness::new().block_on(async {
        let (done, receiver) = Completion::channel();
        wrapped.run_with(done.clone()).await;
        let first = receiver.await;
        let second = done.fail(StepFailure::with_stack("late", ""));
        (first, second)
    });

    let Ok((first, second)) = outcome else {
        panic!("runtime should build");
    };
    assert_eq!(first, Ok(()));
    assert!(!second);
    assert_eq!(queue.resets(), 1);
}

#[rstest]
fn each_invocation_starts_on_a_fresh_queue(queue: TaskQueue) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let probe = queue.clone();
    let log = Rc::clone(&seen);
    let body = StepBody::sync(move || {
        log.borrow_mut().push(probe.generation());
        Ok(())
    });
    let adapter = FlowAdapter::new(Rc::new(queue.clone()));
    let wrapped = adapter.wrap_body("step", body);

    let outcome = LocalHarness::new().block_on(async {
        for _ in 0..3 {
            let (done, receiver) = Completion::channel();
            wrapped.run_with(done).await;
            let _ = receiver.await;
        }
    });

    assert!(outcome.is_ok());
    assert_eq!(*seen.borrow(), [0, 1, 2]);
    assert_eq!(queue.resets(), 3);
}

#[rstest]
fn body_panic_message_reaches_engine(queue: TaskQueue) {
    let adapter = FlowAdapter::new(Rc::new(queue));
    let wrapped = adapter.wrap_body(
        "step",
        StepBody::callback(|_done: Completion| panic!("callback exploded")),
    );
    let result = invoke(LocalHarness::new(), &wrapped);
    assert_eq!(
        result.err().map(|failure| failure.message().to_owned()),
        Some("callback exploded".to_owned())
    );
}
