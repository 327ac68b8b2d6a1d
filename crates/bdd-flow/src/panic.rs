//! Conversion of caught panics into step failures.

use std::any::Any;

use crate::error::StepFailure;

/// Formats a panic payload into a readable message.
///
/// String payloads are extracted directly; anything else falls back to its
/// `Debug` rendering.
///
/// # Examples
///
/// ```
/// use bdd_flow::panic_message;
/// use std::any::Any;
///
/// let payload: Box<dyn Any + Send> = Box::new("boom");
/// assert_eq!(panic_message(payload.as_ref()), "boom");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| format!("{payload:?}"))
}

/// Builds the failure reported for a body that panicked.
pub(crate) fn panic_failure(payload: &(dyn Any + Send)) -> StepFailure {
    StepFailure::new(panic_message(payload))
}
