//! Execution and timing capture.
//!
//! [`capture`] runs one operation exactly once and turns whatever it does
//! (value, error or panic) into an [`Outcome`]. Nothing escapes.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::config::FailureTiming;

/// Why an operation did not produce a value.
pub enum Failure<E> {
    /// The operation returned `Err`.
    Error(E),
    /// The operation panicked; the payload is kept so it can be resumed.
    Panic(Box<dyn Any + Send>),
}

impl<E> Failure<E> {
    pub fn as_error(&self) -> Option<&E> {
        match self {
            Failure::Error(err) => Some(err),
            Failure::Panic(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Failure::Panic(_))
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl<E: fmt::Debug> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Failure::Panic(payload) => f
                .debug_tuple("Panic")
                .field(&panic_message(payload.as_ref()))
                .finish(),
        }
    }
}

/// Result of a single execution attempt.
///
/// Holds either a value or a failure, never both.
#[derive(Debug)]
pub struct Outcome<T, E> {
    result: Result<T, Failure<E>>,
    duration: Duration,
}

impl<T, E> Outcome<T, E> {
    pub(crate) fn new(result: Result<T, Failure<E>>, duration: Duration) -> Self {
        Self { result, duration }
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The operation's own error, if it returned one.
    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err().and_then(Failure::as_error)
    }

    pub fn failure(&self) -> Option<&Failure<E>> {
        self.result.as_ref().err()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn into_result(self) -> Result<T, Failure<E>> {
        self.result
    }
}

/// Invoke `operation` once and record what happened.
///
/// The clock starts just before the call and stops once the returned future
/// resolves, so time spent suspended counts. Failed attempts record the
/// duration chosen by `timing`.
pub async fn capture<T, E, F, Fut>(operation: F, timing: FailureTiming) -> Outcome<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    // The call happens inside the guarded future so a panic raised before the
    // first await is caught as well.
    let attempt = AssertUnwindSafe(async move { operation().await })
        .catch_unwind()
        .await;
    let elapsed = start.elapsed();

    match attempt {
        Ok(Ok(value)) => Outcome::new(Ok(value), elapsed),
        Ok(Err(err)) => Outcome::new(Err(Failure::Error(err)), timing.failure_duration(elapsed)),
        Err(payload) => Outcome::new(
            Err(Failure::Panic(payload)),
            timing.failure_duration(elapsed),
        ),
    }
}
