//! Test helpers for code built on `upshot`.
//!
//! # Assertions
//!
//! ```rust
//! use upshot::{abort_with, command, Interrupt};
//! use upshot_test::{assert_failed, assert_succeeded};
//!
//! let mut ok = command(|| -> Result<u32, Interrupt> { Ok(42) });
//! let outcome = upshot::call(&mut ok).unwrap();
//! assert_succeeded!(outcome, 42);
//!
//! let mut bad = command(|| -> Result<u32, Interrupt> {
//!     Err(abort_with("validation_failed", vec!["e1"]))
//! });
//! let outcome = upshot::call(&mut bad).unwrap();
//! assert_failed!(outcome, "validation_failed", serde_json::json!(["e1"]));
//! ```
//!
//! # Recording Call Order
//!
//! [`Recorder`] is a shared log for checking which stages of a pipeline
//! ran, and in what order.
//!
//! ```rust
//! use upshot_test::Recorder;
//!
//! let recorder = Recorder::new();
//! let mut pipeline = upshot::pipe(
//!     recorder.succeeding("load", 1),
//!     recorder.aborting::<u32>("save", "disk_full"),
//! )
//! .then(recorder.succeeding("notify", ()));
//!
//! let outcome = upshot::call(&mut pipeline).unwrap();
//! assert!(outcome.is_failure());
//! assert_eq!(recorder.calls(), vec!["load", "save"]);
//! assert!(!recorder.was_called("notify"));
//! ```

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use serde_json::Value;
use upshot::{abort, command, Exception, Failure, FnCommand, Interrupt, Outcome};

// ============================================================================
// Outcome assertions
// ============================================================================

/// Asserts that `outcome` is a success and returns its value.
#[track_caller]
pub fn assert_succeeded<T>(outcome: &Outcome<T>) -> &T {
    match outcome {
        Outcome::Success(value) => value,
        Outcome::Failure(failure) => panic!(
            "expected a success, got failure `{}` with payload {}",
            failure.code(),
            failure.payload()
        ),
    }
}

/// Asserts that `outcome` is a failure and returns an expectation for
/// checking its details.
#[track_caller]
pub fn expect_failure<T: Debug>(outcome: &Outcome<T>) -> FailureExpectation<'_> {
    match outcome {
        Outcome::Failure(failure) => FailureExpectation { failure },
        Outcome::Success(value) => panic!("expected a failure, got success {value:?}"),
    }
}

/// Chained checks on a failure.
#[derive(Debug)]
pub struct FailureExpectation<'a> {
    failure: &'a Failure,
}

impl<'a> FailureExpectation<'a> {
    /// Asserts the failure code.
    #[track_caller]
    pub fn as_code(self, code: &str) -> Self {
        assert_eq!(
            self.failure.code().as_str(),
            code,
            "failure code mismatch"
        );
        self
    }

    /// Asserts the payload.
    #[track_caller]
    pub fn with_payload(self, payload: impl Into<Value>) -> Self {
        let expected = payload.into();
        assert_eq!(self.failure.payload(), &expected, "failure payload mismatch");
        self
    }

    /// Asserts the message.
    #[track_caller]
    pub fn with_message(self, message: &str) -> Self {
        assert_eq!(self.failure.message(), message, "failure message mismatch");
        self
    }

    /// Asserts that the failure was caused by an error of type `E`, or of
    /// a type deriving from it.
    #[track_caller]
    pub fn caused_by<E: Exception>(self) -> Self {
        match self.failure.cause() {
            Some(cause) => assert!(
                cause.is_a::<E>(),
                "expected a cause deriving from {}, got {:?}",
                std::any::type_name::<E>(),
                cause.error_type()
            ),
            None => panic!(
                "expected a cause deriving from {}, got none",
                std::any::type_name::<E>()
            ),
        }
        self
    }

    /// The failure under test.
    pub fn failure(&self) -> &'a Failure {
        self.failure
    }
}

/// Asserts that an outcome is a success, optionally checking its value.
#[macro_export]
macro_rules! assert_succeeded {
    ($outcome:expr $(,)?) => {
        $crate::assert_succeeded(&$outcome)
    };
    ($outcome:expr, $value:expr $(,)?) => {
        assert_eq!(*$crate::assert_succeeded(&$outcome), $value)
    };
}

/// Asserts that an outcome is a failure, optionally checking its code and
/// payload.
#[macro_export]
macro_rules! assert_failed {
    ($outcome:expr $(,)?) => {
        $crate::expect_failure(&$outcome)
    };
    ($outcome:expr, $code:expr $(,)?) => {
        $crate::expect_failure(&$outcome).as_code($code)
    };
    ($outcome:expr, $code:expr, $payload:expr $(,)?) => {
        $crate::expect_failure(&$outcome)
            .as_code($code)
            .with_payload($payload)
    };
}

// ============================================================================
// Call recording
// ============================================================================

/// A shared, ordered log of named calls.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name` to the log.
    pub fn record(&self, name: impl Into<String>) {
        self.calls.borrow_mut().push(name.into());
    }

    /// The recorded names, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Returns true if `name` was recorded at least once.
    pub fn was_called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == name)
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    /// A command that records `name` and succeeds with `value`.
    pub fn succeeding<T>(
        &self,
        name: &'static str,
        value: T,
    ) -> FnCommand<impl FnMut() -> Result<T, Interrupt> + 'static, T>
    where
        T: Clone + 'static,
    {
        let recorder = self.clone();
        command(move || {
            recorder.record(name);
            Ok(value.clone())
        })
    }

    /// A command that records `name` and aborts with `code`.
    pub fn aborting<T>(
        &self,
        name: &'static str,
        code: &'static str,
    ) -> FnCommand<impl FnMut() -> Result<T, Interrupt> + 'static, T>
    where
        T: 'static,
    {
        let recorder = self.clone();
        command(move || {
            recorder.record(name);
            Err(abort(code))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use upshot::{Cause, Code};

    #[derive(Debug)]
    struct Timeout;

    impl std::fmt::Display for Timeout {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("timed out")
        }
    }

    impl std::error::Error for Timeout {}

    upshot::impl_exception!(Timeout);

    #[test]
    fn test_assert_succeeded_returns_value() {
        let outcome = Outcome::success(42);
        assert_eq!(*assert_succeeded(&outcome), 42);
        assert_succeeded!(outcome, 42);
    }

    #[test]
    #[should_panic(expected = "expected a success")]
    fn test_assert_succeeded_panics_on_failure() {
        let outcome: Outcome<i32> = Outcome::failure(Failure::new("bang"));
        assert_succeeded!(outcome);
    }

    #[test]
    fn test_failure_expectation_chain() {
        let failure = Failure::new("validation_failed")
            .with_payload(json!(["e1", "e2"]))
            .with_message("Nope");
        let outcome: Outcome<()> = Outcome::failure(failure);

        let expectation = assert_failed!(outcome, "validation_failed", json!(["e1", "e2"]))
            .with_message("Nope");
        assert_eq!(expectation.failure().code(), &Code::from("validation_failed"));
    }

    #[test]
    #[should_panic(expected = "failure code mismatch")]
    fn test_failure_expectation_wrong_code() {
        let outcome: Outcome<()> = Outcome::failure(Failure::new("bang"));
        assert_failed!(outcome, "boom");
    }

    #[test]
    #[should_panic(expected = "expected a failure")]
    fn test_expect_failure_panics_on_success() {
        assert_failed!(Outcome::success(1));
    }

    #[test]
    fn test_caused_by() {
        let outcome: Outcome<()> = Outcome::failure(Failure::exception(Cause::new(Timeout)));
        assert_failed!(outcome, "exception").caused_by::<Timeout>();
    }

    #[test]
    fn test_recorder_shares_log() {
        let recorder = Recorder::new();
        let clone = recorder.clone();
        recorder.record("a");
        clone.record("b");

        assert_eq!(recorder.calls(), vec!["a", "b"]);
        assert_eq!(recorder.len(), 2);
        assert!(recorder.was_called("b"));
        assert!(!recorder.was_called("c"));
        assert!(!recorder.is_empty());
    }

    #[test]
    fn test_recorder_commands() {
        let recorder = Recorder::new();
        let mut ok = recorder.succeeding("ok", "value");
        let mut bad = recorder.aborting::<()>("bad", "bang");

        let outcome = upshot::call(&mut ok).unwrap();
        assert_succeeded!(outcome, "value");
        let outcome = upshot::call(&mut bad).unwrap();
        assert_failed!(outcome, "bang");
        assert_eq!(recorder.calls(), vec!["ok", "bad"]);
    }
}
