//! Units of work.
//!
//! A [`Command`] is anything with a zero-argument `execute`. Its return value
//! is normalized into an [`Outcome`] by [`IntoOutcome`]:
//!
//! - a plain value becomes [`Outcome::Success`]
//! - an [`Outcome`] the command built itself is used as-is
//!
//! The error channel is an [`Interrupt`], which separates the three ways a
//! command can stop early:
//!
//! | Interrupt | Produced by | Becomes |
//! |-----------|-------------|---------|
//! | `Abort` | [`abort`], [`abort_with`], [`abort!`](crate::abort!) | a declared [`Failure`] |
//! | `Raise` | `?` on an [`Exception`], [`Cause`] or `anyhow::Error` | an unexpected error |
//! | `Rollback` | [`rollback`] | leaves the innermost atomic region |
//!
//! # Example
//!
//! ```rust
//! use upshot::{abort, command, Interrupt, Outcome};
//!
//! let mut validate = command(|| -> Result<u32, Interrupt> {
//!     let age: u32 = 17;
//!     if age < 18 {
//!         abort!("too_young", serde_json::json!({ "age": age }));
//!     }
//!     Ok(age)
//! });
//!
//! let outcome: Outcome<u32> = upshot::call(&mut validate)?;
//! assert_eq!(outcome.as_failure().unwrap().code(), "too_young");
//! # Ok::<(), upshot::Cause>(())
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::cause::{Cause, Exception};
use crate::outcome::{Code, Failure, Outcome};

/// Why a command stopped before returning normally.
#[derive(Debug)]
pub enum Interrupt {
    /// A deliberate, declared failure.
    Abort(Failure),
    /// An unexpected error.
    Raise(Cause),
    /// Discard the innermost atomic region without failing.
    Rollback,
}

impl<E: Exception> From<E> for Interrupt {
    fn from(error: E) -> Self {
        Interrupt::Raise(Cause::new(error))
    }
}

impl From<Cause> for Interrupt {
    fn from(cause: Cause) -> Self {
        Interrupt::Raise(cause)
    }
}

impl From<anyhow::Error> for Interrupt {
    fn from(error: anyhow::Error) -> Self {
        Interrupt::Raise(Cause::from(error))
    }
}

impl From<Failure> for Interrupt {
    fn from(failure: Failure) -> Self {
        Interrupt::Abort(failure)
    }
}

/// Stops the current command with a declared failure and no payload.
///
/// The failure never carries a cause, so `abort(Code::EXCEPTION)` is still
/// dispatched by code. Raise the error itself (`Err(error)?`) to have it
/// resolved by ancestry.
pub fn abort(code: impl Into<Code>) -> Interrupt {
    Interrupt::Abort(Failure::new(code).with_payload(Value::Null))
}

/// Stops the current command with a declared failure carrying `payload`.
pub fn abort_with(code: impl Into<Code>, payload: impl Into<Value>) -> Interrupt {
    Interrupt::Abort(Failure::new(code).with_payload(payload))
}

/// Discards the innermost atomic region and lets the enclosing one go on.
///
/// See [`crate::transaction`].
pub fn rollback() -> Interrupt {
    Interrupt::Rollback
}

/// Returns early from a command with a declared failure.
///
/// `abort!()` uses [`Code::ERROR`]; `abort!(code)` and
/// `abort!(code, payload)` mirror [`abort`] and [`abort_with`].
#[macro_export]
macro_rules! abort {
    () => {
        return ::core::result::Result::Err($crate::abort($crate::Code::ERROR))
    };
    ($code:expr $(,)?) => {
        return ::core::result::Result::Err($crate::abort($code))
    };
    ($code:expr, $payload:expr $(,)?) => {
        return ::core::result::Result::Err($crate::abort_with($code, $payload))
    };
}

/// Conversion of a command's return value into an [`Outcome`].
pub trait IntoOutcome<T> {
    /// Normalizes `self`.
    fn into_outcome(self) -> Outcome<T>;
}

/// Plain values are successes.
impl<T> IntoOutcome<T> for T {
    fn into_outcome(self) -> Outcome<T> {
        Outcome::Success(self)
    }
}

/// Outcomes produced by the command itself pass through unchanged.
impl<T> IntoOutcome<T> for Outcome<T> {
    fn into_outcome(self) -> Outcome<T> {
        self
    }
}

/// A unit of work.
///
/// # Example
///
/// ```rust
/// use upshot::{abort, Command, Interrupt};
///
/// struct Withdraw {
///     balance: u64,
///     amount: u64,
///     notified: bool,
/// }
///
/// impl Command for Withdraw {
///     type Value = u64;
///     type Output = u64;
///
///     fn execute(&mut self) -> Result<u64, Interrupt> {
///         if self.amount > self.balance {
///             abort!("insufficient_funds");
///         }
///         self.balance -= self.amount;
///         Ok(self.balance)
///     }
///
///     fn on_failure(&mut self, _failure: &upshot::Failure) {
///         self.notified = true;
///     }
/// }
///
/// let mut cmd = Withdraw { balance: 10, amount: 50, notified: false };
/// let outcome = upshot::call(&mut cmd)?;
/// assert!(outcome.is_failure());
/// assert!(cmd.notified);
/// # Ok::<(), upshot::Cause>(())
/// ```
pub trait Command {
    /// The success value type.
    type Value;

    /// What `execute` returns on normal completion.
    type Output: IntoOutcome<Self::Value>;

    /// Runs the work.
    fn execute(&mut self) -> Result<Self::Output, Interrupt>;

    /// Called when `execute` stops with [`Interrupt::Abort`], before the
    /// failure propagates.
    fn on_failure(&mut self, _failure: &Failure) {}
}

impl<C: Command + ?Sized> Command for Box<C> {
    type Value = C::Value;
    type Output = C::Output;

    fn execute(&mut self) -> Result<Self::Output, Interrupt> {
        (**self).execute()
    }

    fn on_failure(&mut self, failure: &Failure) {
        (**self).on_failure(failure)
    }
}

type FailureHook = Box<dyn FnMut(&Failure)>;

/// A command backed by a closure.
///
/// The closure may return a plain value (wrapped as a success) or an
/// [`Outcome`] (used as-is).
pub struct FnCommand<F, T, R = T> {
    f: F,
    failure_hook: Option<FailureHook>,
    _phantom: PhantomData<fn() -> (T, R)>,
}

impl<F, T, R> FnCommand<F, T, R>
where
    F: FnMut() -> Result<R, Interrupt>,
    R: IntoOutcome<T>,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            failure_hook: None,
            _phantom: PhantomData,
        }
    }

    /// Registers a closure to run when the command aborts.
    pub fn with_failure_hook<H>(mut self, hook: H) -> Self
    where
        H: FnMut(&Failure) + 'static,
    {
        self.failure_hook = Some(Box::new(hook));
        self
    }
}

impl<F, T, R> Command for FnCommand<F, T, R>
where
    F: FnMut() -> Result<R, Interrupt>,
    R: IntoOutcome<T>,
{
    type Value = T;
    type Output = R;

    fn execute(&mut self) -> Result<R, Interrupt> {
        (self.f)()
    }

    fn on_failure(&mut self, failure: &Failure) {
        if let Some(hook) = self.failure_hook.as_mut() {
            hook(failure);
        }
    }
}

impl<F, T, R> fmt::Debug for FnCommand<F, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("failure_hook", &self.failure_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Creates a closure-backed command.
///
/// When the closure returns an [`Outcome`], name the value type at the
/// call site (for example through the binding the outcome lands in), since
/// both normalizations would otherwise apply.
pub fn command<T, R, F>(f: F) -> FnCommand<F, T, R>
where
    F: FnMut() -> Result<R, Interrupt>,
    R: IntoOutcome<T>,
{
    FnCommand::new(f)
}
