//! Outcome types.
//!
//! Every unit of work ends in exactly one of two disjoint states:
//!
//! - [`Outcome::Success`] wraps the value the work produced.
//! - [`Outcome::Failure`] wraps a [`Failure`]: a [`Code`], an opaque payload
//!   and, optionally, the [`Cause`] that produced it.
//!
//! A [`Failure`] is both data and an error. It can be inspected, matched and
//! passed around like any other value, and it implements
//! [`std::error::Error`] so it can be escalated with [`Failure::into_error`]
//! (or [`Outcome::value`]) when the caller would rather let it escape.

use std::borrow::{Borrow, Cow};
use std::fmt;

use serde_json::{Map, Value};

use crate::cause::Cause;

/// A failure code.
///
/// Codes are cheap string symbols: most are `'static` literals, but codes
/// built at runtime are accepted too.
///
/// ```rust
/// use upshot::Code;
///
/// let code = Code::from("validation_failed");
/// assert_eq!(code, "validation_failed");
/// assert_eq!(code.humanize(), "Validation failed");
/// assert_eq!(Code::default(), Code::ERROR);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code(Cow<'static, str>);

impl Code {
    /// The default failure code.
    pub const ERROR: Code = Code(Cow::Borrowed("error"));

    /// The sentinel code for failures produced by an unexpected error.
    pub const EXCEPTION: Code = Code(Cow::Borrowed("exception"));

    /// Creates a code from a static string.
    pub const fn from_static(code: &'static str) -> Self {
        Code(Cow::Borrowed(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Turns the code into a short human-readable sentence.
    ///
    /// Underscores become spaces and the first letter is capitalized.
    pub fn humanize(&self) -> String {
        let spaced = self.0.replace('_', " ");
        let mut chars = spaced.trim().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl Default for Code {
    fn default() -> Self {
        Code::ERROR
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Code {
    fn from(code: &'static str) -> Self {
        Code(Cow::Borrowed(code))
    }
}

impl From<String> for Code {
    fn from(code: String) -> Self {
        Code(Cow::Owned(code))
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Code {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A failed outcome.
///
/// Built with [`Failure::new`] and refined with the `with_*` methods, or
/// produced by the abort primitive ([`crate::abort`]) inside a command.
///
/// A failure with code [`Code::EXCEPTION`] and a cause attached stands for an
/// unexpected error; see [`Failure::exception`]. Dispatch resolves those by
/// error ancestry instead of by code.
#[derive(Debug)]
pub struct Failure {
    code: Code,
    payload: Value,
    cause: Option<Cause>,
    message: Option<String>,
}

impl Failure {
    /// Creates a failure with the given code and an empty object payload.
    ///
    /// The result is always a declared failure, even for
    /// [`Code::EXCEPTION`]: without a cause there is no ancestry to resolve,
    /// so a switch routes it by code like any other. Use
    /// [`Failure::exception`] to record an unexpected error.
    ///
    /// ```rust
    /// use upshot::{Code, Failure};
    ///
    /// assert!(!Failure::new(Code::EXCEPTION).is_exception());
    /// ```
    pub fn new(code: impl Into<Code>) -> Self {
        Self {
            code: code.into(),
            payload: Value::Object(Map::new()),
            cause: None,
            message: None,
        }
    }

    /// Wraps an unexpected error as a failure with [`Code::EXCEPTION`].
    pub fn exception(cause: Cause) -> Self {
        Self::new(Code::EXCEPTION).with_cause(cause)
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Records the originating error.
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Sets an explicit human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The failure code.
    pub fn code(&self) -> &Code {
        &self.code
    }

    /// The payload. Its shape is up to whoever produced the failure.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The originating error, if one was recorded.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// Returns `true` if this failure stands for an unexpected error.
    pub fn is_exception(&self) -> bool {
        self.code == Code::EXCEPTION && self.cause.is_some()
    }

    /// Returns `true` if an explicit message was set.
    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }

    /// The human-readable message.
    ///
    /// Falls back to the cause's message, then to the humanized code.
    pub fn message(&self) -> Cow<'_, str> {
        match (&self.message, &self.cause) {
            (Some(message), _) => Cow::Borrowed(message),
            (None, Some(cause)) => Cow::Owned(cause.to_string()),
            (None, None) => Cow::Owned(self.code.humanize()),
        }
    }

    /// Consumes the failure, returning the payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Consumes the failure, returning the recorded cause.
    pub fn into_cause(self) -> Option<Cause> {
        self.cause
    }

    /// Splits the failure into code, payload and cause.
    pub fn into_parts(self) -> (Code, Value, Option<Cause>) {
        (self.code, self.payload, self.cause)
    }

    /// Returns the cause of an exception failure, or the failure unchanged.
    pub(crate) fn into_exception(self) -> Result<Cause, Failure> {
        match self.cause {
            Some(cause) if self.code == Code::EXCEPTION => Ok(cause),
            cause => Err(Failure { cause, ..self }),
        }
    }

    /// Converts the failure into an escaping error.
    ///
    /// If a cause was recorded, the cause's original error is returned.
    /// Otherwise the failure itself becomes the error and can be recovered
    /// with `downcast_ref::<Failure>()`.
    pub fn into_error(self) -> anyhow::Error {
        match self.cause {
            Some(cause) => cause.into_inner(),
            None => anyhow::Error::new(self),
        }
    }
}

impl Default for Failure {
    fn default() -> Self {
        Self::new(Code::ERROR)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// The outcome of a unit of work.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The work completed and produced a value.
    Success(T),
    /// The work failed.
    Failure(Failure),
}

impl<T> Outcome<T> {
    /// Creates a successful outcome.
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Creates a failed outcome.
    pub fn failure(failure: Failure) -> Self {
        Outcome::Failure(failure)
    }

    /// Returns true if this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true if this is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Returns the success value, or None for a failure.
    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the failure, or None for a success.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// Consumes the outcome, returning the failure if there is one.
    pub fn into_failure(self) -> Option<Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// Unwraps the success value.
    ///
    /// A failure never yields a value: the call returns the failure as an
    /// error instead (see [`Failure::into_error`]).
    pub fn value(self) -> Result<T, anyhow::Error> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(failure.into_error()),
        }
    }

    /// Applies `f` to a success value. Failures pass through and `f` is
    /// never called.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(failure) => Outcome::Failure(failure),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(failure),
        }
    }
}

impl<T> From<Failure> for Outcome<T> {
    fn from(failure: Failure) -> Self {
        Outcome::Failure(failure)
    }
}

impl<T> From<Result<T, Failure>> for Outcome<T> {
    fn from(result: Result<T, Failure>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(failure) => Outcome::Failure(failure),
        }
    }
}
