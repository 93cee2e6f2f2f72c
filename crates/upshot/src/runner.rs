//! Command execution.
//!
//! The runner executes a [`Command`], normalizes whatever it produced into
//! an [`Outcome`], and either hands the outcome back or feeds it through a
//! [`Switch`].
//!
//! ```text
//! execute()
//!   → Ok(value)          → Success(value)
//!   → Ok(outcome)        → outcome, unchanged
//!   → Err(Abort(f))      → on_failure(&f) → Failure(f)
//!   → Err(Raise(cause))  → call:      Err(cause), unchanged
//!                          call_with: Failure(exception, cause) → switch
//!   → Err(Rollback)      → treated as a raised StrayRollback
//! ```
//!
//! Failures that carry no explicit message get one from the runner's
//! [`MessageLookup`], in the configured locale and scope.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::cause::Cause;
use crate::command::{Command, IntoOutcome, Interrupt};
use crate::config::RunnerConfig;
use crate::error::{DispatchError, StrayRollback};
use crate::message::{Catalog, MessageLookup};
use crate::outcome::{Failure, Outcome};
use crate::switch::Switch;

/// Executes commands and normalizes their results.
#[derive(Clone)]
pub struct Runner {
    config: RunnerConfig,
    messages: Rc<dyn MessageLookup>,
}

impl Runner {
    /// Creates a runner with the default configuration and no translations.
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Creates a runner with the given configuration.
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            config,
            messages: Rc::new(Catalog::new()),
        }
    }

    /// Sets the message lookup used to describe failures.
    pub fn messages<M>(mut self, messages: M) -> Self
    where
        M: MessageLookup + 'static,
    {
        self.messages = Rc::new(messages);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `command` and returns its outcome.
    ///
    /// Declared failures come back as data. An unexpected error is returned
    /// as `Err(cause)` with no wrapping, since nothing is there to handle it.
    pub fn call<C: Command>(&self, command: &mut C) -> Result<Outcome<C::Value>, Cause> {
        let outcome = execute(command)?;
        Ok(self.describe(outcome))
    }

    /// Runs `command` and dispatches its outcome through `switch`.
    ///
    /// Unexpected errors are wrapped as [`Failure::exception`] so the
    /// switch's `exception` handlers get a chance at them; if none matches,
    /// the cause escapes as [`DispatchError::Unhandled`].
    pub fn call_with<C, X, R>(
        &self,
        command: &mut C,
        ctx: &mut X,
        switch: &Switch<'_, X, C::Value, R>,
    ) -> Result<R, DispatchError>
    where
        C: Command,
    {
        let outcome = match execute(command) {
            Ok(outcome) => self.describe(outcome),
            Err(cause) => Outcome::Failure(Failure::exception(cause)),
        };
        switch.dispatch(ctx, outcome)
    }

    fn describe<T>(&self, outcome: Outcome<T>) -> Outcome<T> {
        let failure = match outcome {
            Outcome::Failure(failure) => failure,
            success => return success,
        };

        if !self.config.messages || failure.has_message() || failure.is_exception() {
            return Outcome::Failure(failure);
        }

        let args = match failure.payload() {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let message = self.messages.translate(
            failure.code(),
            &self.config.locale,
            &self.config.scope,
            &args,
        );

        match message {
            Some(message) => Outcome::Failure(failure.with_message(message)),
            None => Outcome::Failure(failure),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Runs `command` with a default [`Runner`]. See [`Runner::call`].
pub fn call<C: Command>(command: &mut C) -> Result<Outcome<C::Value>, Cause> {
    Runner::default().call(command)
}

/// Runs `command` with a default [`Runner`] and dispatches through `switch`.
/// See [`Runner::call_with`].
pub fn call_with<C, X, R>(
    command: &mut C,
    ctx: &mut X,
    switch: &Switch<'_, X, C::Value, R>,
) -> Result<R, DispatchError>
where
    C: Command,
{
    Runner::default().call_with(command, ctx, switch)
}

/// Executes `command` and normalizes the result, leaving raised errors as
/// `Err`.
pub(crate) fn execute<C: Command>(command: &mut C) -> Result<Outcome<C::Value>, Cause> {
    match command.execute() {
        Ok(output) => Ok(output.into_outcome()),
        Err(Interrupt::Abort(failure)) => {
            debug!(code = %failure.code(), "command aborted");
            command.on_failure(&failure);
            Ok(Outcome::Failure(failure))
        }
        Err(Interrupt::Raise(cause)) => {
            debug!(error_type = cause.error_type().name(), "command raised");
            Err(cause)
        }
        Err(Interrupt::Rollback) => {
            debug!("rollback reached the runner outside of an atomic region");
            Err(Cause::new(StrayRollback))
        }
    }
}
