//! Sequential composition of commands.
//!
//! A [`Pipeline`] runs its stages in order and stops at the first stage
//! whose outcome is a failure. It is itself a [`Command`], so it runs through
//! [`crate::Runner::call`] and [`crate::Runner::call_with`] like any other
//! unit of work.
//!
//! ```text
//! stage 1 → Success ─┐
//! stage 2 → Success ─┤
//! stage 3 → Failure ─┴→ pipeline result (stage 4 never runs)
//! ```
//!
//! Each stage is normalized exactly as the runner would normalize it: an
//! abort becomes a failure (after the stage's own `on_failure`), a returned
//! outcome is used as-is, and a raised error leaves the pipeline as
//! [`Interrupt::Raise`].
//!
//! Only the last stage's value type survives. Earlier stages are kept for
//! their effects and their failures.
//!
//! ```rust
//! use upshot::{command, Interrupt, Pipeline};
//!
//! let load = command(|| -> Result<u32, Interrupt> { Ok(7) });
//! let save = command(|| -> Result<&'static str, Interrupt> { Ok("saved") });
//!
//! let mut pipeline = load | save;
//! assert_eq!(pipeline.len(), 2);
//!
//! let outcome = upshot::call(&mut pipeline)?;
//! assert_eq!(outcome.value_ref(), Some(&"saved"));
//! # Ok::<(), upshot::Cause>(())
//! ```

use std::fmt;
use std::ops::BitOr;

use tracing::debug;

use crate::cause::Cause;
use crate::command::{Command, FnCommand, IntoOutcome, Interrupt};
use crate::error::ConfigError;
use crate::outcome::{Failure, Outcome};
use crate::runner;

type Stage = Box<dyn FnMut() -> Result<Option<Failure>, Cause>>;
type LastStage<T> = Box<dyn FnMut() -> Result<Outcome<T>, Cause>>;

fn stage<C>(mut command: C) -> LastStage<C::Value>
where
    C: Command + 'static,
    C::Value: 'static,
{
    Box::new(move || runner::execute(&mut command))
}

fn erase<T: 'static>(mut last: LastStage<T>) -> Stage {
    Box::new(move || last().map(Outcome::into_failure))
}

/// An ordered chain of commands with short-circuit on failure.
pub struct Pipeline<T> {
    stages: Vec<Stage>,
    last: LastStage<T>,
}

#[allow(clippy::len_without_is_empty)]
impl<T: 'static> Pipeline<T> {
    /// Chains two commands.
    pub fn new<A, B>(first: A, second: B) -> Self
    where
        A: Command + 'static,
        A::Value: 'static,
        B: Command<Value = T> + 'static,
    {
        Self {
            stages: vec![erase(stage(first))],
            last: stage(second),
        }
    }

    /// Chains a list of commands of the same type.
    ///
    /// Fails with [`ConfigError::TooFewStages`] for fewer than two.
    pub fn from_stages<C>(commands: Vec<C>) -> Result<Self, ConfigError>
    where
        C: Command<Value = T> + 'static,
    {
        let given = commands.len();
        if given < 2 {
            return Err(ConfigError::TooFewStages { given });
        }

        let mut stages: Vec<LastStage<T>> = commands.into_iter().map(stage).collect();
        let last = stages.pop().ok_or(ConfigError::TooFewStages { given })?;

        Ok(Self {
            stages: stages.into_iter().map(erase).collect(),
            last,
        })
    }

    /// Returns a new pipeline with `next` appended as the last stage.
    pub fn then<C>(self, next: C) -> Pipeline<C::Value>
    where
        C: Command + 'static,
        C::Value: 'static,
    {
        let Pipeline { mut stages, last } = self;
        stages.push(erase(last));
        Pipeline {
            stages,
            last: stage(next),
        }
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len() + 1
    }
}

impl<T> Command for Pipeline<T> {
    type Value = T;
    type Output = Outcome<T>;

    fn execute(&mut self) -> Result<Outcome<T>, Interrupt> {
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if let Some(failure) = stage()? {
                debug!(stage = index, code = %failure.code(), "pipeline stopped at failing stage");
                return Ok(Outcome::Failure(failure));
            }
        }
        Ok((self.last)()?)
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &(self.stages.len() + 1))
            .finish()
    }
}

/// `pipeline | command` appends a stage.
impl<T, C> BitOr<C> for Pipeline<T>
where
    T: 'static,
    C: Command + 'static,
    C::Value: 'static,
{
    type Output = Pipeline<C::Value>;

    fn bitor(self, next: C) -> Self::Output {
        self.then(next)
    }
}

/// `command | command` starts a pipeline.
impl<F, T, R, C> BitOr<C> for FnCommand<F, T, R>
where
    F: FnMut() -> Result<R, Interrupt> + 'static,
    R: IntoOutcome<T> + 'static,
    T: 'static,
    C: Command + 'static,
    C::Value: 'static,
{
    type Output = Pipeline<C::Value>;

    fn bitor(self, next: C) -> Self::Output {
        Pipeline::new(self, next)
    }
}

/// Pipe composition for every command.
pub trait CommandExt: Command + Sized + 'static {
    /// Chains `self` and `next` into a pipeline.
    fn pipe<C>(self, next: C) -> Pipeline<C::Value>
    where
        Self::Value: 'static,
        C: Command + 'static,
        C::Value: 'static,
    {
        Pipeline::new(self, next)
    }
}

impl<C: Command + 'static> CommandExt for C {}

/// Chains two commands into a pipeline.
pub fn pipe<A, B>(first: A, second: B) -> Pipeline<B::Value>
where
    A: Command + 'static,
    A::Value: 'static,
    B: Command + 'static,
    B::Value: 'static,
{
    Pipeline::new(first, second)
}
