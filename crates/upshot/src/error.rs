//! Error types for construction and dispatch.

use thiserror::Error;

use crate::cause::Cause;
use crate::outcome::Code;

/// A malformed definition, caught at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A switch definition registered no handlers at all.
    #[error("no handlers defined")]
    NoHandlers,

    /// A pipeline was built from fewer than two stages.
    #[error("a pipeline needs at least two stages, got {given}")]
    TooFewStages { given: usize },

    /// Runner configuration could not be parsed.
    #[error("invalid runner configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Dispatch could not select a handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A success arrived but neither `ok` nor `any` was registered.
    #[error("no success handler or fallback defined")]
    NoSuccessHandler,

    /// A declared failure arrived with no matching handler or fallback.
    #[error("no failure handler or fallback defined for {code}")]
    NoFailureHandler { code: Code },

    /// An unexpected error matched no exception handler. The original
    /// cause is carried unchanged.
    #[error(transparent)]
    Unhandled(Cause),
}

impl DispatchError {
    /// Returns true if this is an unhandled unexpected error.
    pub fn is_unhandled(&self) -> bool {
        matches!(self, DispatchError::Unhandled(_))
    }

    /// Returns the escaping cause of an unhandled error.
    pub fn into_cause(self) -> Option<Cause> {
        match self {
            DispatchError::Unhandled(cause) => Some(cause),
            _ => None,
        }
    }
}

/// [`crate::rollback`] was signalled outside of any atomic region.
#[derive(Debug, Error)]
#[error("rollback signalled outside of an atomic region")]
pub struct StrayRollback;

impl crate::cause::Exception for StrayRollback {}
