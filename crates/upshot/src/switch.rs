//! Outcome dispatch.
//!
//! A [`Switch`] is built once from a declarative definition and then picks
//! exactly one handler for each [`Outcome`] it is given.
//!
//! ```text
//! Success                  → ok(value)           → any(outcome)
//! Failure(code)            → error_on(code)(payload)
//!                          → error(code, payload) → any(outcome)
//! Failure(exception, cause) → exception_of::<E> for each E in the cause's
//!                             ancestry, most specific first
//!                          → re-raise the cause (never `any`, never `error`)
//! ```
//!
//! A cause built from an [`anyhow::Error`] only knows the root. Before the
//! walk, the switch checks it against every type it was given through
//! [`exception_of`](Definition::exception_of) or
//! [`recognize`](Definition::recognize) and, on a match, restores that
//! type's ancestry.
//!
//! # Handler Context
//!
//! Handlers receive `&mut C` as their first argument: the caller's context,
//! passed explicitly at dispatch time. The registration primitives live on
//! [`Definition`], which only exists while the definition closure runs, so
//! no handler can reach them.
//!
//! ```rust
//! use upshot::{Failure, Outcome, Switch};
//!
//! #[derive(Default)]
//! struct Screen {
//!     flash: Option<String>,
//! }
//!
//! let switch = Switch::<Screen, u32, &str>::define(|on| {
//!     on.ok(|screen, id| {
//!         screen.flash = Some(format!("created #{id}"));
//!         "show"
//!     });
//!     on.error_on("validation_failed", |_, _payload| "edit");
//!     on.error(|_, _code, _payload| "index");
//! })?;
//!
//! let mut screen = Screen::default();
//! assert_eq!(switch.dispatch(&mut screen, Outcome::success(7))?, "show");
//! assert_eq!(screen.flash.as_deref(), Some("created #7"));
//!
//! let failed = Outcome::failure(Failure::new("validation_failed"));
//! assert_eq!(switch.dispatch(&mut screen, failed)?, "edit");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, trace};

use crate::cause::{Cause, ErrorType, Exception};
use crate::error::{ConfigError, DispatchError};
use crate::outcome::{Code, Failure, Outcome};

type OkHandler<'a, C, T, R> = Box<dyn Fn(&mut C, T) -> R + 'a>;
type ErrorHandler<'a, C, R> = Box<dyn Fn(&mut C, Value) -> R + 'a>;
type FallbackHandler<'a, C, R> = Box<dyn Fn(&mut C, Code, Value) -> R + 'a>;
type ExceptionHandler<'a, C, R> = Box<dyn Fn(&mut C, Cause) -> R + 'a>;
type AnyHandler<'a, C, T, R> = Box<dyn Fn(&mut C, Outcome<T>) -> R + 'a>;
type Recognizer = fn(Cause) -> Result<Cause, Cause>;

struct Handlers<'a, C, T, R> {
    ok: Option<OkHandler<'a, C, T, R>>,
    error: HashMap<Code, ErrorHandler<'a, C, R>>,
    error_fallback: Option<FallbackHandler<'a, C, R>>,
    exception: HashMap<ErrorType, ExceptionHandler<'a, C, R>>,
    recognizers: Vec<(ErrorType, Recognizer)>,
    any: Option<AnyHandler<'a, C, T, R>>,
}

impl<C, T, R> Handlers<'_, C, T, R> {
    fn new() -> Self {
        Self {
            ok: None,
            error: HashMap::new(),
            error_fallback: None,
            exception: HashMap::new(),
            recognizers: Vec::new(),
            any: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.ok.is_none()
            && self.error.is_empty()
            && self.error_fallback.is_none()
            && self.exception.is_empty()
            && self.any.is_none()
    }
}

/// The registration surface handed to a switch definition.
///
/// Registering the same slot twice keeps the last handler.
pub struct Definition<'a, C, T, R> {
    handlers: Handlers<'a, C, T, R>,
}

impl<'a, C, T, R> Definition<'a, C, T, R> {
    /// Handles a success. Receives the success value.
    pub fn ok<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut C, T) -> R + 'a,
    {
        if self.handlers.ok.replace(Box::new(handler)).is_some() {
            debug!("replacing previously registered ok handler");
        }
        self
    }

    /// Handles any declared failure without a more specific handler.
    /// Receives the code and payload.
    pub fn error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut C, Code, Value) -> R + 'a,
    {
        if self.handlers.error_fallback.replace(Box::new(handler)).is_some() {
            debug!("replacing previously registered error fallback");
        }
        self
    }

    /// Handles declared failures with the given code. Receives the payload.
    pub fn error_on<F>(&mut self, code: impl Into<Code>, handler: F) -> &mut Self
    where
        F: Fn(&mut C, Value) -> R + 'a,
    {
        let code = code.into();
        if self.handlers.error.contains_key(&code) {
            debug!(%code, "replacing previously registered error handler");
        }
        self.handlers.error.insert(code, Box::new(handler));
        self
    }

    /// Handles every unexpected error not claimed by a more specific
    /// [`exception_of`](Self::exception_of) handler.
    pub fn exception<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut C, Cause) -> R + 'a,
    {
        self.register_exception(ErrorType::root(), handler)
    }

    /// Handles unexpected errors of type `E` or any type deriving from it.
    ///
    /// An `E` that reaches the switch inside an [`anyhow::Error`] is
    /// recognized as well.
    pub fn exception_of<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Exception,
        F: Fn(&mut C, Cause) -> R + 'a,
    {
        self.recognize::<E>();
        self.register_exception(ErrorType::of::<E>(), handler)
    }

    /// Recognizes `E` inside causes built from an [`anyhow::Error`], without
    /// registering a handler for it.
    ///
    /// Needed for subtypes that should reach an ancestor's handler when
    /// they travel through `anyhow`: the ancestor's handler alone cannot
    /// tell that an opaque error derives from it.
    pub fn recognize<E: Exception>(&mut self) -> &mut Self {
        let error_type = ErrorType::of::<E>();
        if !self.handlers.recognizers.iter().any(|(known, _)| *known == error_type) {
            let reclassify: Recognizer = Cause::reclassify::<E>;
            self.handlers.recognizers.push((error_type, reclassify));
        }
        self
    }

    /// Handles any success or declared failure no other handler matched.
    /// Never sees unexpected errors.
    pub fn any<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut C, Outcome<T>) -> R + 'a,
    {
        if self.handlers.any.replace(Box::new(handler)).is_some() {
            debug!("replacing previously registered any handler");
        }
        self
    }

    fn register_exception<F>(&mut self, error_type: ErrorType, handler: F) -> &mut Self
    where
        F: Fn(&mut C, Cause) -> R + 'a,
    {
        if self
            .handlers
            .exception
            .insert(error_type, Box::new(handler))
            .is_some()
        {
            debug!(
                error_type = error_type.name(),
                "replacing previously registered exception handler"
            );
        }
        self
    }
}

/// Resolves the single most specific handler for an outcome.
///
/// `C` is the caller context handed to every handler, `T` the success value
/// type and `R` what handlers return.
pub struct Switch<'a, C, T, R> {
    handlers: Handlers<'a, C, T, R>,
}

impl<'a, C, T, R> Switch<'a, C, T, R> {
    /// Builds a switch by running `definition` against a fresh
    /// [`Definition`].
    ///
    /// Fails with [`ConfigError::NoHandlers`] if nothing was registered.
    pub fn define<F>(definition: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&mut Definition<'a, C, T, R>),
    {
        let mut on = Definition {
            handlers: Handlers::new(),
        };
        definition(&mut on);

        if on.handlers.is_empty() {
            return Err(ConfigError::NoHandlers);
        }

        Ok(Self {
            handlers: on.handlers,
        })
    }

    /// Invokes the handler matching `outcome` with `ctx`.
    ///
    /// Exactly one handler runs, or an error is returned and none does.
    pub fn dispatch(&self, ctx: &mut C, outcome: Outcome<T>) -> Result<R, DispatchError> {
        match outcome {
            Outcome::Success(value) => self.handle_success(ctx, value),
            Outcome::Failure(failure) => match failure.into_exception() {
                Ok(cause) => self.handle_exception(ctx, cause),
                Err(failure) => self.handle_failure(ctx, failure),
            },
        }
    }

    fn handle_success(&self, ctx: &mut C, value: T) -> Result<R, DispatchError> {
        if let Some(handler) = &self.handlers.ok {
            trace!("dispatching success to ok handler");
            Ok(handler(ctx, value))
        } else if let Some(handler) = &self.handlers.any {
            trace!("dispatching success to any handler");
            Ok(handler(ctx, Outcome::Success(value)))
        } else {
            Err(DispatchError::NoSuccessHandler)
        }
    }

    fn handle_failure(&self, ctx: &mut C, failure: Failure) -> Result<R, DispatchError> {
        if let Some(handler) = self.handlers.error.get(failure.code()) {
            trace!(code = %failure.code(), "dispatching failure to error handler");
            Ok(handler(ctx, failure.into_payload()))
        } else if let Some(handler) = &self.handlers.error_fallback {
            trace!(code = %failure.code(), "dispatching failure to error fallback");
            let (code, payload, _) = failure.into_parts();
            Ok(handler(ctx, code, payload))
        } else if let Some(handler) = &self.handlers.any {
            trace!(code = %failure.code(), "dispatching failure to any handler");
            Ok(handler(ctx, Outcome::Failure(failure)))
        } else {
            Err(DispatchError::NoFailureHandler {
                code: failure.code().clone(),
            })
        }
    }

    fn handle_exception(&self, ctx: &mut C, cause: Cause) -> Result<R, DispatchError> {
        let cause = self.recover_ancestry(cause);
        let handler = cause
            .lineage()
            .iter()
            .find_map(|error_type| self.handlers.exception.get(error_type));

        match handler {
            Some(handler) => {
                trace!(
                    error_type = cause.error_type().name(),
                    "dispatching exception to nearest ancestor handler"
                );
                Ok(handler(ctx, cause))
            }
            None => {
                debug!(
                    error_type = cause.error_type().name(),
                    "no exception handler in ancestry, re-raising"
                );
                Err(DispatchError::Unhandled(cause))
            }
        }
    }

    fn recover_ancestry(&self, mut cause: Cause) -> Cause {
        if !cause.is_opaque() {
            return cause;
        }
        for (error_type, reclassify) in &self.handlers.recognizers {
            match reclassify(cause) {
                Ok(recovered) => {
                    trace!(
                        error_type = error_type.name(),
                        "recovered ancestry of opaque cause"
                    );
                    return recovered;
                }
                Err(opaque) => cause = opaque,
            }
        }
        cause
    }
}

impl<T, R> Switch<'_, (), T, R> {
    /// Dispatches without a caller context.
    pub fn call(&self, outcome: Outcome<T>) -> Result<R, DispatchError> {
        self.dispatch(&mut (), outcome)
    }
}

impl<C, T, R> fmt::Debug for Switch<'_, C, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<&str> = self.handlers.error.keys().map(Code::as_str).collect();
        codes.sort_unstable();
        let mut exceptions: Vec<&str> = self
            .handlers
            .exception
            .keys()
            .map(ErrorType::name)
            .collect();
        exceptions.sort_unstable();

        f.debug_struct("Switch")
            .field("ok", &self.handlers.ok.is_some())
            .field("error", &codes)
            .field("error_fallback", &self.handlers.error_fallback.is_some())
            .field("exception", &exceptions)
            .field("any", &self.handlers.any.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    #[error("runtime")]
    struct Runtime;

    #[derive(Debug, thiserror::Error)]
    #[error("specific: {0}")]
    struct Specific(&'static str);

    crate::impl_exception!(Runtime);
    crate::impl_exception!(Specific: Runtime);

    fn exception_outcome() -> Outcome<i32> {
        Outcome::failure(Failure::exception(Cause::new(Specific("error"))))
    }

    #[test]
    fn test_errors_if_no_handlers_defined() {
        let result = Switch::<(), i32, ()>::define(|_| {});
        assert!(matches!(result, Err(ConfigError::NoHandlers)));
        assert_eq!(result.unwrap_err().to_string(), "no handlers defined");
    }

    #[test]
    fn test_ok_receives_value() {
        let switch = Switch::<Vec<i32>, i32, ()>::define(|on| {
            on.ok(|seen, value| seen.push(value));
            on.any(|_, _| panic!("fallback incorrectly invoked"));
        })
        .unwrap();

        let mut seen = Vec::new();
        switch.dispatch(&mut seen, Outcome::success(42)).unwrap();
        assert_eq!(seen, vec![42]);
    }

    #[test]
    fn test_success_falls_back_to_any() {
        let switch = Switch::<(), i32, bool>::define(|on| {
            on.any(|_, outcome| outcome.is_success());
        })
        .unwrap();
        assert!(switch.call(Outcome::success(42)).unwrap());
    }

    #[test]
    fn test_success_without_ok_or_any() {
        let switch = Switch::<(), i32, ()>::define(|on| {
            on.error(|_, _, _| {});
        })
        .unwrap();
        let err = switch.call(Outcome::success(42)).unwrap_err();
        assert!(matches!(err, DispatchError::NoSuccessHandler));
        assert_eq!(err.to_string(), "no success handler or fallback defined");
    }

    #[test]
    fn test_error_fallback_receives_code_and_payload() {
        let switch = Switch::<(), i32, (Code, Value)>::define(|on| {
            on.error(|_, code, payload| (code, payload));
            on.any(|_, _| panic!("fallback incorrectly invoked"));
        })
        .unwrap();

        let (code, payload) = switch.call(Outcome::failure(Failure::default())).unwrap();
        assert_eq!(code, Code::ERROR);
        assert_eq!(payload, json!({}));

        let failure = Failure::new("boom").with_payload(json!({"a": 42}));
        let (code, payload) = switch.call(Outcome::failure(failure)).unwrap();
        assert_eq!(code, "boom");
        assert_eq!(payload, json!({"a": 42}));
    }

    #[test]
    fn test_specific_error_beats_fallback() {
        let switch = Switch::<(), i32, Value>::define(|on| {
            on.error_on("boom", |_, payload| payload);
            on.error(|_, _, _| panic!("general error handler invoked"));
            on.any(|_, _| panic!("fallback incorrectly invoked"));
        })
        .unwrap();

        let failure = Failure::new("boom").with_payload(json!({"a": 42}));
        assert_eq!(switch.call(Outcome::failure(failure)).unwrap(), json!({"a": 42}));
    }

    #[test]
    fn test_failure_falls_back_to_any() {
        let switch = Switch::<(), i32, String>::define(|on| {
            on.any(|_, outcome| outcome.into_failure().unwrap().code().to_string());
        })
        .unwrap();
        let code = switch.call(Outcome::failure(Failure::new("boom"))).unwrap();
        assert_eq!(code, "boom");
    }

    #[test]
    fn test_failure_without_handlers() {
        let switch = Switch::<(), i32, ()>::define(|on| {
            on.ok(|_, _| {});
        })
        .unwrap();
        let err = switch.call(Outcome::failure(Failure::new("boom"))).unwrap_err();
        assert_eq!(err.to_string(), "no failure handler or fallback defined for boom");
    }

    #[test]
    fn test_general_exception_handler() {
        let switch = Switch::<(), i32, String>::define(|on| {
            on.exception(|_, cause| cause.to_string());
        })
        .unwrap();
        assert_eq!(switch.call(exception_outcome()).unwrap(), "specific: error");
    }

    #[test]
    fn test_specific_exception_handler() {
        let switch = Switch::<(), i32, &str>::define(|on| {
            on.exception(|_, _| "general");
            on.exception_of::<Specific, _>(|_, _| "specific");
        })
        .unwrap();
        assert_eq!(switch.call(exception_outcome()).unwrap(), "specific");
    }

    #[test]
    fn test_nearest_ancestor_exception_handler() {
        let switch = Switch::<(), i32, &str>::define(|on| {
            on.exception(|_, _| "root");
            on.exception_of::<Runtime, _>(|_, _| "runtime");
        })
        .unwrap();
        assert_eq!(switch.call(exception_outcome()).unwrap(), "runtime");
    }

    #[test]
    fn test_exception_skips_any_and_error() {
        let called = Cell::new(false);
        let switch = Switch::<(), i32, ()>::define(|on| {
            on.ok(|_, _| called.set(true));
            on.error(|_, _, _| called.set(true));
            on.any(|_, _| called.set(true));
        })
        .unwrap();

        let err = switch.call(exception_outcome()).unwrap_err();
        assert!(!called.get());
        let cause = err.into_cause().unwrap();
        assert_eq!(cause.downcast_ref::<Specific>().unwrap().0, "error");
    }

    #[test]
    fn test_anyhow_wrapped_exception_reaches_its_handler() {
        let switch = Switch::<(), i32, &str>::define(|on| {
            on.exception(|_, _| "root");
            on.exception_of::<Runtime, _>(|_, _| "runtime");
            on.exception_of::<Specific, _>(|_, _| "specific");
        })
        .unwrap();

        let cause = Cause::from(anyhow::Error::new(Specific("hidden")));
        let outcome = Outcome::failure(Failure::exception(cause));
        assert_eq!(switch.call(outcome).unwrap(), "specific");
    }

    #[test]
    fn test_recognized_subtype_reaches_ancestor_handler() {
        let switch = Switch::<(), i32, String>::define(|on| {
            on.recognize::<Specific>();
            on.exception_of::<Runtime, _>(|_, cause| {
                format!("runtime: {}", cause.error_type().name())
            });
        })
        .unwrap();

        let cause = Cause::from(anyhow::Error::new(Specific("hidden")));
        let handled = switch.call(Outcome::failure(Failure::exception(cause))).unwrap();
        assert!(handled.starts_with("runtime: "));
        assert!(handled.ends_with("Specific"));
    }

    #[test]
    fn test_unrecognized_anyhow_error_stays_opaque() {
        let switch = Switch::<(), i32, ()>::define(|on| {
            on.exception_of::<Runtime, _>(|_, _| {});
        })
        .unwrap();

        let cause = Cause::from(anyhow::Error::new(Specific("hidden")));
        let err = switch
            .call(Outcome::failure(Failure::exception(cause)))
            .unwrap_err();
        let cause = err.into_cause().unwrap();
        assert!(cause.is_opaque());
        assert!(cause.is::<Specific>());
    }

    #[test]
    fn test_recognize_alone_is_not_a_handler() {
        let result = Switch::<(), i32, ()>::define(|on| {
            on.recognize::<Specific>();
        });
        assert!(matches!(result, Err(ConfigError::NoHandlers)));
    }

    #[test]
    fn test_first_listed_parent_wins() {
        #[derive(Debug, thiserror::Error)]
        #[error("retryable")]
        struct Retryable;

        #[derive(Debug, thiserror::Error)]
        #[error("timeout")]
        struct Timeout;

        crate::impl_exception!(Retryable);
        crate::impl_exception!(Timeout: Retryable, Runtime);

        let switch = Switch::<(), i32, &str>::define(|on| {
            on.exception_of::<Runtime, _>(|_, _| "runtime");
            on.exception_of::<Retryable, _>(|_, _| "retry");
        })
        .unwrap();
        let outcome = Outcome::failure(Failure::exception(Cause::new(Timeout)));
        assert_eq!(switch.call(outcome).unwrap(), "retry");

        let switch = Switch::<(), i32, &str>::define(|on| {
            on.exception_of::<Runtime, _>(|_, _| "runtime");
        })
        .unwrap();
        let outcome = Outcome::failure(Failure::exception(Cause::new(Timeout)));
        assert_eq!(switch.call(outcome).unwrap(), "runtime");
    }

    #[test]
    fn test_exception_code_without_cause_is_declared() {
        let switch = Switch::<(), i32, Code>::define(|on| {
            on.error(|_, code, _| code);
        })
        .unwrap();
        let code = switch
            .call(Outcome::failure(Failure::new(Code::EXCEPTION)))
            .unwrap();
        assert_eq!(code, Code::EXCEPTION);
    }

    #[test]
    fn test_last_registration_wins() {
        let switch = Switch::<(), i32, i32>::define(|on| {
            on.ok(|_, _| 1);
            on.ok(|_, _| 2);
            on.error_on("boom", |_, _| 3);
            on.error_on("boom", |_, _| 4);
        })
        .unwrap();
        assert_eq!(switch.call(Outcome::success(0)).unwrap(), 2);
        assert_eq!(
            switch.call(Outcome::failure(Failure::new("boom"))).unwrap(),
            4
        );
    }

    #[test]
    fn test_handlers_mutate_context() {
        struct Controller {
            rendered: Vec<String>,
        }

        let switch = Switch::<Controller, &str, ()>::define(|on| {
            on.ok(|ctl, name| ctl.rendered.push(format!("ok:{name}")));
            on.error(|ctl, code, _| ctl.rendered.push(format!("error:{code}")));
        })
        .unwrap();

        let mut ctl = Controller {
            rendered: Vec::new(),
        };
        switch.dispatch(&mut ctl, Outcome::success("plan")).unwrap();
        switch
            .dispatch(&mut ctl, Outcome::failure(Failure::new("bang")))
            .unwrap();
        assert_eq!(ctl.rendered, vec!["ok:plan", "error:bang"]);
    }

    #[test]
    fn test_debug_lists_registered_slots() {
        let switch = Switch::<(), i32, ()>::define(|on| {
            on.ok(|_, _| {});
            on.error_on("b", |_, _| {});
            on.error_on("a", |_, _| {});
        })
        .unwrap();
        let debug = format!("{:?}", switch);
        assert!(debug.contains("ok: true"));
        assert!(debug.contains(r#"error: ["a", "b"]"#));
    }
}
