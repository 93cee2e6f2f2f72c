//! Result-oriented command execution.
//!
//! `upshot` runs a unit of work, normalizes whatever it produced into an
//! [`Outcome`], and optionally dispatches that outcome through a declarative
//! [`Switch`] that picks the single most specific handler.
//!
//! # Features
//!
//! - **Outcomes**: a success carries a value; a failure carries a [`Code`],
//!   a JSON payload and optionally the [`Cause`] behind it
//! - **Commands**: anything implementing [`Command`], or a closure through
//!   [`command`]; [`abort`] for declared failures, `?` for unexpected ones
//! - **Dispatch**: handlers per code, per error type (with ancestor
//!   matching) and fallbacks, resolved by a fixed specificity order
//! - **Pipelines**: sequential composition that stops at the first failure
//! - **Atomic regions**: nested all-or-nothing blocks over pluggable storage
//! - **Messages**: failure messages from a YAML catalog with `%{name}`
//!   interpolation
//!
//! # Outcome Flow
//!
//! ```text
//! Command::execute()
//!   → IntoOutcome (value → Success, Outcome → as-is)
//!   → Interrupt::Abort  → Failure(code, payload)
//!   → Interrupt::Raise  → Cause (escapes, or reaches a Switch)
//!   → Runner attaches a catalog message
//!   → Switch::dispatch picks one handler
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use upshot::{abort, command, Interrupt, Runner, Switch};
//!
//! let mut create_plan = command(|| -> Result<u32, Interrupt> {
//!     let name = "";
//!     if name.is_empty() {
//!         abort!("validation_failed", json!({ "field": "name" }));
//!     }
//!     Ok(42)
//! });
//!
//! let switch = Switch::<(), u32, String>::define(|on| {
//!     on.ok(|_, id| format!("redirect to plan {id}"));
//!     on.error_on("validation_failed", |_, payload| {
//!         format!("re-render form, bad {}", payload["field"].as_str().unwrap_or("?"))
//!     });
//!     on.exception(|_, cause| format!("500: {cause}"));
//! })?;
//!
//! let response = Runner::new().call_with(&mut create_plan, &mut (), &switch)?;
//! assert_eq!(response, "re-render form, bad name");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod atomic;
mod cause;
mod command;
mod config;
mod error;
mod message;
mod outcome;
mod pipeline;
mod runner;
mod switch;

pub use atomic::{transaction, Atomic, Journal};

pub use cause::{Cause, ErrorType, Exception};

pub use command::{abort, abort_with, command, rollback, Command, FnCommand, Interrupt, IntoOutcome};

pub use config::RunnerConfig;

pub use error::{ConfigError, DispatchError, StrayRollback};

pub use message::{interpolate, Catalog, CatalogError, MessageLookup};

pub use outcome::{Code, Failure, Outcome};

pub use pipeline::{pipe, CommandExt, Pipeline};

pub use runner::{call, call_with, Runner};

pub use switch::{Definition, Switch};
