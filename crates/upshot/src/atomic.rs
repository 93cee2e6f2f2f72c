//! Scoped atomic execution.
//!
//! [`transaction`] runs a block inside a region whose effects are discarded
//! if the block does not complete. Regions always nest: an inner region is
//! its own savepoint, so discarding it leaves the enclosing region intact.
//!
//! | Block ends with | Region | `transaction` returns |
//! |-----------------|--------|-----------------------|
//! | `Ok(value)` | committed | `Ok(Some(value))` |
//! | [`Interrupt::Rollback`] | discarded | `Ok(None)` |
//! | `Abort` / `Raise` | discarded | the same `Err` |
//!
//! Storage plugs in through [`Atomic`]. [`Journal`] is an in-memory
//! implementation backed by a stack of snapshots.
//!
//! ```rust
//! use upshot::{abort, transaction, Interrupt, Journal};
//!
//! let mut plans = Journal::new(vec!["basic"]);
//!
//! let result = transaction(&mut plans, |plans| -> Result<(), Interrupt> {
//!     plans.get_mut().push("premium");
//!     Err(abort("over_quota"))
//! });
//!
//! assert!(matches!(result, Err(Interrupt::Abort(_))));
//! assert_eq!(plans.get(), &vec!["basic"]);
//! ```

use tracing::{debug, trace};

use crate::command::Interrupt;

/// Storage with nested savepoints.
pub trait Atomic {
    /// Opens a new innermost region.
    fn begin(&mut self);
    /// Keeps the innermost region's effects and closes it.
    fn commit(&mut self);
    /// Discards the innermost region's effects and closes it.
    fn rollback(&mut self);
    /// Number of open regions.
    fn depth(&self) -> usize;
}

/// Runs `body` inside a new nested region of `store`.
pub fn transaction<S, T, F>(store: &mut S, body: F) -> Result<Option<T>, Interrupt>
where
    S: Atomic + ?Sized,
    F: FnOnce(&mut S) -> Result<T, Interrupt>,
{
    store.begin();
    let depth = store.depth();
    trace!(depth, "atomic region opened");

    match body(store) {
        Ok(value) => {
            store.commit();
            trace!(depth, "atomic region committed");
            Ok(Some(value))
        }
        Err(Interrupt::Rollback) => {
            store.rollback();
            debug!(depth, "atomic region rolled back on request");
            Ok(None)
        }
        Err(interrupt) => {
            store.rollback();
            debug!(depth, "atomic region rolled back, propagating interrupt");
            Err(interrupt)
        }
    }
}

/// In-memory value with snapshot-based savepoints.
#[derive(Debug, Clone, Default)]
pub struct Journal<T: Clone> {
    current: T,
    savepoints: Vec<T>,
}

impl<T: Clone> Journal<T> {
    /// Creates a journal holding `value`, with no open regions.
    pub fn new(value: T) -> Self {
        Self {
            current: value,
            savepoints: Vec::new(),
        }
    }

    /// The current value, including uncommitted changes.
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Mutable access to the current value.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.current
    }

    /// Consumes the journal, returning the current value.
    pub fn into_inner(self) -> T {
        self.current
    }
}

impl<T: Clone> Atomic for Journal<T> {
    fn begin(&mut self) {
        self.savepoints.push(self.current.clone());
    }

    fn commit(&mut self) {
        self.savepoints.pop();
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.savepoints.pop() {
            self.current = saved;
        }
    }

    fn depth(&self) -> usize {
        self.savepoints.len()
    }
}
