//! Recorded causes and error ancestry.
//!
//! Rust errors have no class hierarchy, so ancestry is declared: an error
//! type implements [`Exception`] and lists its supertypes, nearest first.
//! Every chain implicitly ends at the root type ([`ErrorType::root`]), which
//! is what an untyped `exception` handler is registered for.
//!
//! ```rust
//! use upshot::{impl_exception, Cause, ErrorType};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("store unavailable")]
//! struct StoreError;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("record not found")]
//! struct NotFound;
//!
//! impl_exception!(StoreError);
//! impl_exception!(NotFound: StoreError);
//!
//! let cause = Cause::new(NotFound);
//! assert_eq!(
//!     cause.lineage(),
//!     &[ErrorType::of::<NotFound>(), ErrorType::of::<StoreError>(), ErrorType::root()]
//! );
//! assert!(cause.is_a::<StoreError>());
//! ```

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker for the root of every error ancestry.
enum RootError {}

/// A stable identifier for an error type.
#[derive(Clone, Copy)]
pub struct ErrorType {
    id: TypeId,
    name: &'static str,
}

impl ErrorType {
    /// The identifier for `E`.
    pub fn of<E: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    /// The root error type every ancestry ends at.
    pub fn root() -> Self {
        Self {
            id: TypeId::of::<RootError>(),
            name: "error",
        }
    }

    /// Ancestry of `E`, most specific first: `E` itself, its declared
    /// supertypes, then the root.
    pub fn ancestry<E: Exception>() -> Vec<ErrorType> {
        let mut chain = vec![Self::of::<E>()];
        chain.extend(E::supertypes());
        if chain.last() != Some(&Self::root()) {
            chain.push(Self::root());
        }
        chain
    }

    /// The type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this is the root type.
    pub fn is_root(&self) -> bool {
        *self == Self::root()
    }

    /// Merges the ancestries of several direct parents, nearest first.
    ///
    /// The direct parents come first in the order given, then everything
    /// they inherit. Each type appears once and the root is left out.
    #[doc(hidden)]
    pub fn inherit(parents: Vec<Vec<ErrorType>>) -> Vec<ErrorType> {
        let direct = parents.iter().filter_map(|chain| chain.first());
        let inherited = parents.iter().flat_map(|chain| chain.iter().skip(1));

        let mut merged: Vec<ErrorType> = Vec::new();
        for error_type in direct.chain(inherited) {
            if !error_type.is_root() && !merged.contains(error_type) {
                merged.push(*error_type);
            }
        }
        merged
    }
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ErrorType {}

impl Hash for ErrorType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// An error type that takes part in ancestry-based dispatch.
///
/// The default implementation declares no supertypes, so the type derives
/// directly from the root. Use [`impl_exception!`](crate::impl_exception)
/// to declare a parent.
pub trait Exception: std::error::Error + Send + Sync + 'static {
    /// Supertypes of this error, nearest first. The root may be omitted.
    fn supertypes() -> Vec<ErrorType>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Implements [`Exception`] for a type, optionally naming its parents.
///
/// Each parent must itself implement [`Exception`]; its whole ancestry is
/// inherited. With several parents, lookup tries the parents in the order
/// they are listed before anything they inherit.
///
/// ```rust
/// use upshot::{impl_exception, ErrorType};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("transient")]
/// struct Transient;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("network")]
/// struct Network;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("timed out")]
/// struct Timeout;
///
/// impl_exception!(Transient);
/// impl_exception!(Network);
/// impl_exception!(Timeout: Transient, Network);
///
/// assert_eq!(
///     ErrorType::ancestry::<Timeout>(),
///     vec![
///         ErrorType::of::<Timeout>(),
///         ErrorType::of::<Transient>(),
///         ErrorType::of::<Network>(),
///         ErrorType::root(),
///     ]
/// );
/// ```
#[macro_export]
macro_rules! impl_exception {
    ($ty:ty : $($parent:ty),+ $(,)?) => {
        impl $crate::Exception for $ty {
            fn supertypes() -> ::std::vec::Vec<$crate::ErrorType> {
                $crate::ErrorType::inherit(::std::vec![
                    $($crate::ErrorType::ancestry::<$parent>()),+
                ])
            }
        }
    };
    ($ty:ty) => {
        impl $crate::Exception for $ty {}
    };
}

/// The originating error behind a failure.
///
/// A cause keeps the error itself (as an [`anyhow::Error`]) together with
/// the ancestry it was recorded with. Recording a cause never raises it:
/// it is an explicit value, not ambient state.
pub struct Cause {
    error: anyhow::Error,
    lineage: Vec<ErrorType>,
}

impl Cause {
    /// Records an error with its declared ancestry.
    pub fn new<E: Exception>(error: E) -> Self {
        Self {
            error: anyhow::Error::new(error),
            lineage: ErrorType::ancestry::<E>(),
        }
    }

    /// Records an error that declares no ancestry.
    ///
    /// The lineage is the concrete type followed by the root.
    pub fn foreign<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            error: anyhow::Error::new(error),
            lineage: vec![ErrorType::of::<E>(), ErrorType::root()],
        }
    }

    /// The concrete error type.
    pub fn error_type(&self) -> ErrorType {
        self.lineage.first().copied().unwrap_or_else(ErrorType::root)
    }

    /// The ancestry, most specific first, ending at the root.
    pub fn lineage(&self) -> &[ErrorType] {
        &self.lineage
    }

    /// Returns true if `E` appears anywhere in the ancestry.
    pub fn is_a<E: ?Sized + 'static>(&self) -> bool {
        self.lineage.contains(&ErrorType::of::<E>())
    }

    /// Returns true if the recorded error is exactly an `E`.
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.is::<E>()
    }

    /// Borrows the recorded error as an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Takes the recorded error out as an `E`, or returns the cause intact.
    pub fn downcast<E>(self) -> Result<E, Self>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        let lineage = self.lineage;
        self.error
            .downcast::<E>()
            .map_err(|error| Self { error, lineage })
    }

    /// Borrows the recorded error.
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Consumes the cause, returning the recorded error.
    pub fn into_inner(self) -> anyhow::Error {
        self.error
    }

    /// Returns true if nothing but the root is known about the error.
    ///
    /// This is the case for causes built from an [`anyhow::Error`].
    pub fn is_opaque(&self) -> bool {
        matches!(self.lineage.as_slice(), [only] if only.is_root())
    }

    /// Re-reads the ancestry of `E` if the recorded error is an `E`.
    ///
    /// Returns the cause unchanged as `Err` when it holds something else.
    /// Context added with [`anyhow::Context`] does not hide the type.
    ///
    /// ```rust
    /// use upshot::{impl_exception, Cause};
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("quota exceeded")]
    /// struct QuotaExceeded;
    ///
    /// impl_exception!(QuotaExceeded);
    ///
    /// let cause = Cause::from(anyhow::Error::new(QuotaExceeded));
    /// assert!(cause.is_opaque());
    ///
    /// let cause = cause.reclassify::<QuotaExceeded>().unwrap();
    /// assert!(cause.is_a::<QuotaExceeded>());
    /// ```
    pub fn reclassify<E: Exception>(self) -> Result<Self, Self> {
        if self.error.is::<E>() {
            Ok(Self {
                error: self.error,
                lineage: ErrorType::ancestry::<E>(),
            })
        } else {
            Err(self)
        }
    }
}

impl From<anyhow::Error> for Cause {
    /// A cause that travelled through `anyhow` comes back with its lineage.
    /// Any other error is opaque, so only the root is recorded; a switch
    /// recovers the ancestry of types it has handlers for.
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<Cause>() {
            Ok(cause) => cause,
            Err(error) => Self {
                error,
                lineage: vec![ErrorType::root()],
            },
        }
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cause")
            .field("type", &self.error_type())
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}
