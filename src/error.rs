//! Error channel for resumable tasks and the reactor.
//!
//! Two families of errors live here:
//!
//! - **Domain errors**: every task kind declares a closed error enum and
//!   implements [`Domain`] for it. A thrown domain error is stored in the
//!   task's error slot as a [`Fault`], an erased descriptor that keeps the
//!   identity (domain + kind id) of the original value. Faults propagate
//!   verbatim through composing parents, so a leaf error surfaces unchanged
//!   at every ancestor that does not catch it.
//! - **Platform errors**: failures of the readiness wait or the clock. These
//!   abort [`Reactor::run`](crate::Reactor::run) as a [`ReactorError`] and are
//!   never attributed to a single task.
//!
//! # Example
//!
//! ```ignore
//! use stackless::{Domain, Fault};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
//! enum ReadError {
//!     #[error("error: open")]
//!     Open,
//!     #[error("error: read")]
//!     Read,
//! }
//!
//! impl Domain for ReadError {
//!     const NAME: &'static str = "ReadFile";
//!
//!     fn kind(&self) -> u16 {
//!         *self as u16
//!     }
//! }
//!
//! let fault = Fault::new(ReadError::Read);
//! assert!(fault.is::<ReadError>());
//! assert_eq!(fault.message(), "error: read");
//! ```

use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A closed, per-task-kind error domain.
///
/// Implementors are small `Copy` enums; `Display` supplies the human-readable
/// message and [`Domain::kind`] the stable id used for identity checks.
pub trait Domain: StdError + Copy + Send + Sync + 'static {
    /// Name of the domain, usually the task kind that owns it.
    const NAME: &'static str;

    /// Stable id of this error within its domain.
    fn kind(&self) -> u16;
}

/// Erased, immutable descriptor of a thrown domain error.
///
/// Equality compares identity (domain type and kind id), never the message.
#[derive(Clone)]
pub struct Fault {
    domain: TypeId,
    name: &'static str,
    kind: u16,
    error: Arc<dyn StdError + Send + Sync>,
}

impl Fault {
    /// Wraps a domain error value.
    pub fn new<E: Domain>(error: E) -> Self {
        Self {
            domain: TypeId::of::<E>(),
            name: E::NAME,
            kind: error.kind(),
            error: Arc::new(error),
        }
    }

    /// Returns `true` if this fault belongs to domain `E`.
    pub fn is<E: Domain>(&self) -> bool {
        self.domain == TypeId::of::<E>()
    }

    /// Recovers the typed error if this fault belongs to domain `E`.
    pub fn downcast<E: Domain>(&self) -> Option<E> {
        self.error.downcast_ref::<E>().copied()
    }

    /// Returns `true` if this fault is exactly `error` (same domain and kind).
    pub fn matches<E: Domain>(&self, error: E) -> bool {
        self.is::<E>() && self.kind == error.kind()
    }

    /// Name of the domain this fault belongs to.
    pub fn domain(&self) -> &'static str {
        self.name
    }

    /// Kind id within the domain.
    pub fn kind(&self) -> u16 {
        self.kind
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl<E: Domain> From<E> for Fault {
    fn from(error: E) -> Self {
        Fault::new(error)
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain && self.kind == other.kind
    }
}

impl Eq for Fault {}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("domain", &self.name)
            .field("kind", &self.kind)
            .field("message", &self.message())
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.error)
    }
}

/// Returns `true` if `fault` belongs to domain `E`.
pub fn is_error<E: Domain>(fault: &Fault) -> bool {
    fault.is::<E>()
}

/// Returns the message of `fault`.
pub fn error_message(fault: &Fault) -> String {
    fault.message()
}

/// Platform failure that aborts a reactor run or a blocking drive.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// The monotonic clock could not be read.
    #[error("clock query failed: {0}")]
    Clock(#[source] io::Error),

    /// The readiness wait failed.
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),

    /// The sleep of a blocking timer wait failed.
    #[error("sleep failed: {0}")]
    Sleep(#[source] io::Error),
}

impl ReactorError {
    /// Negative status code of the failed run.
    pub fn code(&self) -> i32 {
        match self {
            ReactorError::Clock(_) => -1,
            ReactorError::Poll(_) => -2,
            ReactorError::Sleep(_) => -3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
    enum Left {
        #[error("left: first")]
        First,
        #[error("left: second")]
        Second,
    }

    impl Domain for Left {
        const NAME: &'static str = "Left";

        fn kind(&self) -> u16 {
            *self as u16
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
    enum Right {
        #[error("left: first")]
        First,
    }

    impl Domain for Right {
        const NAME: &'static str = "Right";

        fn kind(&self) -> u16 {
            *self as u16
        }
    }

    #[test]
    fn identity_ignores_message() {
        let a = Fault::new(Left::First);
        let b = Fault::new(Right::First);

        assert_eq!(a.message(), b.message());
        assert_ne!(a, b);
        assert_eq!(a, Fault::new(Left::First));
        assert_ne!(a, Fault::new(Left::Second));
    }

    #[test]
    fn downcast_recovers_typed_error() {
        let fault = Fault::from(Left::Second);

        assert!(is_error::<Left>(&fault));
        assert!(!is_error::<Right>(&fault));
        assert_eq!(fault.downcast::<Left>(), Some(Left::Second));
        assert_eq!(fault.downcast::<Right>(), None);
        assert!(fault.matches(Left::Second));
        assert_eq!(fault.domain(), "Left");
        assert_eq!(fault.kind(), 1);
        assert_eq!(error_message(&fault), "left: second");
    }

    #[test]
    fn reactor_error_codes_are_negative() {
        let err = ReactorError::Poll(io::Error::from_raw_os_error(libc::EBADF));
        assert_eq!(err.code(), -2);
        assert!(ReactorError::Clock(io::Error::other("x")).code() < 0);
        assert_eq!(ReactorError::Sleep(io::Error::other("x")).code(), -3);
    }
}
