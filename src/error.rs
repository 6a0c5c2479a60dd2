//! Error types and the default failure reporter.
//!
//! Failures in upshot are explicit, typed values dispatched by reference
//! through handler chains; there is no unwinding. The taxonomy:
//!
//! - **Native status failure**: a negative status code from the external
//!   loop, carried as [`Error::Status`] with a name and message
//! - **Handler failure**: a value handler returning `Err`, redirected into
//!   the same outcome's failure channel
//! - **Transform failure**: a cast adapter's wrapper returning `Err`,
//!   redirected into the target outcome's failure channel
//! - **Cancellation**: [`StatusCode::ECANCELED`], recognized by the request
//!   lifecycle as "no outcome at all"
//!
//! A failure that no handler consumes is handed to [`report_unhandled`],
//! which writes to the process error stream. Failures are never silently
//! dropped.

use std::fmt;
use std::sync::Arc;

use thiserror::Error as ThisError;

/// A convenient alias bound to this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Numeric status code in the external loop's convention: zero or positive
/// means success, negative means failure.
///
/// The named constants cover the codes this crate itself interprets plus the
/// common vocabulary wrapper layers translate from the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Success.
    pub const OK: Self = Self(0);
    /// Operation not permitted.
    pub const EPERM: Self = Self(-1);
    /// No such file or directory.
    pub const ENOENT: Self = Self(-2);
    /// Bad file descriptor.
    pub const EBADF: Self = Self(-9);
    /// Resource temporarily unavailable.
    pub const EAGAIN: Self = Self(-11);
    /// Resource busy or locked.
    pub const EBUSY: Self = Self(-16);
    /// Invalid argument.
    pub const EINVAL: Self = Self(-22);
    /// Socket operation on non-socket.
    pub const ENOTSOCK: Self = Self(-88);
    /// Address already in use.
    pub const EADDRINUSE: Self = Self(-98);
    /// Connection timed out.
    pub const ETIMEDOUT: Self = Self(-110);
    /// Operation cancelled.
    pub const ECANCELED: Self = Self(-125);
    /// Unknown error.
    pub const UNKNOWN: Self = Self(-4094);
    /// End of file.
    pub const EOF: Self = Self(-4095);

    /// Whether this code reports a failure.
    #[must_use]
    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// Whether this code reports a cancelled operation.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        self.0 == Self::ECANCELED.0
    }

    /// Short upper-case name for the code, `"UNKNOWN"` when unrecognized.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OK => "OK",
            Self::EPERM => "EPERM",
            Self::ENOENT => "ENOENT",
            Self::EBADF => "EBADF",
            Self::EAGAIN => "EAGAIN",
            Self::EBUSY => "EBUSY",
            Self::EINVAL => "EINVAL",
            Self::ENOTSOCK => "ENOTSOCK",
            Self::EADDRINUSE => "EADDRINUSE",
            Self::ETIMEDOUT => "ETIMEDOUT",
            Self::ECANCELED => "ECANCELED",
            Self::EOF => "EOF",
            _ => "UNKNOWN",
        }
    }

    /// Human-readable message for the code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::OK => "success",
            Self::EPERM => "operation not permitted",
            Self::ENOENT => "no such file or directory",
            Self::EBADF => "bad file descriptor",
            Self::EAGAIN => "resource temporarily unavailable",
            Self::EBUSY => "resource busy or locked",
            Self::EINVAL => "invalid argument",
            Self::ENOTSOCK => "socket operation on non-socket",
            Self::EADDRINUSE => "address already in use",
            Self::ETIMEDOUT => "connection timed out",
            Self::ECANCELED => "operation cancelled",
            Self::EOF => "end of file",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): {}", self.name(), self.0, self.message())
    }
}

/// A failure travelling through an outcome's failure channel.
///
/// `Error` is `Clone` so that every observer in a watch chain sees the same
/// failure instance; user payloads are `Arc`-shared for the same reason.
#[derive(Debug, Clone, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// A negative status reported by the native layer.
    #[error("{code}")]
    Status {
        /// The failing status code.
        code: StatusCode,
    },

    /// Sentinel recognized by a watched callback: raising it asks the owning
    /// handle to close itself. Consumed by the watch registration.
    #[error("close handle")]
    CloseHandle,

    /// The handle is already closing or closed; the operation was rejected
    /// locally without reaching the native layer.
    #[error("handle is closing or closed")]
    HandleClosed,

    /// A plain-text failure raised by user code.
    #[error("{0}")]
    Message(Arc<str>),

    /// An arbitrary failure payload supplied by user code.
    #[error("{0}")]
    User(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Native status failure for `code`.
    #[must_use]
    pub const fn status(code: StatusCode) -> Self {
        Self::Status { code }
    }

    /// Plain-text failure.
    #[must_use]
    pub fn message(text: impl Into<Arc<str>>) -> Self {
        Self::Message(text.into())
    }

    /// Wraps an arbitrary error value as a shareable failure payload.
    #[must_use]
    pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::User(Arc::new(err))
    }

    /// The native status code, if this failure carries one.
    #[must_use]
    pub const fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code } => Some(*code),
            _ => None,
        }
    }

    /// Whether this failure is a cancellation status.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Status { code } if code.is_cancelled())
    }
}

impl From<StatusCode> for Error {
    fn from(code: StatusCode) -> Self {
        Self::Status { code }
    }
}

/// The global default failure reporter.
///
/// Invoked for any failure that reaches the end of a failure-handler chain
/// without a handler reporting it handled, and for failures raised on an
/// outcome with no failure handlers at all. Stateless; writes one line to
/// the process error stream. Callers who intend to ignore failures should
/// register a handler that reports them handled instead of relying on this.
pub fn report_unhandled(failure: &Error) {
    #[cfg(feature = "tracing-integration")]
    tracing::error!(failure = %failure, "unhandled outcome failure");
    eprintln!("[ERROR] {failure}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_renders_name_code_message() {
        let rendered = StatusCode::ETIMEDOUT.to_string();
        assert_eq!(rendered, "ETIMEDOUT(-110): connection timed out");
    }

    #[test]
    fn unrecognized_code_is_unknown() {
        let code = StatusCode(-777);
        assert_eq!(code.name(), "UNKNOWN");
        assert!(code.is_err());
        assert!(!code.is_cancelled());
    }

    #[test]
    fn cancellation_is_recognized_through_error() {
        let failure = Error::status(StatusCode::ECANCELED);
        assert!(failure.is_cancelled());
        assert_eq!(failure.code(), Some(StatusCode::ECANCELED));
    }

    #[test]
    fn user_payload_is_shared_not_copied() {
        #[derive(Debug)]
        struct Marker;
        impl fmt::Display for Marker {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "marker")
            }
        }
        impl std::error::Error for Marker {}

        let failure = Error::user(Marker);
        let cloned = failure.clone();
        match (&failure, &cloned) {
            (Error::User(a), Error::User(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => unreachable!(),
        }
    }
}
