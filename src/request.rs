//! Complete-and-free lifecycle for one-shot asynchronous operations.
//!
//! Every one-shot call follows the same shape: a per-operation record is
//! allocated immediately before issuing the native call, attached to the
//! native request object, detached again at the top of the completion
//! callback (so the native request can be reused inside the callback
//! itself), and freed when the callback returns. Two paths need explicit
//! care:
//!
//! - **Synchronous failure**: the native call rejects the request before
//!   any callback is scheduled. [`issue`] covers this with a drop guard,
//!   so the record is freed before the issuing function returns the error.
//! - **Cancellation**: a [`StatusCode::ECANCELED`] check result produces no
//!   outcome resolution at all; the operation vanishes without result. The
//!   proxy is still finalized and the cleanup still runs.
//!
//! ```text
//!   Issued ──check ok──► Completed(success)   resolve, finalize, cleanup
//!          ──check err─► Completed(failure)   reject,  finalize, cleanup
//!          ──ECANCELED─► Cancelled            finalize, cleanup only
//! ```

use std::fmt;

use crate::error::{Error, StatusCode};
use crate::outcome::PromiseProxy;
use crate::util::Defer;

/// The per-operation record attached to a native request.
///
/// Holds the proxy that settles the operation's promise (usually a
/// [`PromiseCast`](crate::PromiseCast) narrowing the raw completion
/// arguments to a domain payload), the `check` that maps raw completion
/// arguments to a status, and an optional `cleanup` for native-allocated
/// auxiliary resources that must be freed once the outcome has been
/// dispatched.
pub struct RequestRecord<A> {
    proxy: Box<dyn PromiseProxy<A>>,
    check: Box<dyn Fn(&A) -> StatusCode + Send>,
    cleanup: Option<Box<dyn FnOnce(&mut A) + Send>>,
}

impl<A> RequestRecord<A> {
    /// Builds a record around the proxy that will settle the operation.
    /// The default `check` accepts every completion as success.
    #[must_use]
    pub fn new(proxy: impl PromiseProxy<A> + 'static) -> Self {
        Self {
            proxy: Box::new(proxy),
            check: Box::new(|_| StatusCode::OK),
            cleanup: None,
        }
    }

    /// Sets the check translating raw completion arguments into a status.
    #[must_use]
    pub fn check(mut self, check: impl Fn(&A) -> StatusCode + Send + 'static) -> Self {
        self.check = Box::new(check);
        self
    }

    /// Sets the type-specific cleanup run after dispatch, success or not.
    #[must_use]
    pub fn cleanup(mut self, cleanup: impl FnOnce(&mut A) + Send + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }
}

impl<A> fmt::Debug for RequestRecord<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRecord")
            .field("has_cleanup", &self.cleanup.is_some())
            .finish_non_exhaustive()
    }
}

/// The record slot of a native request object, the stand-in for the
/// native layer's per-request data pointer.
///
/// A wrapper layer embeds one slot in each native request it manages. The
/// slot is empty between operations, which is what makes the native
/// request reusable from inside its own completion callback.
pub struct RequestSlot<A> {
    record: Option<Box<RequestRecord<A>>>,
}

impl<A> RequestSlot<A> {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self { record: None }
    }

    /// Whether a record is currently attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.record.is_some()
    }

    fn attach(&mut self, record: RequestRecord<A>) {
        debug_assert!(self.record.is_none(), "request already in flight");
        self.record = Some(Box::new(record));
    }

    fn detach(&mut self) -> Option<Box<RequestRecord<A>>> {
        self.record.take()
    }
}

impl<A> Default for RequestSlot<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for RequestSlot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSlot")
            .field("attached", &self.record.is_some())
            .finish()
    }
}

/// Issues a one-shot operation: attaches `record` to `slot`, then runs the
/// native `start` call.
///
/// A negative start status is a synchronous failure: the record is freed
/// before this function returns the error, so no callback will ever see
/// it. On success the record's ownership transfers to the eventual
/// completion callback and this returns `Ok(())`.
pub fn issue<A>(
    slot: &mut RequestSlot<A>,
    record: RequestRecord<A>,
    start: impl FnOnce() -> StatusCode,
) -> Result<(), Error> {
    let mut guard = issue_guarded(slot, record);
    let status = start();
    if status.is_err() {
        // The callback will never fire; the guard frees the record on the
        // way out.
        return Err(Error::from(status));
    }
    guard.release();
    Ok(())
}

/// Variant of [`issue`] for native calls that may need the record freed by
/// an outer guard: returns the armed [`Defer`] so the caller controls when
/// ownership transfers. Most wrapper layers want plain [`issue`]; this
/// form exists for call sites that do more work between attach and start.
pub fn issue_guarded<A>(
    slot: &mut RequestSlot<A>,
    record: RequestRecord<A>,
) -> Defer<impl FnOnce()> {
    slot.attach(record);
    Defer::new(move || {
        slot.record = None;
    })
}

/// Loop-side entry invoked by the native completion callback.
///
/// Detaches the record from `slot` first; the native request object is
/// reusable from this point, including from inside the handlers this call
/// dispatches into. Then: `check` maps `args` to a status; `ECANCELED`
/// short-circuits with no resolution; any other failure rejects and
/// success resolves. The proxy finalize and the type-specific cleanup run
/// on every path, in that order.
pub fn complete<A>(slot: &mut RequestSlot<A>, mut args: A) {
    let Some(record) = slot.detach() else {
        return;
    };
    let RequestRecord {
        proxy,
        check,
        cleanup,
    } = *record;

    let status = check(&args);
    if status.is_cancelled() {
        #[cfg(feature = "tracing-integration")]
        tracing::trace!("request cancelled, no outcome dispatched");
    } else if status.is_err() {
        proxy.reject(&Error::from(status));
    } else {
        proxy.resolve(&args);
    }

    proxy.finalize();
    if let Some(cleanup) = cleanup {
        cleanup(&mut args);
    }
}
