//! Close-once lifecycle for long-lived asynchronous resources.
//!
//! A handle wraps an opaque per-resource payload whose lifetime is tied to
//! the native resource: created at initialization, owned until the native
//! close-completion callback fires, released synchronously inside that
//! callback. The state machine is strictly one-way:
//!
//! ```text
//!   Active ──close()──► Closing ──close completion──► Closed
//!              │                                        │
//!              └── further close requests: no-ops       └── payload released
//! ```
//!
//! Close-once is guaranteed by an atomic exchange on the `closed` flag:
//! only the winning caller invokes the native close primitive, so the
//! native close callback fires exactly once no matter how many threads
//! race. Operations issued on a closing or closed handle are rejected
//! locally and uniformly via [`Handle::guard_active`]: wrapper layers call
//! it before arming anything, instead of relying on per-type native
//! behavior.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::Error;
use crate::outcome::{Callback, Promise, PromiseEmitter, PromiseProxy};

/// Opaque per-resource payload attached to a handle.
///
/// The payload typically owns the emitters feeding the handle's outcome
/// objects; [`on_close`](HandleData::on_close) is the place to finalize
/// them so queue-bridged consumers observe completion.
pub trait HandleData: Send {
    /// Teardown run on the loop thread when the close completion fires,
    /// immediately before the payload is released.
    fn on_close(&mut self) {}
}

/// The native side of a handle, supplied by the wrapper layer.
///
/// The implementation must ask the external loop to close the native
/// resource; the loop must then deliver the close completion exactly once,
/// on its designated thread, by calling [`Handle::close_complete`].
pub trait RawHandle: Send + Sync {
    /// Begins the native close. Called at most once per handle.
    fn request_close(&self);
}

struct HandleInner {
    raw: Arc<dyn RawHandle>,
    closed: AtomicBool,
    close_cb: Mutex<Option<PromiseEmitter<()>>>,
    data: Mutex<Option<Box<dyn HandleData>>>,
}

/// A long-lived asynchronous resource with a close-once lifecycle.
///
/// Cheap to clone; clones share the lifecycle state. The handle does not
/// close itself on drop: the native layer owns the resource until the
/// close callback runs, so a handle that is never closed never releases
/// its payload. Close even handles that were constructed but never armed.
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    /// Binds a native resource and its opaque payload into a handle.
    #[must_use]
    pub fn new(raw: Arc<dyn RawHandle>, data: Box<dyn HandleData>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                raw,
                closed: AtomicBool::new(false),
                close_cb: Mutex::new(None),
                data: Mutex::new(Some(data)),
            }),
        }
    }

    /// Whether a close has been requested (the handle is `Closing` or
    /// `Closed`).
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Rejects further operations once a close has been requested.
    ///
    /// Wrapper layers call this before arming any operation on the native
    /// resource; the failure is uniform across resource types.
    pub fn guard_active(&self) -> Result<(), Error> {
        if self.is_closing() {
            return Err(Error::HandleClosed);
        }
        Ok(())
    }

    /// Fire-and-forget close. The first caller wins the exchange and
    /// triggers the native close; every later call is a safe no-op.
    pub fn close_detached(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        #[cfg(feature = "tracing-integration")]
        tracing::trace!("handle close requested");
        self.inner.raw.request_close();
    }

    /// Awaitable close. The winning caller receives a promise that resolves
    /// when the close completion fires; callers that lose the race get
    /// `None` and must not assume the close has finished.
    #[must_use]
    pub fn close(&self) -> Option<Promise<()>> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        let promise = Promise::new();
        *self.inner.close_cb.lock() = Some(promise.emitter());
        #[cfg(feature = "tracing-integration")]
        tracing::trace!("handle close requested (awaited)");
        self.inner.raw.request_close();
        Some(promise)
    }

    /// Loop-side entry invoked by the native close callback.
    ///
    /// Resolves the close promise if one was requested (discarded safely
    /// otherwise), runs the payload's teardown, then releases the payload.
    /// After this returns the handle is `Closed` and must not be used.
    pub fn close_complete(&self) {
        let emitter = self.inner.close_cb.lock().take();
        let data = self.inner.data.lock().take();
        if let Some(emitter) = emitter {
            emitter.resolve(&());
            emitter.finalize();
        }
        if let Some(mut data) = data {
            data.on_close();
        }
        #[cfg(feature = "tracing-integration")]
        tracing::trace!("handle closed, payload released");
    }

    /// Ties a callback's failure channel to this handle's lifecycle: a
    /// handler raising the [`Error::CloseHandle`] sentinel closes the
    /// handle, and the sentinel is consumed. Other failures pass on
    /// unconsumed.
    #[must_use]
    pub fn watch<P: 'static>(&self, callback: Callback<P>) -> Callback<P> {
        let handle = self.clone();
        callback.except(move |failure| {
            if matches!(failure, Error::CloseHandle) {
                handle.close_detached();
                true
            } else {
                false
            }
        })
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallbackProxy;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct CountingRaw {
        closes: AtomicUsize,
    }

    impl RawHandle for CountingRaw {
        fn request_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoopData;
    impl HandleData for NoopData {}

    fn counting_handle() -> (Handle, Arc<CountingRaw>) {
        let raw = Arc::new(CountingRaw {
            closes: AtomicUsize::new(0),
        });
        let handle = Handle::new(raw.clone(), Box::new(NoopData));
        (handle, raw)
    }

    #[test]
    fn sequential_double_close_invokes_native_once() {
        let (handle, raw) = counting_handle();
        handle.close_detached();
        handle.close_detached();
        assert_eq!(raw.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_close_invokes_native_once() {
        let (handle, raw) = counting_handle();
        let mut racers = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            racers.push(thread::spawn(move || handle.close_detached()));
        }
        for racer in racers {
            racer.join().unwrap();
        }
        assert_eq!(raw.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn awaited_close_loses_race_after_detached_close() {
        let (handle, raw) = counting_handle();
        handle.close_detached();
        assert!(handle.close().is_none());
        assert_eq!(raw.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_completion_resolves_promise_and_releases_payload() {
        struct TrackingData(Arc<AtomicUsize>);
        impl HandleData for TrackingData {
            fn on_close(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let teardowns = Arc::new(AtomicUsize::new(0));
        let raw = Arc::new(CountingRaw {
            closes: AtomicUsize::new(0),
        });
        let handle = Handle::new(raw, Box::new(TrackingData(teardowns.clone())));

        let resolved = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&resolved);
        let _promise = handle.close().unwrap().then(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        handle.close_complete();
        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_close_completion_discards_event() {
        let (handle, _raw) = counting_handle();
        handle.close_detached();
        // No one is waiting; the completion must still be safe.
        handle.close_complete();
    }

    #[test]
    fn guard_rejects_once_closing() {
        let (handle, _raw) = counting_handle();
        assert!(handle.guard_active().is_ok());
        handle.close_detached();
        assert!(matches!(handle.guard_active(), Err(Error::HandleClosed)));
    }

    #[test]
    fn watched_callback_sentinel_closes_handle() {
        let (handle, raw) = counting_handle();
        let callback = handle.watch(Callback::<()>::new());
        let emitter = callback.emitter();

        emitter.raise(&Error::CloseHandle);
        assert_eq!(raw.closes.load(Ordering::SeqCst), 1);
        assert!(handle.is_closing());
    }

    #[test]
    fn watched_callback_passes_other_failures_on() {
        let (handle, raw) = counting_handle();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let callback = handle
            .watch(Callback::<()>::new())
            .except(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
                true
            });

        callback.emitter().raise(&Error::message("unrelated"));
        assert_eq!(raw.closes.load(Ordering::SeqCst), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
