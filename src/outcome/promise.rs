//! Single-shot outcomes: the [`Promise`] facade and its producer side.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::error::{Error, StatusCode};

use super::core::OutcomeCore;

/// Producer-side abstraction over a single-shot outcome.
///
/// A plain [`PromiseEmitter`] settles its own core; a
/// [`PromiseCast`](super::PromiseCast) transforms the payload on the way
/// through. The request lifecycle holds a `dyn PromiseProxy<A>` so either
/// can complete a native operation.
pub trait PromiseProxy<T>: Send + Sync {
    /// Settles the outcome with a value. At most one settlement takes
    /// effect; later calls are discarded.
    fn resolve(&self, value: &T);

    /// Settles the outcome with a failure. Subject to the same
    /// at-most-once rule as `resolve`.
    fn reject(&self, failure: &Error);

    /// Marks the outcome complete; the finally chain runs exactly once.
    fn finalize(&self);
}

/// Consumer-side facade of a single-shot outcome.
///
/// Identical registration model to [`Callback`](super::Callback), with
/// composing chains and fluent returns, but the
/// producer settles at most once. A `Promise` over a `Clone` payload is
/// also a future: `promise.await` yields `Ok(value)` on resolve, `Err` on
/// reject, and `Err(ECANCELED)` if the outcome finalizes without settling.
///
/// # Example
///
/// ```
/// use upshot::{Promise, PromiseProxy};
///
/// let promise = Promise::<u64>::new()
///     .then(|n| println!("finished: {n}"))
///     .watch(|failure| eprintln!("failed: {failure}"));
/// let emitter = promise.emitter();
/// emitter.resolve(&42);
/// emitter.finalize();
/// ```
pub struct Promise<T> {
    core: Arc<OutcomeCore<T>>,
}

impl<T: 'static> Promise<T> {
    /// Creates a fresh unsettled promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(OutcomeCore::new()),
        }
    }

    /// Registers a value handler, invoked after all previously registered
    /// value handlers when the promise resolves.
    #[must_use]
    pub fn then(self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.core.push_value(Arc::new(move |value: &T| {
            f(value);
            Ok(())
        }));
        self
    }

    /// Registers a fallible value handler; its `Err` is redirected into
    /// this promise's own failure channel.
    #[must_use]
    pub fn try_then(self, f: impl Fn(&T) -> Result<(), Error> + Send + Sync + 'static) -> Self {
        self.core.push_value(Arc::new(f));
        self
    }

    /// Registers a consuming failure handler; `true` stops the chain.
    #[must_use]
    pub fn except(self, f: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.core
            .push_except(Arc::new(move |failure: &Error| Ok(f(failure))));
        self
    }

    /// Registers a fallible failure handler; an `Err` gets the bounded
    /// retry-then-report treatment instead of recursing.
    #[must_use]
    pub fn try_except(
        self,
        f: impl Fn(&Error) -> Result<bool, Error> + Send + Sync + 'static,
    ) -> Self {
        self.core.push_except(Arc::new(f));
        self
    }

    /// Registers a watching failure handler that never consumes.
    #[must_use]
    pub fn watch(self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.core.push_except(Arc::new(move |failure: &Error| {
            f(failure);
            Ok(false)
        }));
        self
    }

    /// Registers a completion handler, run exactly once at finalize.
    #[must_use]
    pub fn finally(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.core.push_finally(Arc::new(f));
        self
    }

    /// Clears the value chain (the explicit sentinel).
    #[must_use]
    pub fn clear_then(self) -> Self {
        self.core.clear_value();
        self
    }

    /// Clears the failure chain.
    #[must_use]
    pub fn clear_except(self) -> Self {
        self.core.clear_except();
        self
    }

    /// Clears the finally chain.
    #[must_use]
    pub fn clear_finally(self) -> Self {
        self.core.clear_finally();
        self
    }

    /// Producer side of this promise.
    #[must_use]
    pub fn emitter(&self) -> PromiseEmitter<T> {
        PromiseEmitter {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Producer side of a single-shot outcome.
///
/// The settle gate lives in the shared core, so clones of one emitter still
/// settle at most once between them. A second `resolve` or `reject` is a
/// documented no-op: the loop's exactly-once delivery contract makes a
/// double settlement a producer bug, and discarding it keeps the producer
/// surface infallible.
pub struct PromiseEmitter<T> {
    core: Arc<OutcomeCore<T>>,
}

impl<T: 'static> PromiseEmitter<T> {
    /// Creates an emitter over a fresh core.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(OutcomeCore::new()),
        }
    }

    /// The consumer-side facade over the same core.
    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        Promise {
            core: Arc::clone(&self.core),
        }
    }

    /// Rejects with a native status failure, the common producer shorthand.
    pub fn reject_status(&self, code: StatusCode) {
        self.reject(&Error::from(code));
    }
}

impl<T: 'static> Default for PromiseEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> PromiseProxy<T> for PromiseEmitter<T> {
    fn resolve(&self, value: &T) {
        if !self.core.try_settle() {
            return;
        }
        self.core.emit(value);
    }

    fn reject(&self, failure: &Error) {
        if !self.core.try_settle() {
            return;
        }
        self.core.raise(failure);
    }

    fn finalize(&self) {
        self.core.finalize();
    }
}

impl<T> Clone for PromiseEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for PromiseEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseEmitter").finish_non_exhaustive()
    }
}

struct FutureState<T> {
    outcome: Option<Result<T, Error>>,
    waker: Option<Waker>,
    done: bool,
}

struct FutureShared<T> {
    state: Mutex<FutureState<T>>,
}

impl<T> FutureShared<T> {
    fn store(&self, outcome: Result<T, Error>) {
        let mut state = self.state.lock();
        if state.outcome.is_none() {
            state.outcome = Some(outcome);
        }
        let waker = state.waker.take();
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.done = true;
        let waker = state.waker.take();
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Future view of a [`Promise`], produced by `IntoFuture`.
///
/// Registers a terminal consumer on the promise: values and failures that
/// reach it are considered handled. The value is buffered in the future's
/// own slot, not in the outcome core.
pub struct PromiseFuture<T> {
    shared: Arc<FutureShared<T>>,
}

impl<T> Future for PromiseFuture<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(outcome) = state.outcome.take() {
            return Poll::Ready(outcome);
        }
        if state.done {
            // Finalized without settling: the silent-cancellation path.
            return Poll::Ready(Err(Error::status(StatusCode::ECANCELED)));
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> fmt::Debug for PromiseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseFuture").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Error>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> PromiseFuture<T> {
        let shared = Arc::new(FutureShared {
            state: Mutex::new(FutureState {
                outcome: None,
                waker: None,
                done: false,
            }),
        });
        let on_resolve = Arc::clone(&shared);
        let on_reject = Arc::clone(&shared);
        let on_finally = Arc::clone(&shared);
        let _registered = self
            .then(move |value: &T| on_resolve.store(Ok(value.clone())))
            .except(move |failure: &Error| {
                on_reject.store(Err(failure.clone()));
                true
            })
            .finally(move || on_finally.finish());
        PromiseFuture { shared }
    }
}
