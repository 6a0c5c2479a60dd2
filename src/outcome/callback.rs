//! Repeating outcomes: the [`Callback`] facade and its producer side.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::queue::Queue;

use super::core::OutcomeCore;

/// Producer-side abstraction over a repeating outcome.
///
/// A plain [`CallbackEmitter`] pushes straight into its core; a
/// [`CallbackCast`](super::CallbackCast) transforms the payload on the way
/// through. Wrapper layers hold a `dyn CallbackProxy<P>` so either can be
/// substituted transparently.
pub trait CallbackProxy<P>: Send + Sync {
    /// Delivers one value to the outcome's value chain.
    fn emit(&self, value: &P);

    /// Delivers a failure to the outcome's failure chain.
    fn raise(&self, failure: &Error);

    /// Marks the outcome complete; the finally chain runs exactly once.
    fn finalize(&self);

    /// Delivers an owned value, the call-through convenience form.
    fn apply(&self, value: P)
    where
        P: Sized,
    {
        self.emit(&value);
    }
}

/// Consumer-side facade of a repeating outcome.
///
/// Register handlers before the underlying operation is armed. Registration
/// composes (every call adds to the chain rather than replacing it) and
/// returns the facade for fluent chaining. Cloning is cheap and yields
/// another facade over the same shared core.
///
/// # Example
///
/// ```
/// use upshot::{Callback, CallbackProxy};
///
/// let callback = Callback::<(i32, i32)>::new()
///     .call(|&(a, b)| println!("{a} {b}"))
///     .watch(|failure| eprintln!("saw: {failure}"));
/// let emitter = callback.emitter();
/// emitter.emit(&(3, 4));
/// ```
pub struct Callback<P> {
    core: Arc<OutcomeCore<P>>,
}

impl<P: 'static> Callback<P> {
    /// Creates a fresh outcome with empty handler chains.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(OutcomeCore::new()),
        }
    }

    pub(crate) fn from_core(core: Arc<OutcomeCore<P>>) -> Self {
        Self { core }
    }

    /// Registers a value handler, invoked after all previously registered
    /// value handlers on every emission.
    #[must_use]
    pub fn call(self, f: impl Fn(&P) + Send + Sync + 'static) -> Self {
        self.core.push_value(Arc::new(move |value: &P| {
            f(value);
            Ok(())
        }));
        self
    }

    /// Registers a fallible value handler; its `Err` is redirected into
    /// this outcome's own failure channel.
    #[must_use]
    pub fn try_call(self, f: impl Fn(&P) -> Result<(), Error> + Send + Sync + 'static) -> Self {
        self.core.push_value(Arc::new(f));
        self
    }

    /// Registers a consuming failure handler. Returning `true` reports the
    /// failure handled and stops the chain; returning `false` declines,
    /// letting later handlers (and ultimately the default reporter) observe
    /// the same failure.
    #[must_use]
    pub fn except(self, f: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.core
            .push_except(Arc::new(move |failure: &Error| Ok(f(failure))));
        self
    }

    /// Registers a fallible failure handler. `Ok(true)` consumes, `Ok(false)`
    /// declines, and `Err` means the handler itself failed while processing:
    /// the chain is retried once with the handler's own failure, then the
    /// default reporter takes over.
    #[must_use]
    pub fn try_except(
        self,
        f: impl Fn(&Error) -> Result<bool, Error> + Send + Sync + 'static,
    ) -> Self {
        self.core.push_except(Arc::new(f));
        self
    }

    /// Registers a watching failure handler: it observes every failure that
    /// reaches it and never consumes any.
    #[must_use]
    pub fn watch(self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.core.push_except(Arc::new(move |failure: &Error| {
            f(failure);
            Ok(false)
        }));
        self
    }

    /// Registers a completion handler, run exactly once when the outcome
    /// finalizes (after previously registered completion handlers).
    #[must_use]
    pub fn finally(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.core.push_finally(Arc::new(f));
        self
    }

    /// Clears the value chain. This is the explicit sentinel; plain
    /// registration never replaces existing handlers.
    #[must_use]
    pub fn clear_call(self) -> Self {
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

    /// Producer side of this outcome.
    #[must_use]
    pub fn emitter(&self) -> CallbackEmitter<P> {
        CallbackEmitter {
            core: Arc::clone(&self.core),
        }
    }
}

impl<P: Clone + Send + 'static> Callback<P> {
    /// Converts push-style emission into pull-style iteration: every emitted
    /// value is pushed into the returned queue, and finalizing the outcome
    /// closes it. The queue is the one place emissions are buffered, so a
    /// worker thread can drain at its own pace.
    #[must_use]
    pub fn into_queue(self) -> Queue<P> {
        let queue = Queue::new();
        let pusher = queue.clone();
        let closer = queue.clone();
        let _ = self
            .call(move |value: &P| {
                let _ = pusher.push(value.clone());
            })
            .finally(move || closer.close());
        queue
    }
}

impl<P: 'static> Default for Callback<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<P> fmt::Debug for Callback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// Producer side of a repeating outcome.
///
/// Cheap to clone; all clones feed the same shared core. Create one from an
/// existing facade with [`Callback::emitter`], or start from the producer
/// side with [`CallbackEmitter::new`] and hand out
/// [`callback`](CallbackEmitter::callback) facades.
pub struct CallbackEmitter<P> {
    core: Arc<OutcomeCore<P>>,
}

impl<P: 'static> CallbackEmitter<P> {
    /// Creates an emitter over a fresh core.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(OutcomeCore::new()),
        }
    }

    /// The consumer-side facade over the same core.
    #[must_use]
    pub fn callback(&self) -> Callback<P> {
        Callback::from_core(Arc::clone(&self.core))
    }

    /// Raises a native status failure, the common producer shorthand.
    pub fn raise_status(&self, code: crate::error::StatusCode) {
        self.raise(&Error::from(code));
    }
}

impl<P: 'static> Default for CallbackEmitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> CallbackProxy<P> for CallbackEmitter<P> {
    fn emit(&self, value: &P) {
        self.core.emit(value);
    }

    fn raise(&self, failure: &Error) {
        self.core.raise(failure);
    }

    fn finalize(&self) {
        self.core.finalize();
    }
}

impl<P> Clone for CallbackEmitter<P> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<P> fmt::Debug for CallbackEmitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEmitter").finish_non_exhaustive()
    }
}
