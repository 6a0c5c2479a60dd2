//! Cast adapters: payload transformation between outcomes.
//!
//! A cast adapter is the "map" operator of a handler chain. It implements
//! the producer-side proxy trait over a source payload `T` while feeding a
//! target outcome of payload `V`: on emission it runs the wrapper, forwards
//! the transformed value, and turns a wrapper failure into a failure on the
//! *target's* channel; values are never partially forwarded. `raise` and
//! `finalize` pass through uninterpreted.
//!
//! This is the mechanism a wrapper layer uses to narrow a generic
//! completion signature (raw status plus native arguments) down to a
//! domain-specific payload, without the consumer ever seeing the raw shape.

use std::fmt;

use crate::error::Error;

use super::callback::{Callback, CallbackEmitter, CallbackProxy};
use super::promise::{Promise, PromiseEmitter, PromiseProxy};

/// Transforming proxy over a repeating outcome.
///
/// # Example
///
/// ```
/// use upshot::{Callback, CallbackCast, CallbackProxy, Error};
///
/// let target = Callback::<String>::new().call(|s| println!("{s}"));
/// let cast = CallbackCast::new(&target, |n: &i32| {
///     if *n < 0 {
///         return Err(Error::message("negative input"));
///     }
///     Ok(n.to_string())
/// });
/// cast.emit(&7); // target sees "7"
/// cast.emit(&-1); // target's failure channel fires instead
/// ```
pub struct CallbackCast<T, V> {
    emitter: CallbackEmitter<V>,
    wrapper: Box<dyn Fn(&T) -> Result<V, Error> + Send + Sync>,
}

impl<T: 'static, V: 'static> CallbackCast<T, V> {
    /// Adapts `target` behind a fallible wrapper.
    #[must_use]
    pub fn new(
        target: &Callback<V>,
        wrapper: impl Fn(&T) -> Result<V, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            emitter: target.emitter(),
            wrapper: Box::new(wrapper),
        }
    }

    /// Adapts `target` behind an infallible wrapper.
    #[must_use]
    pub fn map(target: &Callback<V>, wrapper: impl Fn(&T) -> V + Send + Sync + 'static) -> Self {
        Self::new(target, move |value: &T| Ok(wrapper(value)))
    }

    /// Builds the adapter together with a fresh target, retrievable via
    /// [`callback`](Self::callback).
    #[must_use]
    pub fn fresh(wrapper: impl Fn(&T) -> Result<V, Error> + Send + Sync + 'static) -> Self {
        Self::new(&Callback::new(), wrapper)
    }

    /// The target facade this adapter feeds.
    #[must_use]
    pub fn callback(&self) -> Callback<V> {
        self.emitter.callback()
    }
}

impl<T: 'static, V: 'static> CallbackProxy<T> for CallbackCast<T, V> {
    fn emit(&self, value: &T) {
        match (self.wrapper)(value) {
            Ok(transformed) => self.emitter.emit(&transformed),
            Err(failure) => self.emitter.raise(&failure),
        }
    }

    fn raise(&self, failure: &Error) {
        self.emitter.raise(failure);
    }

    fn finalize(&self) {
        self.emitter.finalize();
    }
}

impl<T, V> fmt::Debug for CallbackCast<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCast").finish_non_exhaustive()
    }
}

/// Transforming proxy over a single-shot outcome.
///
/// The single-settlement gate lives in the target's core, so a cast in
/// front of a promise does not change the at-most-once behavior.
pub struct PromiseCast<T, V> {
    emitter: PromiseEmitter<V>,
    wrapper: Box<dyn Fn(&T) -> Result<V, Error> + Send + Sync>,
}

impl<T: 'static, V: 'static> PromiseCast<T, V> {
    /// Adapts `target` behind a fallible wrapper.
    #[must_use]
    pub fn new(
        target: &Promise<V>,
        wrapper: impl Fn(&T) -> Result<V, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            emitter: target.emitter(),
            wrapper: Box::new(wrapper),
        }
    }

    /// Adapts `target` behind an infallible wrapper.
    #[must_use]
    pub fn map(target: &Promise<V>, wrapper: impl Fn(&T) -> V + Send + Sync + 'static) -> Self {
        Self::new(target, move |value: &T| Ok(wrapper(value)))
    }

    /// Builds the adapter together with a fresh target, retrievable via
    /// [`promise`](Self::promise).
    #[must_use]
    pub fn fresh(wrapper: impl Fn(&T) -> Result<V, Error> + Send + Sync + 'static) -> Self {
        Self::new(&Promise::new(), wrapper)
    }

    /// The target facade this adapter feeds.
    #[must_use]
    pub fn promise(&self) -> Promise<V> {
        self.emitter.promise()
    }
}

impl<T: 'static, V: 'static> PromiseProxy<T> for PromiseCast<T, V> {
    fn resolve(&self, value: &T) {
        match (self.wrapper)(value) {
            Ok(transformed) => self.emitter.resolve(&transformed),
            Err(failure) => self.emitter.reject(&failure),
        }
    }

    fn reject(&self, failure: &Error) {
        self.emitter.reject(failure);
    }

    fn finalize(&self) {
        self.emitter.finalize();
    }
}

impl<T, V> fmt::Debug for PromiseCast<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseCast").finish_non_exhaustive()
    }
}
