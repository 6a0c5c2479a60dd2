//! The shared outcome core.
//!
//! One structure serves both outcome variants. The repeating callback facade
//! ignores the settle flag; the single-shot promise facade gates its
//! `resolve`/`reject` through [`OutcomeCore::try_settle`].
//!
//! Handler chains are copy-on-compose: each registration allocates a new
//! composed closure capturing the previous one, and dispatch clones the
//! composed handler out of a briefly-held lock before invoking it. Dispatch
//! itself therefore runs lock-free, and a handler may register further
//! handlers on the same outcome without deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, report_unhandled};

/// Composed value-handler chain. `Err` escaping the chain is redirected
/// into the failure channel.
pub(crate) type ValueHandler<P> = Arc<dyn Fn(&P) -> Result<(), Error> + Send + Sync>;

/// Composed failure-handler chain. `Ok(true)` means handled (stop),
/// `Ok(false)` means watched (decline), `Err` means the handler itself
/// failed while processing the failure.
pub(crate) type ExceptHandler = Arc<dyn Fn(&Error) -> Result<bool, Error> + Send + Sync>;

/// Composed finally-handler chain.
pub(crate) type FinallyHandler = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct OutcomeCore<P> {
    on_value: Mutex<Option<ValueHandler<P>>>,
    on_except: Mutex<Option<ExceptHandler>>,
    on_finally: Mutex<Option<FinallyHandler>>,
    finalized: AtomicBool,
    settled: AtomicBool,
}

impl<P: 'static> OutcomeCore<P> {
    pub(crate) fn new() -> Self {
        Self {
            on_value: Mutex::new(None),
            on_except: Mutex::new(None),
            on_finally: Mutex::new(None),
            finalized: AtomicBool::new(false),
            settled: AtomicBool::new(false),
        }
    }

    /// Runs the value chain with `value`. A chain failure is redirected
    /// into [`raise`](Self::raise); no chain is a no-op.
    pub(crate) fn emit(&self, value: &P) {
        let handler = self.on_value.lock().clone();
        if let Some(handler) = handler {
            if let Err(failure) = handler(value) {
                self.raise(&failure);
            }
        }
    }

    /// Runs the failure chain with `failure`.
    ///
    /// The chain stops at the first handler reporting handled. A failure
    /// that nothing consumed goes to the default reporter. A handler
    /// failing while processing the failure gets one bounded retry of the
    /// chain with its own failure, after which the reporter takes over.
    pub(crate) fn raise(&self, failure: &Error) {
        let handler = self.on_except.lock().clone();
        let Some(handler) = handler else {
            report_unhandled(failure);
            return;
        };
        match handler(failure) {
            Ok(true) => {}
            Ok(false) => report_unhandled(failure),
            Err(second) => match handler(&second) {
                Ok(true) => {}
                Ok(false) => report_unhandled(&second),
                Err(third) => report_unhandled(&third),
            },
        }
    }

    /// Runs the finally chain exactly once across all callers; later calls
    /// return immediately.
    pub(crate) fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        let handler = self.on_finally.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Claims the single settle slot. Returns `true` for exactly one caller;
    /// the single-shot facade discards emissions when this returns `false`.
    pub(crate) fn try_settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }

    /// Appends `f` to the value chain: previously registered handlers run
    /// first, `f` runs last. A failure from an earlier handler skips the
    /// rest of the chain.
    pub(crate) fn push_value(&self, f: ValueHandler<P>) {
        let mut slot = self.on_value.lock();
        *slot = Some(match slot.take() {
            Some(pre) => {
                let composed: ValueHandler<P> = Arc::new(move |value: &P| {
                    pre(value)?;
                    f(value)
                });
                composed
            }
            None => f,
        });
    }

    /// Appends `f` to the failure chain: earlier handlers decide first, and
    /// `f` only observes failures they declined.
    pub(crate) fn push_except(&self, f: ExceptHandler) {
        let mut slot = self.on_except.lock();
        *slot = Some(match slot.take() {
            Some(pre) => {
                let composed: ExceptHandler = Arc::new(move |failure: &Error| {
                    if pre(failure)? {
                        return Ok(true);
                    }
                    f(failure)
                });
                composed
            }
            None => f,
        });
    }

    /// Appends `f` to the finally chain, running after earlier handlers.
    pub(crate) fn push_finally(&self, f: FinallyHandler) {
        let mut slot = self.on_finally.lock();
        *slot = Some(match slot.take() {
            Some(pre) => {
                let composed: FinallyHandler = Arc::new(move || {
                    pre();
                    f();
                });
                composed
            }
            None => f,
        });
    }

    pub(crate) fn clear_value(&self) {
        *self.on_value.lock() = None;
    }

    pub(crate) fn clear_except(&self) {
        *self.on_except.lock() = None;
    }

    pub(crate) fn clear_finally(&self) {
        *self.on_finally.lock() = None;
    }
}

impl<P> Drop for OutcomeCore<P> {
    fn drop(&mut self) {
        // The finally chain must run even if the producer never called
        // finalize. Same exchange as finalize(); no one else can race a
        // drop, but the flag may already be set.
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        let handler = self.on_finally.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}
