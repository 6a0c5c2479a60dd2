//! Internal utilities.

use std::fmt;

/// A scope guard that runs a finalizer when dropped.
///
/// Used by the request lifecycle to guarantee the per-operation record is
/// freed on the synchronous-failure path, and available to wrapper layers
/// for native-resource teardown. The finalizer can be disarmed with
/// [`release`](Defer::release) once ownership has transferred elsewhere, or
/// forced early with [`run_now`](Defer::run_now).
///
/// # Example
///
/// ```
/// use upshot::util::Defer;
///
/// let mut cleaned = false;
/// {
///     let _guard = Defer::new(|| cleaned = true);
/// }
/// # let _ = cleaned;
/// ```
pub struct Defer<F: FnOnce()> {
    finalizer: Option<F>,
}

impl<F: FnOnce()> Defer<F> {
    /// Arms a guard that runs `finalizer` on drop.
    #[must_use]
    pub fn new(finalizer: F) -> Self {
        Self {
            finalizer: Some(finalizer),
        }
    }

    /// Disarms the guard without running the finalizer.
    pub fn release(&mut self) {
        self.finalizer = None;
    }

    /// Runs the finalizer immediately and disarms the guard.
    pub fn run_now(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer();
        }
    }
}

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer();
        }
    }
}

impl<F: FnOnce()> fmt::Debug for Defer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defer")
            .field("armed", &self.finalizer.is_some())
            .finish()
    }
}
