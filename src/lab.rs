//! Deterministic completion loop for testing.
//!
//! The external event loop is out of scope for this crate, but the handle
//! and request lifecycles are written against its contract: exactly one
//! invocation per completed operation, all invocations on one designated
//! thread, FIFO delivery. `LabLoop` implements that contract in-process so
//! lifecycle code can be exercised without an OS event loop:
//!
//! - [`defer`](LabLoop::defer) enqueues a completion from the loop thread
//! - [`poster`](LabLoop::poster) hands out a cloneable, `Send` handle that
//!   enqueues completions from any other thread
//! - [`register`](LabLoop::register) arms a repeating source that
//!   [`fire`](LabLoop::fire) delivers through, until deregistered
//! - [`run_until_idle`](LabLoop::run_until_idle) drains everything in FIFO
//!   order on the calling thread
//!
//! The loop is deliberately not `Send`: whichever thread runs it is the
//! designated loop thread.
//!
//! # Example
//!
//! ```
//! use upshot::lab::{LabConfig, LabLoop};
//!
//! let lab = LabLoop::new(LabConfig::default().max_steps(100));
//! lab.defer(|| println!("first completion"));
//! lab.defer(|| println!("second completion"));
//! assert_eq!(lab.run_until_idle(), 2);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use slab::Slab;

type LoopFn = Box<dyn FnOnce()>;
type PostedFn = Box<dyn FnOnce() + Send>;
type SourceFn = Rc<RefCell<Box<dyn FnMut()>>>;

enum LabTask {
    Call(LoopFn),
    Fire(usize),
}

/// Configuration for a [`LabLoop`].
#[derive(Debug, Clone, Copy)]
pub struct LabConfig {
    max_steps: usize,
}

impl LabConfig {
    /// Caps the number of completions one `run_until_idle` may deliver;
    /// exceeding it panics, catching runaway feedback loops in tests.
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self { max_steps: 10_000 }
    }
}

/// Key of a registered repeating source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(usize);

/// Cloneable cross-thread handle that enqueues completions into the loop.
#[derive(Clone)]
pub struct LabPoster {
    inbox: Arc<SegQueue<PostedFn>>,
}

impl LabPoster {
    /// Enqueues `completion` for delivery on the loop thread. The loop
    /// picks up posted completions after its locally deferred ones.
    pub fn post(&self, completion: impl FnOnce() + Send + 'static) {
        self.inbox.push(Box::new(completion));
    }
}

impl fmt::Debug for LabPoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabPoster")
            .field("pending", &self.inbox.len())
            .finish()
    }
}

/// Deterministic single-threaded completion loop.
pub struct LabLoop {
    config: LabConfig,
    tasks: RefCell<VecDeque<LabTask>>,
    sources: RefCell<Slab<SourceFn>>,
    inbox: Arc<SegQueue<PostedFn>>,
}

impl LabLoop {
    /// Creates an idle loop.
    #[must_use]
    pub fn new(config: LabConfig) -> Self {
        Self {
            config,
            tasks: RefCell::new(VecDeque::new()),
            sources: RefCell::new(Slab::new()),
            inbox: Arc::new(SegQueue::new()),
        }
    }

    /// Enqueues a one-shot completion from the loop thread.
    pub fn defer(&self, completion: impl FnOnce() + 'static) {
        self.tasks
            .borrow_mut()
            .push_back(LabTask::Call(Box::new(completion)));
    }

    /// Hands out a cross-thread posting handle.
    #[must_use]
    pub fn poster(&self) -> LabPoster {
        LabPoster {
            inbox: Arc::clone(&self.inbox),
        }
    }

    /// Arms a repeating source; each [`fire`](Self::fire) delivers one
    /// invocation of `source` in queue order.
    pub fn register(&self, source: impl FnMut() + 'static) -> SourceKey {
        let boxed: Box<dyn FnMut()> = Box::new(source);
        let key = self.sources.borrow_mut().insert(Rc::new(RefCell::new(boxed)));
        SourceKey(key)
    }

    /// Disarms a source. Completions already queued for it are discarded at
    /// delivery time, mirroring a native loop dropping events for a closed
    /// resource.
    pub fn deregister(&self, key: SourceKey) {
        let mut sources = self.sources.borrow_mut();
        if sources.contains(key.0) {
            sources.remove(key.0);
        }
    }

    /// Queues one completion for a registered source.
    pub fn fire(&self, key: SourceKey) {
        self.tasks.borrow_mut().push_back(LabTask::Fire(key.0));
    }

    /// Delivers queued completions in FIFO order until none remain, then
    /// drains the cross-thread inbox the same way. Returns the number of
    /// completions delivered. Panics when the configured step budget is
    /// exceeded.
    pub fn run_until_idle(&self) -> usize {
        let mut steps = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let task = match task {
                Some(task) => task,
                None => match self.inbox.pop() {
                    Some(posted) => LabTask::Call(posted),
                    None => break,
                },
            };
            steps += 1;
            assert!(
                steps <= self.config.max_steps,
                "lab loop exceeded its step budget ({})",
                self.config.max_steps
            );
            match task {
                LabTask::Call(completion) => completion(),
                LabTask::Fire(key) => {
                    // Take the source out of the table borrow before
                    // invoking it so the completion may register or
                    // deregister sources itself.
                    let source = self.sources.borrow().get(key).cloned();
                    if let Some(source) = source {
                        (source.borrow_mut())();
                    }
                }
            }
        }
        steps
    }
}

impl fmt::Debug for LabLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabLoop")
            .field("queued", &self.tasks.borrow().len())
            .field("sources", &self.sources.borrow().len())
            .field("posted", &self.inbox.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn deferred_completions_run_in_fifo_order() {
        let lab = LabLoop::new(LabConfig::default());
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..4 {
            let order = Rc::clone(&order);
            lab.defer(move || order.borrow_mut().push(n));
        }
        assert_eq!(lab.run_until_idle(), 4);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn posted_completions_arrive_after_local_ones() {
        let lab = LabLoop::new(LabConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        let poster = lab.poster();
        let o = Arc::clone(&order);
        let remote = thread::spawn(move || {
            o.lock().unwrap().push("posted");
        });
        remote.join().unwrap();
        let o = Arc::clone(&order);
        poster.post(move || o.lock().unwrap().push("delivered"));

        let o = Arc::clone(&order);
        lab.defer(move || o.lock().unwrap().push("local"));

        lab.run_until_idle();
        assert_eq!(*order.lock().unwrap(), vec!["posted", "local", "delivered"]);
    }

    #[test]
    fn fired_source_delivers_once_per_fire() {
        let lab = LabLoop::new(LabConfig::default());
        let ticks = Rc::new(RefCell::new(0));
        let t = Rc::clone(&ticks);
        let key = lab.register(move || *t.borrow_mut() += 1);

        lab.fire(key);
        lab.fire(key);
        lab.run_until_idle();
        assert_eq!(*ticks.borrow(), 2);
    }

    #[test]
    fn deregistered_source_drops_pending_fires() {
        let lab = LabLoop::new(LabConfig::default());
        let ticks = Rc::new(RefCell::new(0));
        let t = Rc::clone(&ticks);
        let key = lab.register(move || *t.borrow_mut() += 1);

        lab.fire(key);
        lab.deregister(key);
        lab.run_until_idle();
        assert_eq!(*ticks.borrow(), 0);
    }

    #[test]
    fn completions_may_enqueue_more_completions() {
        let lab = Rc::new(LabLoop::new(LabConfig::default().max_steps(16)));
        let depth = Rc::new(RefCell::new(0));

        fn chain(lab: &Rc<LabLoop>, depth: &Rc<RefCell<i32>>, remaining: i32) {
            if remaining == 0 {
                return;
            }
            let lab2 = Rc::clone(lab);
            let depth2 = Rc::clone(depth);
            lab.defer(move || {
                *depth2.borrow_mut() += 1;
                chain(&lab2, &depth2, remaining - 1);
            });
        }

        chain(&lab, &depth, 5);
        assert_eq!(lab.run_until_idle(), 5);
        assert_eq!(*depth.borrow(), 5);
    }

    #[test]
    #[should_panic(expected = "step budget")]
    fn runaway_feedback_trips_the_budget() {
        let lab = Rc::new(LabLoop::new(LabConfig::default().max_steps(8)));

        fn forever(lab: &Rc<LabLoop>) {
            let lab2 = Rc::clone(lab);
            lab.defer(move || forever(&lab2));
        }

        forever(&lab);
        lab.run_until_idle();
    }
}
