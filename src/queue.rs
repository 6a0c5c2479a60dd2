//! Thread-safe closeable FIFO bridging push-style emission to pull-style
//! iteration.
//!
//! The queue is the one blocking primitive in this crate and the one place
//! emissions are buffered. Producers on any thread [`push`](Queue::push)
//! while consumers on any other thread [`pop`](Queue::pop) or iterate;
//! [`close`](Queue::close) wakes everyone with a well-defined "no more
//! data" result while the remaining backlog stays poppable until drained.
//!
//! ```text
//!                 ┌─────────────────────────────────────┐
//!                 │                Open                 │
//!   push ──────►  │  blocks at capacity                 │ ──── close()
//!   pop  ──────►  │  blocks when empty                  │       │
//!                 └─────────────────────────────────────┘       ▼
//!                 ┌─────────────────────────────────────┐
//!                 │               Closed                │
//!   push ──────►  │  false, nothing inserted            │
//!   pop  ──────►  │  Some(head) until drained, then None│
//!                 └─────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    /// Capacity bound; zero or negative means unbounded.
    limit: i64,
    closed: bool,
}

impl<T> QueueState<T> {
    fn writable(&self) -> bool {
        self.limit <= 0 || (self.items.len() as i64) < self.limit
    }

    fn readable(&self) -> bool {
        !self.items.is_empty()
    }
}

struct QueueCore<T> {
    state: Mutex<QueueState<T>>,
    /// Notifies consumers when an item arrives or the queue closes.
    readable: Condvar,
    /// Notifies producers when a slot frees up, the bound loosens, or the
    /// queue closes.
    writable: Condvar,
}

/// A thread-safe, closeable, capacity-limited FIFO.
///
/// Cheap to clone; all clones share the same backlog. Items come out in
/// push order, with no prioritization. All operations are safe to call
/// concurrently from any number of threads.
///
/// # Example
///
/// ```
/// use upshot::Queue;
///
/// let queue = Queue::new();
/// queue.push(1);
/// queue.push(2);
/// queue.close();
///
/// let drained: Vec<i32> = queue.into_iter().collect();
/// assert_eq!(drained, vec![1, 2]);
/// ```
pub struct Queue<T> {
    core: Arc<QueueCore<T>>,
}

impl<T> Queue<T> {
    /// Creates an open, unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Arc::new(QueueCore {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    limit: -1,
                    closed: false,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
        }
    }

    /// Appends `value`, blocking while the queue is at capacity and open.
    ///
    /// Returns `false` without inserting if the queue is already closed, or
    /// if it closed while this call was blocked waiting for capacity.
    pub fn push(&self, value: T) -> bool {
        let mut state = self.core.state.lock();
        if state.closed {
            return false;
        }
        while !state.writable() {
            self.core.writable.wait(&mut state);
            if state.closed {
                return false;
            }
        }
        state.items.push_back(value);
        self.core.readable.notify_one();
        true
    }

    /// Removes and returns the head, blocking while the queue is empty and
    /// open. Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.core.state.lock();
        loop {
            if state.readable() {
                break;
            }
            if state.closed {
                return None;
            }
            self.core.readable.wait(&mut state);
        }
        let value = state.items.pop_front();
        if state.writable() {
            self.core.writable.notify_one();
        }
        value
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    ///
    /// No further pushes succeed; the existing backlog remains poppable
    /// until drained.
    pub fn close(&self) {
        let mut state = self.core.state.lock();
        state.closed = true;
        #[cfg(feature = "tracing-integration")]
        tracing::trace!(backlog = state.items.len(), "queue closed");
        self.core.writable.notify_all();
        self.core.readable.notify_all();
    }

    /// Adjusts the capacity bound. Zero or negative removes the bound and
    /// wakes all blocked producers; raising a positive bound wakes blocked
    /// producers in proportion to the increase; tightening never blocks and
    /// never drops queued items; the backlog just drains below the new
    /// bound before producers proceed.
    pub fn limit(&self, bound: i64) -> &Self {
        let mut state = self.core.state.lock();
        let previous = state.limit;
        state.limit = bound;
        if bound <= 0 {
            if previous > 0 {
                self.core.writable.notify_all();
            }
        } else if previous > 0 && bound > previous {
            if bound - previous == 1 {
                self.core.writable.notify_one();
            } else {
                self.core.writable.notify_all();
            }
        }
        self
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.state.lock().items.len()
    }

    /// Whether the backlog is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.state.lock().items.is_empty()
    }

    /// Whether the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.state.lock().closed
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Queue")
            .field("len", &state.items.len())
            .field("limit", &state.limit)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Single-pass blocking cursor over a queue.
///
/// Each `next` pops the head, blocking until data arrives, and ends exactly
/// when [`Queue::pop`] reports no more values. The cursor is destructive:
/// items it yields are gone from the shared backlog.
pub struct QueueIter<T> {
    queue: Queue<T>,
}

impl<T> Iterator for QueueIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.pop()
    }
}

impl<T> fmt::Debug for QueueIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueIter").finish_non_exhaustive()
    }
}

impl<T> IntoIterator for Queue<T> {
    type Item = T;
    type IntoIter = QueueIter<T>;

    fn into_iter(self) -> QueueIter<T> {
        QueueIter { queue: self }
    }
}
