//! Upshot: composable outcome primitives for completion-callback event loops.
//!
//! # Overview
//!
//! Upshot turns one-shot or repeating C-style completion callbacks, the kind
//! delivered by a single-threaded event loop, into chainable result objects.
//! A producer pushes values, failures, and completion through an emitter; a
//! consumer registers handler chains against the same shared core; adapters
//! transform payloads between the two without either side knowing. A blocking
//! queue bridges push-style emission into pull-style iteration for worker
//! threads, and a pair of lifecycle state machines (close-once handles,
//! complete-and-free requests) anchors every outcome to the lifetime of the
//! underlying native operation.
//!
//! # Core Guarantees
//!
//! - **Exactly-once finalize**: completion handlers run at most once, even
//!   under concurrent finalize requests, and always run eventually (the core
//!   finalizes itself on drop if the producer forgets)
//! - **No silent failures**: a failure that no handler consumes reaches the
//!   default reporter on the process error stream
//! - **Failure-safe chains**: a value handler returning `Err` redirects into
//!   the same outcome's failure channel; a transform failing inside an
//!   adapter redirects into the *target's* failure channel
//! - **Close-once handles**: concurrent close requests invoke the native
//!   close primitive exactly once
//! - **Leak-free requests**: the per-operation record is freed on every path,
//!   including synchronous failure of the issuing call
//!
//! # Module Structure
//!
//! - [`outcome`]: repeating ([`Callback`]) and single-shot ([`Promise`])
//!   outcomes, their emitters, proxy traits, and cast adapters
//! - [`queue`]: thread-safe closeable FIFO bridging emission to iteration
//! - [`handle`]: close-once lifecycle for long-lived resources
//! - [`request`]: attach/detach/free lifecycle for one-shot operations
//! - [`lab`]: deterministic completion loop for tests
//! - [`error`](mod@error): failure taxonomy and the default reporter
//! - [`util`]: deferred-execution guard
//!
//! # Scope
//!
//! Upshot does not schedule anything. The event loop that invokes completion
//! callbacks is an external collaborator: it must deliver exactly one
//! invocation per completed operation, on one designated thread, and keep
//! native memory valid until the close/completion callback has run. In
//! return, upshot never frees a handle's or request's data before that
//! callback fires, and detaches its data from the native object at the top of
//! the callback so the native object can be reused immediately.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod handle;
pub mod lab;
pub mod outcome;
pub mod queue;
pub mod request;
pub mod util;

pub use error::{Error, Result, StatusCode};
pub use handle::{Handle, HandleData, RawHandle};
pub use outcome::{
    Callback, CallbackCast, CallbackEmitter, CallbackProxy, Promise, PromiseCast, PromiseEmitter,
    PromiseProxy,
};
pub use queue::Queue;
pub use request::{RequestRecord, RequestSlot, complete, issue};
