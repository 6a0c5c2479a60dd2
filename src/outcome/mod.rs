//! Outcome primitives: chainable callbacks, promises, and cast adapters.
//!
//! An *outcome* is one logical asynchronous result channel, backed by a
//! shared core holding three handler chains (value, failure, finally). Two
//! variants exist:
//!
//! - [`Callback<P>`]: repeating, the producer may emit any number of values
//! - [`Promise<T>`]: single-shot, the producer settles at most once
//!
//! Each variant splits into a consumer-side facade (register handlers, cheap
//! to clone) and a producer-side emitter (push values, failures,
//! completion). The producer side is abstracted by the [`CallbackProxy`] /
//! [`PromiseProxy`] traits so a cast adapter ([`CallbackCast`],
//! [`PromiseCast`]) can stand in for a plain emitter, transforming payloads
//! on the way through and translating transform failures into the target's
//! failure channel.
//!
//! Handler chains compose: each registration wraps the previous one, so
//! independent pieces of code can attach observers to the same outcome
//! without knowledge of each other. Handlers registered after an emission do
//! not retroactively see it; nothing is buffered here. The one buffering
//! escape hatch is [`Callback::into_queue`], which bridges emissions into a
//! blocking [`Queue`](crate::queue::Queue) for consumption from another
//! thread.

mod callback;
mod cast;
mod core;
mod promise;

pub use callback::{Callback, CallbackEmitter, CallbackProxy};
pub use cast::{CallbackCast, PromiseCast};
pub use promise::{Promise, PromiseEmitter, PromiseFuture, PromiseProxy};
