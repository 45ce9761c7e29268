//! Reactive Primitives
//!
//! This module implements the reactive system: signals, effects and memos.
//! These primitives drive re-rendering in [`crate::render`].
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect is running, the effect subscribes to it. When the
//! signal's value changes, every subscribed effect re-runs before the write
//! returns.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. The render entry point wraps each component in one.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result and only notifies its
//! readers when the result changes.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded: handles are `Rc`-based and the
//! active-runner slot is thread-local. Signal writes propagate synchronously
//! and depth-first; there is no scheduling queue.

mod context;
mod effect;
mod memo;
mod signal;
mod subscriber;

pub use context::{untrack, ReactiveContext};
pub use effect::{Cleanup, Effect, EffectOutput};
pub use memo::Memo;
pub use signal::Signal;
pub use subscriber::{Subscriber, SubscriberId};
