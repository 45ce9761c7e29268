//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the effect joins the
//!    signal's subscriber set and records the join on its side.
//!
//! 2. When a signal is written with a value different from the current one,
//!    every subscriber is re-run synchronously, in the order it joined.
//!
//! 3. Writing an equal value is a no-op.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a `RefCell`
//! - An insertion-ordered map of weak subscriber links

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{SharedSubscribers, Subscriber};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal clones the handle; all clones share one cell.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (re-runs subscribed effects)
/// count.set(5);
/// assert_eq!(count.get_untracked(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: RefCell<T>,

    /// Effects that read this signal during their latest run.
    subscribers: SharedSubscribers,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_signal_id(),
                value: RefCell::new(value),
                subscribers: Rc::new(RefCell::new(IndexMap::new())),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Borrow the current value, registering a dependency if an effect is
    /// running.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner.subscribers);
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Re-run every current subscriber, in join order.
    ///
    /// The subscriber list is snapshotted first, so effects that join or
    /// leave while being notified do not change this pass.
    fn notify_subscribers(&self) {
        let snapshot: Vec<Rc<dyn Subscriber>> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers.values().filter_map(|weak| weak.upgrade()).collect()
        };

        trace!(signal = self.inner.id, subscribers = snapshot.len(), "notifying");
        for subscriber in snapshot {
            subscriber.notify();
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called while an effect is running, this also registers the effect
    /// as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify subscribers.
    ///
    /// Does nothing if `value` equals the current value.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        self.notify_subscribers();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with_untracked(f);
        self.set(next);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with_untracked(|value| {
            f.debug_struct("Signal")
                .field("id", &self.id())
                .field("value", value)
                .field("subscriber_count", &self.subscriber_count())
                .finish()
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn read_outside_effect_is_not_tracked() {
        let signal = Signal::new("idle".to_string());
        assert_eq!(signal.get(), "idle");
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let signal = Signal::new(7);
        let runs = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            signal_clone.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        signal.set(7);
        assert_eq!(runs.get(), 1);

        signal.set(8);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Signal::new(1);
        let runs = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            signal_clone.get_untracked();
            runs_clone.set(runs_clone.get() + 1);
        });

        assert_eq!(signal.subscriber_count(), 0);
        signal.set(2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn subscribers_run_in_join_order() {
        let signal = Signal::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let effects: Vec<Effect> = (0..3)
            .map(|n| {
                let signal = signal.clone();
                let order = order.clone();
                Effect::new(move || {
                    if signal.get() > 0 {
                        order.borrow_mut().push(n);
                    }
                })
            })
            .collect();

        signal.set(1);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(effects);
    }

    #[test]
    fn dropped_effects_are_pruned_on_write() {
        let signal = Signal::new(0);
        {
            let signal_clone = signal.clone();
            let _effect = Effect::new(move || {
                signal_clone.get();
            });
            assert_eq!(signal.subscriber_count(), 1);
        }

        signal.set(1);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
