//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Effects are the only subscribers the crate creates itself; memos and
//! render sessions are built on top of them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID is used to track
/// dependencies and avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be notified when one of its dependencies changes.
pub trait Subscriber {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called synchronously by a signal write.
    fn notify(self: Rc<Self>);
}

/// The subscribers of one signal, in the order they joined.
pub(crate) type SubscriberSet = IndexMap<SubscriberId, Weak<dyn Subscriber>>;

/// A subscriber set shared between a signal and the runners that joined it.
pub(crate) type SharedSubscribers = Rc<RefCell<SubscriberSet>>;

/// The dependency sets a single run of a computation joined.
///
/// Only weak links are held so a runner never keeps a signal alive.
#[derive(Default)]
pub(crate) struct Dependencies {
    joined: SmallVec<[Weak<RefCell<SubscriberSet>>; 4]>,
}

impl Dependencies {
    pub(crate) fn record(&mut self, set: &SharedSubscribers) {
        self.joined.push(Rc::downgrade(set));
    }

    /// Remove `id` from every joined set and forget the joins.
    pub(crate) fn detach(&mut self, id: SubscriberId) {
        for set in self.joined.drain(..) {
            if let Some(set) = set.upgrade() {
                set.borrow_mut().shift_remove(&id);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.joined.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Recorder {
        id: SubscriberId,
        calls: Cell<usize>,
    }

    impl Subscriber for Recorder {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn notify(self: Rc<Self>) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn detach_removes_from_every_joined_set() {
        let recorder = Rc::new(Recorder {
            id: SubscriberId::new(),
            calls: Cell::new(0),
        });
        let weak: Weak<Recorder> = Rc::downgrade(&recorder);
        let weak: Weak<dyn Subscriber> = weak;

        let a: SharedSubscribers = Rc::new(RefCell::new(IndexMap::new()));
        let b: SharedSubscribers = Rc::new(RefCell::new(IndexMap::new()));
        a.borrow_mut().insert(recorder.id, weak.clone());
        b.borrow_mut().insert(recorder.id, weak);

        let mut deps = Dependencies::default();
        deps.record(&a);
        deps.record(&b);
        assert_eq!(deps.len(), 2);

        deps.detach(recorder.id);

        assert!(a.borrow().is_empty());
        assert!(b.borrow().is_empty());
        assert_eq!(deps.len(), 0);
    }

    #[test]
    fn detach_tolerates_dropped_sets() {
        let mut deps = Dependencies::default();
        {
            let set: SharedSubscribers = Rc::new(RefCell::new(IndexMap::new()));
            deps.record(&set);
        }
        deps.detach(SubscriberId::new());
        assert_eq!(deps.len(), 0);
    }

    #[test]
    fn notify_reaches_the_subscriber() {
        let recorder = Rc::new(Recorder {
            id: SubscriberId::new(),
            calls: Cell::new(0),
        });
        Rc::clone(&recorder).notify();
        assert_eq!(recorder.calls.get(), 1);
    }
}
