//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation joins the signal's subscriber set.
//!
//! # Implementation
//!
//! A thread-local stack holds one entry per executing computation; only the
//! top entry is the active runner. Entering pushes, leaving pops, so an
//! effect created or notified from inside another one restores the outer
//! runner when it finishes instead of clearing tracking altogether.
//!
//! The stack is private to this module. Signals reach it through
//! [`ReactiveContext::track`], effects through [`ReactiveContext::enter`].

use std::cell::RefCell;
use std::rc::Weak;

use super::subscriber::{Dependencies, SharedSubscribers, Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running computation, or `None` for an untracked scope.
    subscriber: Option<(SubscriberId, Weak<dyn Subscriber>)>,
    /// Subscriber sets joined during this run.
    dependencies: Dependencies,
}

/// Guard for one tracked execution.
///
/// Finish it with [`ReactiveContext::finish`] to collect the joined
/// dependencies. If it is dropped instead (the computation panicked), the
/// entry is popped and every set joined so far is detached again.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    finished: bool,
}

impl ReactiveContext {
    /// Make `subscriber` the active runner until the guard is finished.
    pub(crate) fn enter(subscriber_id: SubscriberId, subscriber: Weak<dyn Subscriber>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some((subscriber_id, subscriber)),
                dependencies: Dependencies::default(),
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Check if there is an active runner.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the active runner's ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref().map(|(id, _)| *id))
        })
    }

    /// Join `subscribers` on behalf of the active runner.
    ///
    /// Called by signals when they are read. Does nothing when no runner is
    /// active or the runner already joined this set during the current run.
    pub(crate) fn track(subscribers: &SharedSubscribers) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return;
            };
            let Some((id, subscriber)) = entry.subscriber.as_ref() else {
                return;
            };

            let inserted = subscribers
                .borrow_mut()
                .insert(*id, subscriber.clone())
                .is_none();
            if inserted {
                entry.dependencies.record(subscribers);
            }
        });
    }

    /// Leave the context and hand back the dependencies joined by this run.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.finished = true;
        Self::pop(self.subscriber_id)
            .map(|entry| entry.dependencies)
            .unwrap_or_default()
    }

    fn pop(expected: SubscriberId) -> Option<ContextEntry> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = &popped {
                debug_assert_eq!(
                    entry.subscriber.as_ref().map(|(id, _)| *id),
                    Some(expected),
                    "ReactiveContext mismatch"
                );
            }
            popped
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(mut entry) = Self::pop(self.subscriber_id) {
            entry.dependencies.detach(self.subscriber_id);
        }
    }
}

/// Run `f` with dependency tracking suspended.
///
/// Signals read inside `f` are not joined by the surrounding runner.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    struct Untracked;

    impl Drop for Untracked {
        fn drop(&mut self) {
            CONTEXT_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }

    CONTEXT_STACK.with(|stack| {
        stack.borrow_mut().push(ContextEntry {
            subscriber: None,
            dependencies: Dependencies::default(),
        });
    });
    let _guard = Untracked;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::rc::Rc;

    struct Noop(SubscriberId);

    impl Subscriber for Noop {
        fn subscriber_id(&self) -> SubscriberId {
            self.0
        }

        fn notify(self: Rc<Self>) {}
    }

    fn noop() -> (Rc<Noop>, Weak<dyn Subscriber>) {
        let noop = Rc::new(Noop(SubscriberId::new()));
        let weak: Weak<Noop> = Rc::downgrade(&noop);
        let weak: Weak<dyn Subscriber> = weak;
        (noop, weak)
    }

    fn empty_set() -> SharedSubscribers {
        Rc::new(RefCell::new(IndexMap::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let (noop, weak) = noop();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        let ctx = ReactiveContext::enter(noop.0, weak);
        assert!(ReactiveContext::is_active());
        assert_eq!(ReactiveContext::current_subscriber(), Some(noop.0));
        ctx.finish();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn track_joins_each_set_once() {
        let (noop, weak) = noop();
        let set = empty_set();

        let ctx = ReactiveContext::enter(noop.0, weak);
        ReactiveContext::track(&set);
        ReactiveContext::track(&set);
        let deps = ctx.finish();

        assert_eq!(deps.len(), 1);
        assert!(set.borrow().contains_key(&noop.0));
    }

    #[test]
    fn track_outside_a_run_is_ignored() {
        let set = empty_set();
        ReactiveContext::track(&set);
        assert!(set.borrow().is_empty());
    }

    #[test]
    fn nested_contexts_restore_the_outer_runner() {
        let (outer, outer_weak) = noop();
        let (inner, inner_weak) = noop();

        let outer_ctx = ReactiveContext::enter(outer.0, outer_weak);
        assert_eq!(ReactiveContext::current_subscriber(), Some(outer.0));

        let inner_ctx = ReactiveContext::enter(inner.0, inner_weak);
        assert_eq!(ReactiveContext::current_subscriber(), Some(inner.0));
        inner_ctx.finish();

        assert_eq!(ReactiveContext::current_subscriber(), Some(outer.0));
        outer_ctx.finish();
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn dropped_context_detaches_joined_sets() {
        let (noop, weak) = noop();
        let set = empty_set();

        {
            let _ctx = ReactiveContext::enter(noop.0, weak);
            ReactiveContext::track(&set);
            assert_eq!(set.borrow().len(), 1);
        }

        assert!(set.borrow().is_empty());
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn untrack_hides_the_active_runner() {
        let (noop, weak) = noop();
        let set = empty_set();

        let ctx = ReactiveContext::enter(noop.0, weak);
        untrack(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track(&set);
        });
        assert_eq!(ReactiveContext::current_subscriber(), Some(noop.0));
        let deps = ctx.finish();

        assert_eq!(deps.len(), 0);
        assert!(set.borrow().is_empty());
    }
}
