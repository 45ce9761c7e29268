//! Reducer Store
//!
//! A [`Store`] keeps application state in a [`Signal`] and changes it only
//! through a reducer, one action at a time. Components that read
//! [`Store::state`] while rendering re-render when a dispatched action
//! changes the state; plain listeners registered with [`Store::subscribe`]
//! receive the new and the previous state.
//!
//! ```rust
//! use trellis_core::store::Store;
//!
//! enum Action {
//!     Add(i32),
//!     Reset,
//! }
//!
//! let store = Store::new(0, |state: &i32, action: Action| match action {
//!     Action::Add(n) => state + n,
//!     Action::Reset => 0,
//! });
//!
//! store.dispatch(Action::Add(2));
//! store.dispatch(Action::Add(3));
//! assert_eq!(store.state_untracked(), 5);
//!
//! store.dispatch(Action::Reset);
//! assert_eq!(store.state_untracked(), 0);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use crate::reactive::Signal;

type Reducer<S, A> = Box<dyn Fn(&S, A) -> S>;
type Listener<S> = Rc<dyn Fn(&S, &S)>;

/// State container updated through a reducer.
pub struct Store<S, A> {
    inner: Rc<StoreInner<S, A>>,
}

struct StoreInner<S, A> {
    state: Signal<S>,
    reducer: Reducer<S, A>,
    listeners: RefCell<IndexMap<u64, Listener<S>>>,
    next_listener: Cell<u64>,
}

impl<S, A> Store<S, A>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    pub fn new(initial: S, reducer: impl Fn(&S, A) -> S + 'static) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: Signal::new(initial),
                reducer: Box::new(reducer),
                listeners: RefCell::new(IndexMap::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// Current state. Tracked like a signal read.
    pub fn state(&self) -> S {
        self.inner.state.get()
    }

    /// Current state without registering a dependency.
    pub fn state_untracked(&self) -> S {
        self.inner.state.get_untracked()
    }

    /// Borrow the current state. Tracked like a signal read.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.inner.state.with(f)
    }

    /// Apply `action` through the reducer.
    ///
    /// When the reducer returns a state equal to the current one nothing
    /// happens. Otherwise dependent effects re-run first, then listeners
    /// are called with `(new, old)` in subscription order.
    pub fn dispatch(&self, action: A) {
        let old = self.inner.state.get_untracked();
        let new = (self.inner.reducer)(&old, action);
        if new == old {
            trace!("store action left state unchanged");
            return;
        }

        self.inner.state.set(new.clone());

        let listeners: Vec<Listener<S>> = self.inner.listeners.borrow().values().cloned().collect();
        trace!(listeners = listeners.len(), "store state changed");
        for listener in listeners {
            listener(&new, &old);
        }
    }

    /// Call `listener` with `(new, old)` after every state change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&S, &S) + 'static) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.listeners.borrow_mut().insert(id, Rc::new(listener));

        let store: Weak<StoreInner<S, A>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(store) = store.upgrade() {
                    store.listeners.borrow_mut().shift_remove(&id);
                }
            })),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug + 'static, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state)
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

/// Registration of a store listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;

    #[derive(Debug, Clone, PartialEq)]
    struct Todos {
        items: Vec<String>,
        filter: bool,
    }

    enum Action {
        Add(&'static str),
        ToggleFilter,
        Noop,
    }

    fn todos() -> Store<Todos, Action> {
        let initial = Todos {
            items: Vec::new(),
            filter: false,
        };
        Store::new(initial, |state: &Todos, action: Action| {
            let mut next = state.clone();
            match action {
                Action::Add(item) => next.items.push(item.to_string()),
                Action::ToggleFilter => next.filter = !next.filter,
                Action::Noop => {}
            }
            next
        })
    }

    #[test]
    fn listeners_receive_new_and_old() {
        let store = todos();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let _subscription = store.subscribe(move |new: &Todos, old: &Todos| {
            seen_clone.borrow_mut().push((old.items.len(), new.items.len()));
        });

        store.dispatch(Action::Add("milk"));
        store.dispatch(Action::Add("eggs"));
        assert_eq!(*seen.borrow(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn unchanged_state_notifies_nobody() {
        let store = todos();
        let calls = Rc::new(Cell::new(0));

        let calls_clone = calls.clone();
        let _subscription = store.subscribe(move |_, _| calls_clone.set(calls_clone.get() + 1));

        let store_clone = store.clone();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            store_clone.with(|state| state.items.len());
            runs_clone.set(runs_clone.get() + 1);
        });

        store.dispatch(Action::Noop);
        assert_eq!(calls.get(), 0);
        assert_eq!(runs.get(), 1);

        store.dispatch(Action::ToggleFilter);
        assert_eq!(calls.get(), 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn subscriptions_end_on_drop_or_unsubscribe() {
        let store = todos();
        let calls = Rc::new(Cell::new(0));

        let calls_a = calls.clone();
        let first = store.subscribe(move |_, _| calls_a.set(calls_a.get() + 1));
        let calls_b = calls.clone();
        let second = store.subscribe(move |_, _| calls_b.set(calls_b.get() + 10));
        assert_eq!(store.listener_count(), 2);

        store.dispatch(Action::Add("a"));
        assert_eq!(calls.get(), 11);

        first.unsubscribe();
        store.dispatch(Action::Add("b"));
        assert_eq!(calls.get(), 21);

        drop(second);
        store.dispatch(Action::Add("c"));
        assert_eq!(calls.get(), 21);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_dispatch() {
        let store = todos();
        let store_clone = store.clone();
        let _subscription = store.subscribe(move |new: &Todos, _| {
            if new.items.len() == 1 {
                store_clone.dispatch(Action::Add("follow-up"));
            }
        });

        store.dispatch(Action::Add("first"));
        assert_eq!(store.state_untracked().items, vec!["first", "follow-up"]);
    }

    #[test]
    fn subscription_outliving_store_is_harmless() {
        let store = todos();
        let subscription = store.subscribe(|_, _| {});
        drop(store);
        subscription.unsubscribe();
    }
}
