//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its latest run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the signal re-runs the effect
//!    synchronously, before the write returns.
//!
//! 3. Before re-running, the effect runs its pending cleanup and detaches
//!    from every subscriber set it joined, so each run starts with zero
//!    dependencies. A branch that stops reading a signal stops being
//!    re-run by it.
//!
//! # Cleanup
//!
//! Effects can optionally return a [`Cleanup`]. It is called before the
//! effect re-runs and when the effect is disposed.
//!
//! # Re-entrancy
//!
//! An effect notified while it is already executing (its own body wrote a
//! signal it reads, directly or through another effect) is marked dirty and
//! runs again as soon as the current run returns.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Dependencies, Subscriber, SubscriberId};

/// A function to run before an effect's next execution or on disposal.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    /// Wrap `f` as a cleanup.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    fn run(self) {
        (self.0)();
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect body may return.
pub trait EffectOutput {
    /// Convert into the cleanup to store for the next run, if any.
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl EffectOutput for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl EffectOutput for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl EffectOutput for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The effect lives as long as any of its handles. Dropping the last handle
/// disposes it.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let effect = {
///     let count = count.clone();
///     let seen = seen.clone();
///     Effect::new(move || seen.set(count.get()))
/// };
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
///
/// effect.dispose();
/// count.set(6);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The effect function.
    run: RefCell<Box<dyn FnMut() -> Option<Cleanup>>>,

    /// Subscriber sets joined by the latest run.
    dependencies: RefCell<Dependencies>,

    /// Cleanup returned by the latest run.
    cleanup: RefCell<Option<Cleanup>>,

    running: Cell<bool>,
    dirty: Cell<bool>,
    disposed: Cell<bool>,

    /// Number of completed runs.
    run_count: Cell<usize>,
}

impl Effect {
    /// Create a new effect and run it once, synchronously.
    ///
    /// A panic in `f` propagates to the caller.
    pub fn new<F, R>(mut f: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: EffectOutput,
    {
        let effect = Self::idle();
        *effect.inner.run.borrow_mut() = Box::new(move || f().into_cleanup());

        // Run immediately to establish dependencies
        effect.inner.execute();

        effect
    }

    /// An effect with an empty body that has not run yet.
    pub(crate) fn idle() -> Self {
        Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                run: RefCell::new(Box::new(|| None)),
                dependencies: RefCell::new(Dependencies::default()),
                cleanup: RefCell::new(None),
                running: Cell::new(false),
                dirty: Cell::new(false),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            }),
        }
    }

    /// Run `seed` once, tracked as this effect's run, and return its result.
    pub(crate) fn run_seed<T>(&self, seed: impl FnOnce() -> T) -> T {
        self.inner.run_with(|| (None, seed()))
    }

    /// Install the body for every later run. Runs it right away if a
    /// dependency changed during the seed run.
    pub(crate) fn set_body(&self, mut body: impl FnMut() + 'static) {
        *self.inner.run.borrow_mut() = Box::new(move || {
            body();
            None
        });
        if self.inner.dirty.get() {
            self.inner.execute();
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Re-run the effect now, as if a dependency had changed.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// Runs the pending cleanup and detaches from every dependency. After
    /// disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of signals read by the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }
}

impl EffectInner {
    fn execute(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        if self.running.get() {
            self.dirty.set(true);
            return;
        }

        loop {
            self.dirty.set(false);
            self.run_once();
            if !self.dirty.get() || self.disposed.get() {
                break;
            }
        }
    }

    fn run_once(self: &Rc<Self>) {
        self.run_with(|| {
            let mut run = self.run.borrow_mut();
            ((*run)(), ())
        });
    }

    /// One tracked run of `body` in place of the stored function.
    fn run_with<T>(self: &Rc<Self>, body: impl FnOnce() -> (Option<Cleanup>, T)) -> T {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
        self.dependencies.borrow_mut().detach(self.id);

        let _running = RunningGuard::set(&self.running);
        let weak: Weak<Self> = Rc::downgrade(self);
        let subscriber: Weak<dyn Subscriber> = weak;
        let ctx = ReactiveContext::enter(self.id, subscriber);

        let (cleanup, value) = body();

        let mut dependencies = ctx.finish();
        self.run_count.set(self.run_count.get() + 1);
        trace!(
            effect = self.id.raw(),
            run = self.run_count.get(),
            dependencies = dependencies.len(),
            "effect ran"
        );

        if self.disposed.get() {
            // Disposed from inside its own run.
            dependencies.detach(self.id);
            if let Some(cleanup) = cleanup {
                cleanup.run();
            }
            return value;
        }

        *self.dependencies.borrow_mut() = dependencies;
        *self.cleanup.borrow_mut() = cleanup;
        value
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
        self.dependencies.borrow_mut().detach(self.id);
        trace!(effect = self.id.raw(), "effect disposed");
    }
}

impl Subscriber for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(self: Rc<Self>) {
        self.execute();
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Clears the running flag even if the effect body panics.
struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::panic::{self, AssertUnwindSafe};

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let run_count = counter();
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let observed = Rc::new(Cell::new(-1));

        let signal_clone = signal.clone();
        let observed_clone = observed.clone();
        let effect = Effect::new(move || {
            observed_clone.set(signal_clone.get());
        });

        assert_eq!(observed.get(), 0);
        signal.set(42);
        assert_eq!(observed.get(), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let run_count = counter();

        let signal_clone = signal.clone();
        let run_count_clone = run_count.clone();
        let effect = Effect::new(move || {
            signal_clone.get();
            run_count_clone.set(run_count_clone.get() + 1);
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        effect.execute();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn dependencies_are_recomputed_each_run() {
        let tick = Signal::new(0);
        let a = Signal::new("a");
        let runs = counter();

        let tick_clone = tick.clone();
        let a_clone = a.clone();
        let runs_clone = runs.clone();
        let effect = Effect::new(move || {
            runs_clone.set(runs_clone.get() + 1);
            if tick_clone.get() % 2 == 0 {
                a_clone.get();
            }
        });
        assert_eq!(effect.dependency_count(), 2);

        // Odd tick: `a` is not read by this run.
        tick.set(1);
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(a.subscriber_count(), 0);

        a.set("b");
        assert_eq!(runs.get(), 2);

        // Even tick: `a` is read again.
        tick.set(2);
        a.set("c");
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn repeated_writes_do_not_grow_subscriber_sets() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let _effect = Effect::new(move || {
            signal_clone.get();
            signal_clone.get();
        });

        for n in 1..50 {
            signal.set(n);
        }
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let signal_clone = signal.clone();
        let log_clone = log.clone();
        let effect = Effect::new(move || {
            let value = signal_clone.get();
            log_clone.borrow_mut().push(format!("run {value}"));
            let log = log_clone.clone();
            Cleanup::new(move || log.borrow_mut().push(format!("cleanup {value}")))
        });

        signal.set(1);
        effect.dispose();

        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let signal = Signal::new(0);
        let cleaned = Rc::new(Cell::new(false));

        let signal_clone = signal.clone();
        let cleaned_clone = cleaned.clone();
        let effect = Effect::new(move || {
            signal_clone.get();
            let cleaned = cleaned_clone.clone();
            Some(Cleanup::new(move || cleaned.set(true)))
        });
        let second = effect.clone();

        drop(effect);
        assert!(!cleaned.get());
        assert_eq!(signal.subscriber_count(), 1);

        drop(second);
        assert!(cleaned.get());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn self_write_reruns_after_current_run() {
        let signal = Signal::new(0);
        let runs = counter();

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            runs_clone.set(runs_clone.get() + 1);
            let value = signal_clone.get();
            if value < 3 {
                signal_clone.set(value + 1);
            }
        });

        assert_eq!(signal.get_untracked(), 3);
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn panic_propagates_and_leaves_no_subscription() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();

        let effect = Effect::new(move || {
            if signal_clone.get() == 1 {
                panic!("boom");
            }
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| signal.set(1)));
        assert!(result.is_err());
        assert_eq!(signal.subscriber_count(), 0);
        assert!(!effect.is_disposed());

        // The effect can still be run by hand once the fault is gone.
        signal.set(2);
        effect.execute();
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn nested_effect_does_not_steal_outer_tracking() {
        let outer_signal = Signal::new(0);
        let inner_signal = Signal::new(0);
        let outer_runs = counter();
        let inner: Rc<RefCell<Vec<Effect>>> = Rc::new(RefCell::new(Vec::new()));

        let outer_clone = outer_signal.clone();
        let inner_signal_clone = inner_signal.clone();
        let outer_runs_clone = outer_runs.clone();
        let inner_clone = inner.clone();
        let _outer = Effect::new(move || {
            outer_runs_clone.set(outer_runs_clone.get() + 1);
            let inner_signal = inner_signal_clone.clone();
            let nested = Effect::new(move || {
                inner_signal.get();
            });
            inner_clone.borrow_mut().push(nested);
            outer_clone.get();
        });

        assert_eq!(outer_signal.subscriber_count(), 1);
        inner_signal.set(1);
        assert_eq!(outer_runs.get(), 1);
        outer_signal.set(1);
        assert_eq!(outer_runs.get(), 2);
    }
}
