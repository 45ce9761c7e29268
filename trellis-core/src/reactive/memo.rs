//! Memo Implementation
//!
//! A Memo is a cached derived value. It recomputes when one of the signals
//! its computation read changes, and notifies its own readers only when the
//! recomputed value differs from the cached one.
//!
//! A memo is an [`Effect`] that writes into a private [`Signal`]; the
//! signal's equality check provides the "only notify on change" behavior.
//! The effect's first run produces the signal's initial value.

use std::fmt::Debug;

use super::effect::Effect;
use super::signal::Signal;

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let doubled = {
///     let count = count.clone();
///     Memo::new(move || count.get() * 2)
/// };
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T> {
    signal: Signal<T>,
    effect: Effect,
}

impl<T: PartialEq + 'static> Memo<T> {
    /// Create a memo and compute its first value immediately.
    pub fn new<F>(mut compute: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let effect = Effect::idle();
        let signal = Signal::new(effect.run_seed(&mut compute));

        let target = signal.clone();
        effect.set_body(move || target.set(compute()));

        Self { signal, effect }
    }
}

impl<T: 'static> Memo<T> {
    /// Borrow the cached value, registering a dependency if an effect is
    /// running.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// Get the number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.effect.run_count()
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Get the cached value, registering a dependency if an effect is
    /// running.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the cached value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.signal)
            .field("compute_count", &self.compute_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn memo_computes_on_creation() {
        let memo = Memo::new(|| 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.compute_count(), 1);
    }

    #[test]
    fn memo_recomputes_when_input_changes() {
        let signal = Signal::new(3);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get() * 2);

        assert_eq!(memo.get(), 6);
        signal.set(5);
        assert_eq!(memo.get(), 10);
        assert_eq!(memo.compute_count(), 2);
    }

    #[test]
    fn memo_skips_readers_when_result_is_unchanged() {
        let signal = Signal::new(2);
        let signal_clone = signal.clone();
        let parity = Memo::new(move || signal_clone.get() % 2);

        let reader_runs = Rc::new(Cell::new(0));
        let parity_clone = parity.clone();
        let reader_runs_clone = reader_runs.clone();
        let _reader = Effect::new(move || {
            parity_clone.get();
            reader_runs_clone.set(reader_runs_clone.get() + 1);
        });

        signal.set(4);
        assert_eq!(parity.compute_count(), 2);
        assert_eq!(reader_runs.get(), 1);

        signal.set(5);
        assert_eq!(reader_runs.get(), 2);
    }

    #[test]
    fn memo_clone_shares_state() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo1 = Memo::new(move || signal_clone.get() + 1);
        let memo2 = memo1.clone();

        signal.set(10);
        assert_eq!(memo1.get(), 11);
        assert_eq!(memo2.get(), 11);
        assert_eq!(memo2.compute_count(), 2);
    }

    #[test]
    fn memo_settles_when_first_computation_writes_its_input() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || {
            let value = signal_clone.get();
            if value < 3 {
                signal_clone.set(value + 1);
            }
            value
        });

        assert_eq!(memo.get(), 3);
        assert_eq!(memo.compute_count(), 4);
        assert_eq!(signal.subscriber_count(), 1);
    }
}
