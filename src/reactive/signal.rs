//! Signals - Writable source cells.
//!
//! A [`Signal`] holds a value and notifies its subscribers when a write
//! changes it. Whether a write "changes" the value is decided by the
//! signal's equality function:
//!
//! - [`signal`] uses [`equality::structural`] (`PartialEq`). This is the
//!   default: a `Vec` set to an equal `Vec` is a no-op.
//! - [`signal_with`] takes any `fn(&T, &T) -> bool`, e.g.
//!   [`equality::ptr_eq`] to compare `Rc` identity or [`equality::never`] to
//!   notify on every write.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::runtime::{self, CellId, EqualsFn, Freshness, Kind};
use crate::error::ReactiveError;

/// Equality policies for [`signal_with`].
pub mod equality {
    use std::rc::Rc;

    /// Shallow structural equality via `PartialEq`.
    pub fn structural<T: PartialEq>(a: &T, b: &T) -> bool {
        a == b
    }

    /// Identity of the shared allocation, ignoring contents.
    pub fn ptr_eq<U: ?Sized>(a: &Rc<U>, b: &Rc<U>) -> bool {
        Rc::ptr_eq(a, b)
    }

    /// Every write is a change.
    pub fn never<T>(_: &T, _: &T) -> bool {
        false
    }
}

/// A writable reactive value. Copyable handle into the runtime.
pub struct Signal<T> {
    id: CellId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&self.id).finish()
    }
}

/// Create a signal compared with `PartialEq`.
pub fn signal<T: Clone + PartialEq + 'static>(value: T) -> Signal<T> {
    signal_with(value, equality::structural::<T>)
}

/// Create a signal with a custom equality policy.
pub fn signal_with<T: Clone + 'static>(value: T, equals: fn(&T, &T) -> bool) -> Signal<T> {
    let equals: Rc<EqualsFn> = Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => equals(a, b),
            _ => false,
        }
    });
    let id = runtime::create_node(Kind::Signal(equals), Some(Rc::new(value)), Freshness::Clean);
    Signal {
        id,
        _marker: PhantomData,
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Current value, recorded as a dependency of the running computation.
    ///
    /// # Panics
    ///
    /// If the signal has been disposed.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let value = runtime::read(self.id)?;
        Ok(downcast::<T>(&value, self.id)?.clone())
    }

    /// Current value without recording a dependency.
    ///
    /// # Panics
    ///
    /// If the signal has been disposed.
    pub fn get_untracked(&self) -> T {
        runtime::read_untracked(self.id)
            .and_then(|value| downcast::<T>(&value, self.id).cloned())
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Borrow the current value (tracked).
    ///
    /// # Panics
    ///
    /// If the signal has been disposed.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = runtime::read(self.id).unwrap_or_else(|err| panic!("{err}"));
        let value = downcast::<T>(&value, self.id).unwrap_or_else(|err| panic!("{err}"));
        f(value)
    }

    /// Write a value. No-op if the equality policy reports it unchanged.
    ///
    /// Writing to a disposed signal is ignored.
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            tracing::debug!(%err, "write to disposed signal ignored");
        }
    }

    /// Write a value, returning whether it changed.
    pub fn try_set(&self, value: T) -> Result<bool, ReactiveError> {
        let current = runtime::read_untracked(self.id)?;
        let unchanged = runtime::equals_fn(self.id)
            .map(|equals| equals(current.as_ref(), &value as &dyn Any))
            .unwrap_or(false);
        if unchanged {
            return Ok(false);
        }
        runtime::write(self.id, Rc::new(value))?;
        Ok(true)
    }

    /// Modify a copy of the value in place and write it back.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let Ok(current) = runtime::read_untracked(self.id) else {
            return;
        };
        let Ok(current) = downcast::<T>(&current, self.id) else {
            return;
        };
        let mut next = current.clone();
        f(&mut next);
        self.set(next);
    }
}

impl<T> Signal<T> {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        runtime::is_alive(self.id)
    }

    /// Number of computations currently reading this signal.
    pub fn subscriber_count(&self) -> usize {
        runtime::subscriber_count(self.id)
    }

    /// Remove the signal from the graph. Idempotent.
    pub fn dispose(&self) {
        runtime::dispose(self.id);
    }
}

/// Typed view of a node value. Handles are typed at creation, so a mismatch
/// means the slot was reused by a different cell.
pub(crate) fn downcast<T: 'static>(value: &Rc<dyn Any>, id: CellId) -> Result<&T, ReactiveError> {
    value
        .downcast_ref::<T>()
        .ok_or(ReactiveError::Disposed { cell: id })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;

    fn count_runs<T: Clone + 'static>(sig: Signal<T>) -> Rc<Cell<usize>> {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        effect(move || {
            sig.with(|_| ());
            runs_clone.set(runs_clone.get() + 1);
        });
        runs
    }

    #[test]
    fn test_set_and_get() {
        let count = signal(1);
        assert_eq!(count.get(), 1);

        count.set(5);
        assert_eq!(count.get(), 5);

        count.update(|n| *n += 1);
        assert_eq!(count.get(), 6);
    }

    #[test]
    fn test_structural_equality_is_default() {
        let items = signal(vec![1, 2, 3]);
        let runs = count_runs(items);
        assert_eq!(runs.get(), 1);

        // Equal contents, different allocation: no-op
        assert_eq!(items.try_set(vec![1, 2, 3]), Ok(false));
        assert_eq!(runs.get(), 1);

        items.set(vec![1, 2]);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_ptr_eq_policy_compares_identity() {
        let shared = Rc::new(vec![1, 2, 3]);
        let items = signal_with(shared.clone(), equality::ptr_eq);
        let runs = count_runs(items);

        // Same allocation: no-op
        assert_eq!(items.try_set(shared.clone()), Ok(false));
        assert_eq!(runs.get(), 1);

        // Equal contents, new allocation: a change under identity
        assert_eq!(items.try_set(Rc::new(vec![1, 2, 3])), Ok(true));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_structural_policy_on_rc_compares_contents() {
        let items = signal(Rc::new(vec![1, 2, 3]));
        let runs = count_runs(items);

        assert_eq!(items.try_set(Rc::new(vec![1, 2, 3])), Ok(false));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_never_policy_always_notifies() {
        let tick = signal_with((), equality::never);
        let runs = count_runs(tick);

        tick.set(());
        tick.set(());
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_disposed_signal() {
        let sig = signal(1);
        sig.dispose();

        assert!(!sig.is_alive());
        assert_eq!(sig.try_get(), Err(ReactiveError::Disposed { cell: sig.id() }));
        assert!(sig.try_set(2).is_err());
        // Ignored, not a panic
        sig.set(3);
        sig.dispose();
    }

    #[test]
    #[should_panic(expected = "disposed")]
    fn test_get_disposed_panics() {
        let sig = signal(1);
        sig.dispose();
        sig.get();
    }
}
