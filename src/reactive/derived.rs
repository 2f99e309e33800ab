//! Derived - Memoized computations over other cells.
//!
//! A [`Derived`] is lazy: nothing runs until the first read. After that it
//! recomputes only when a source it read during its latest run has changed,
//! and it rediscovers its sources on every run, so branches no longer taken
//! stop triggering it.
//!
//! A recomputation that yields an equal value (`PartialEq`) leaves
//! downstream readers untouched.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::runtime::{self, AnyValue, CellId, ComputeFn, Freshness, Kind};
use super::signal::downcast;
use crate::error::ReactiveError;

/// A read-only cell computed from other cells.
pub struct Derived<T> {
    id: CellId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Derived<T> {}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Derived").field(&self.id).finish()
    }
}

/// Create a derived cell from `compute`.
///
/// # Example
///
/// ```ignore
/// let first = signal("Ada".to_string());
/// let last = signal("Lovelace".to_string());
/// let full = derived(move || format!("{} {}", first.get(), last.get()));
/// assert_eq!(full.get(), "Ada Lovelace");
/// ```
pub fn derived<T, F>(compute: F) -> Derived<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    let compute: Rc<ComputeFn> = Rc::new(move |previous: Option<&dyn Any>| {
        let next = compute();
        match previous.and_then(|p| p.downcast_ref::<T>()) {
            Some(previous) if *previous == next => None,
            _ => Some(Rc::new(next) as AnyValue),
        }
    });
    let id = runtime::create_node(Kind::Derived(compute), None, Freshness::Dirty);
    Derived {
        id,
        _marker: PhantomData,
    }
}

impl<T: Clone + 'static> Derived<T> {
    /// Current value, recomputed first if a source changed.
    ///
    /// # Panics
    ///
    /// On a dependency cycle, or if the cell has been disposed.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Like [`get`](Self::get), reporting cycles and disposal as errors.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let value = runtime::read(self.id)?;
        Ok(downcast::<T>(&value, self.id)?.clone())
    }

    /// Current value without recording a dependency.
    ///
    /// # Panics
    ///
    /// On a dependency cycle, or if the cell has been disposed.
    pub fn get_untracked(&self) -> T {
        runtime::read_untracked(self.id)
            .and_then(|value| downcast::<T>(&value, self.id).cloned())
            .unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T> Derived<T> {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        runtime::is_alive(self.id)
    }

    /// Number of cells this derived read during its latest run.
    pub fn source_count(&self) -> usize {
        runtime::source_count(self.id)
    }

    pub fn subscriber_count(&self) -> usize {
        runtime::subscriber_count(self.id)
    }

    pub fn dispose(&self) {
        runtime::dispose(self.id);
    }
}

// =============================================================================
// Tests
// =============================================================================
