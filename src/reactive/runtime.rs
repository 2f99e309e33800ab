//! Reactive Runtime - Node arena, dependency edges, propagation.
//!
//! Every cell and effect is a node in a thread-local arena, addressed by a
//! [`CellId`] (index + generation, so stale handles are detected instead of
//! aliasing a reused slot).
//!
//! # Propagation
//!
//! Two-colour push/pull:
//! 1. A write marks direct subscribers `Dirty` and everything further
//!    downstream `Check`. Effects reached by the walk are enqueued on the
//!    scheduler; derived nodes are never recomputed during the walk.
//! 2. A read (or a scheduled effect) calls [`update_if_necessary`]: a `Check`
//!    node first revalidates its sources in order and only recomputes if one
//!    of them actually produced a new value.
//!
//! Invalidation is complete before any effect runs, so effects never observe
//! a half-propagated graph, and memoized deriveds stop propagation when they
//! recompute to an equal value.
//!
//! # Dependency tracking
//!
//! Reads are recorded against the node on top of the observer stack. The
//! stack is pushed and popped by [`ObserverGuard`], so nested computations
//! restore the outer observer even when they unwind. A node's sources are
//! cleared before each recomputation and rebuilt from the reads it makes.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use smallvec::SmallVec;

use super::{scheduler, scope};
use crate::error::ReactiveError;

// =============================================================================
// Identity
// =============================================================================

/// Identity of a node in the reactive graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId {
    index: u32,
    generation: u32,
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Node storage
// =============================================================================

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct NodeFlags: u8 {
        /// The node's computation is on the stack.
        const COMPUTING = 1 << 0;
        /// The node sits in the scheduler's pending list.
        const SCHEDULED = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Freshness {
    Clean,
    Check,
    Dirty,
}

pub(crate) type AnyValue = Rc<dyn Any>;
pub(crate) type EqualsFn = dyn Fn(&dyn Any, &dyn Any) -> bool;
/// Receives the previous value, returns `None` when the new value is equal.
pub(crate) type ComputeFn = dyn Fn(Option<&dyn Any>) -> Option<AnyValue>;

#[derive(Clone)]
pub(crate) enum Kind {
    Signal(Rc<EqualsFn>),
    Derived(Rc<ComputeFn>),
    Async(Rc<dyn Fn()>),
    Effect(Rc<dyn Fn()>),
}

struct Node {
    kind: Kind,
    value: Option<AnyValue>,
    freshness: Freshness,
    flags: NodeFlags,
    /// Depth of the owning scope, used to order flush passes.
    depth: u32,
    sources: SmallVec<[CellId; 4]>,
    subscribers: SmallVec<[CellId; 4]>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Default)]
struct Runtime {
    slots: RefCell<Vec<Slot>>,
    free: RefCell<Vec<u32>>,
    observers: RefCell<Vec<Option<CellId>>>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

fn node_ref(slots: &[Slot], id: CellId) -> Option<&Node> {
    slots
        .get(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_ref())
}

fn node_mut(slots: &mut [Slot], id: CellId) -> Option<&mut Node> {
    slots
        .get_mut(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_mut())
}

/// Closures passed here must not re-enter the runtime.
fn with_node<R>(id: CellId, f: impl FnOnce(&Node) -> R) -> Option<R> {
    RUNTIME.with(|rt| node_ref(&rt.slots.borrow(), id).map(f))
}

fn with_node_mut<R>(id: CellId, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
    RUNTIME.with(|rt| node_mut(&mut rt.slots.borrow_mut(), id).map(f))
}

// =============================================================================
// Allocation / disposal
// =============================================================================

/// Allocate a node and hand it to the current scope.
pub(crate) fn create_node(kind: Kind, value: Option<AnyValue>, freshness: Freshness) -> CellId {
    let node = Node {
        kind,
        value,
        freshness,
        flags: NodeFlags::empty(),
        depth: scope::current_depth(),
        sources: SmallVec::new(),
        subscribers: SmallVec::new(),
    };

    let id = RUNTIME.with(|rt| {
        let mut slots = rt.slots.borrow_mut();
        match rt.free.borrow_mut().pop() {
            Some(index) => {
                let slot = &mut slots[index as usize];
                slot.node = Some(node);
                CellId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = slots.len() as u32;
                slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                CellId {
                    index,
                    generation: 0,
                }
            }
        }
    });

    scope::adopt(id);
    id
}

/// Remove a node and every edge touching it. Disposing twice is a no-op.
pub(crate) fn dispose(id: CellId) {
    let node = RUNTIME.with(|rt| {
        let mut slots = rt.slots.borrow_mut();
        let slot = slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        rt.free.borrow_mut().push(id.index);
        Some(node)
    });
    let Some(node) = node else { return };

    for source in &node.sources {
        with_node_mut(*source, |n| n.subscribers.retain(|s| *s != id));
    }
    for subscriber in &node.subscribers {
        with_node_mut(*subscriber, |n| n.sources.retain(|s| *s != id));
    }
    // Captured closures drop here, outside the arena borrow.
    drop(node);
}

pub(crate) fn is_alive(id: CellId) -> bool {
    with_node(id, |_| ()).is_some()
}

/// Number of live nodes on this thread.
pub fn live_node_count() -> usize {
    RUNTIME.with(|rt| {
        rt.slots
            .borrow()
            .iter()
            .filter(|slot| slot.node.is_some())
            .count()
    })
}

pub(crate) fn subscriber_count(id: CellId) -> usize {
    with_node(id, |n| n.subscribers.len()).unwrap_or(0)
}

pub(crate) fn source_count(id: CellId) -> usize {
    with_node(id, |n| n.sources.len()).unwrap_or(0)
}

// =============================================================================
// Observer stack
// =============================================================================

/// Pops the observer pushed by [`enter`] and clears the computing flag.
pub(crate) struct ObserverGuard {
    computing: Option<CellId>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.observers.borrow_mut().pop());
        if let Some(id) = self.computing {
            with_node_mut(id, |n| n.flags.remove(NodeFlags::COMPUTING));
        }
    }
}

fn enter(observer: Option<CellId>) -> ObserverGuard {
    RUNTIME.with(|rt| rt.observers.borrow_mut().push(observer));
    if let Some(id) = observer {
        with_node_mut(id, |n| n.flags.insert(NodeFlags::COMPUTING));
    }
    ObserverGuard {
        computing: observer,
    }
}

fn current_observer() -> Option<CellId> {
    RUNTIME.with(|rt| rt.observers.borrow().last().copied().flatten())
}

/// Run `f` without recording any reads against the current computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = enter(None);
    f()
}

fn track(source: CellId) {
    let Some(observer) = current_observer() else {
        return;
    };
    RUNTIME.with(|rt| {
        let mut slots = rt.slots.borrow_mut();
        let Some(obs) = node_mut(&mut slots, observer) else {
            return;
        };
        if obs.sources.contains(&source) {
            return;
        }
        obs.sources.push(source);
        if let Some(src) = node_mut(&mut slots, source) {
            if !src.subscribers.contains(&observer) {
                src.subscribers.push(observer);
            }
        }
    });
}

fn clear_sources(id: CellId) {
    let sources = with_node_mut(id, |n| std::mem::take(&mut n.sources)).unwrap_or_default();
    for source in sources {
        with_node_mut(source, |n| n.subscribers.retain(|s| *s != id));
    }
}

// =============================================================================
// Reads
// =============================================================================

fn value_of(id: CellId) -> Option<AnyValue> {
    with_node(id, |n| n.value.clone()).flatten()
}

/// Current stored value, without revalidating or tracking.
pub(crate) fn peek(id: CellId) -> Option<AnyValue> {
    value_of(id)
}

/// Bring `id` up to date, record the read, and return its value.
pub(crate) fn read(id: CellId) -> Result<AnyValue, ReactiveError> {
    update_if_necessary(id)?;
    track(id);
    value_of(id).ok_or(ReactiveError::Disposed { cell: id })
}

pub(crate) fn read_untracked(id: CellId) -> Result<AnyValue, ReactiveError> {
    update_if_necessary(id)?;
    value_of(id).ok_or(ReactiveError::Disposed { cell: id })
}

/// The equality function of a signal node.
pub(crate) fn equals_fn(id: CellId) -> Option<Rc<EqualsFn>> {
    with_node(id, |n| match &n.kind {
        Kind::Signal(equals) => Some(equals.clone()),
        _ => None,
    })
    .flatten()
}

/// Revalidate `id`, recomputing it only if a source really changed.
pub(crate) fn update_if_necessary(id: CellId) -> Result<(), ReactiveError> {
    let Some((freshness, flags)) = with_node(id, |n| (n.freshness, n.flags)) else {
        return Err(ReactiveError::Disposed { cell: id });
    };
    if flags.contains(NodeFlags::COMPUTING) {
        tracing::error!(cell = %id, "dependency cycle detected");
        return Err(ReactiveError::Cycle { cell: id });
    }

    if freshness == Freshness::Check {
        let sources = with_node(id, |n| n.sources.clone()).unwrap_or_default();
        for source in sources {
            match update_if_necessary(source) {
                Ok(()) | Err(ReactiveError::Disposed { .. }) => {}
                Err(err) => return Err(err),
            }
            if freshness_of(id) == Some(Freshness::Dirty) {
                break;
            }
        }
    }

    if freshness_of(id) == Some(Freshness::Dirty) {
        recompute(id)
    } else {
        with_node_mut(id, |n| n.freshness = Freshness::Clean);
        Ok(())
    }
}

fn freshness_of(id: CellId) -> Option<Freshness> {
    with_node(id, |n| n.freshness)
}

fn recompute(id: CellId) -> Result<(), ReactiveError> {
    let Some(kind) = with_node(id, |n| n.kind.clone()) else {
        return Err(ReactiveError::Disposed { cell: id });
    };

    clear_sources(id);
    // Clean before running, so writes made by the computation re-dirty it.
    with_node_mut(id, |n| n.freshness = Freshness::Clean);

    match kind {
        Kind::Signal(_) => {}
        Kind::Derived(compute) => {
            let previous = value_of(id);
            let next = {
                let _guard = enter(Some(id));
                compute(previous.as_deref())
            };
            if let Some(value) = next {
                with_node_mut(id, |n| n.value = Some(value));
                mark_subscribers(id, Freshness::Dirty);
            }
        }
        Kind::Async(run) | Kind::Effect(run) => {
            let _guard = enter(Some(id));
            run();
        }
    }
    Ok(())
}

// =============================================================================
// Writes
// =============================================================================

/// Store a new value and invalidate everything downstream.
pub(crate) fn write(id: CellId, value: AnyValue) -> Result<(), ReactiveError> {
    with_node_mut(id, |n| n.value = Some(value)).ok_or(ReactiveError::Disposed { cell: id })?;
    mark_subscribers(id, Freshness::Dirty);
    scheduler::request_flush();
    Ok(())
}

/// Force a node dirty, as if one of its sources changed.
pub(crate) fn invalidate(id: CellId) {
    mark(id, Freshness::Dirty);
    scheduler::request_flush();
}

fn mark_subscribers(id: CellId, state: Freshness) {
    let subscribers = with_node(id, |n| n.subscribers.clone()).unwrap_or_default();
    for subscriber in subscribers {
        mark(subscriber, state);
    }
}

fn mark(id: CellId, state: Freshness) {
    let marked = with_node_mut(id, |n| {
        let previous = n.freshness;
        if previous < state {
            n.freshness = state;
        }
        (previous, n.kind.clone())
    });
    let Some((previous, kind)) = marked else {
        return;
    };

    match kind {
        Kind::Effect(_) | Kind::Async(_) => {
            if previous < state {
                scheduler::enqueue(id);
            }
        }
        Kind::Derived(_) => {
            // Downstream was already walked when this node left Clean.
            if previous == Freshness::Clean {
                mark_subscribers(id, Freshness::Check);
            }
        }
        Kind::Signal(_) => {}
    }
}

// =============================================================================
// Scheduler hooks
// =============================================================================

/// Set the scheduled flag; returns false if it was already set.
pub(crate) fn try_mark_scheduled(id: CellId) -> bool {
    with_node_mut(id, |n| {
        let fresh = !n.flags.contains(NodeFlags::SCHEDULED);
        n.flags.insert(NodeFlags::SCHEDULED);
        fresh
    })
    .unwrap_or(false)
}

pub(crate) fn clear_scheduled(id: CellId) {
    with_node_mut(id, |n| n.flags.remove(NodeFlags::SCHEDULED));
}

/// Owner depth of a live node; disposed nodes sort first and are skipped.
pub(crate) fn owner_depth(id: CellId) -> u32 {
    with_node(id, |n| n.depth).unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(value: i32) -> CellId {
        let equals: Rc<EqualsFn> = Rc::new(|a: &dyn Any, b: &dyn Any| {
            a.downcast_ref::<i32>() == b.downcast_ref::<i32>()
        });
        create_node(Kind::Signal(equals), Some(Rc::new(value)), Freshness::Clean)
    }

    #[test]
    fn test_dispose_bumps_generation() {
        let id = test_signal(1);
        assert!(is_alive(id));

        dispose(id);
        assert!(!is_alive(id));

        // Slot is reused with a new generation; the old handle stays dead.
        let reused = test_signal(2);
        assert_eq!(reused.index, id.index);
        assert_ne!(reused.generation, id.generation);
        assert!(!is_alive(id));
        assert_eq!(
            read(id).err(),
            Some(ReactiveError::Disposed { cell: id })
        );
    }

    #[test]
    fn test_double_dispose_is_noop() {
        let id = test_signal(1);
        dispose(id);
        dispose(id);
        assert!(!is_alive(id));
    }

    #[test]
    fn test_untrack_records_nothing() {
        let source = test_signal(1);
        let observer = create_node(Kind::Effect(Rc::new(|| {})), None, Freshness::Clean);

        {
            let _guard = enter(Some(observer));
            untrack(|| read(source).map(|_| ())).unwrap();
        }
        assert_eq!(source_count(observer), 0);
        assert_eq!(subscriber_count(source), 0);

        {
            let _guard = enter(Some(observer));
            read(source).unwrap();
        }
        assert_eq!(source_count(observer), 1);
        assert_eq!(subscriber_count(source), 1);
    }

    #[test]
    fn test_observer_guard_clears_computing_on_unwind() {
        let observer = create_node(Kind::Effect(Rc::new(|| {})), None, Freshness::Clean);
        let result = std::panic::catch_unwind(|| {
            let _guard = enter(Some(observer));
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(update_if_necessary(observer).is_ok());
        assert_eq!(current_observer(), None);
    }
}
