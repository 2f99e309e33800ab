//! Async Derived - Cells backed by a future.
//!
//! An [`AsyncDerived`] runs its compute function like a derived (reads are
//! tracked) but the function returns a future. The future is spawned on the
//! executor installed with [`set_spawner`](crate::config::set_spawner), and
//! the cell moves through [`AsyncState`] as it settles.
//!
//! # Races
//!
//! Every restart bumps the cell's generation. A settled future commits only
//! if its generation is still current; older in-flight futures are not
//! aborted, their results are simply dropped. Compute functions are
//! therefore expected to be idempotent.
//!
//! Only reads made before the future is returned are tracked.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;

use futures::task::LocalSpawnExt;

use super::runtime::{self, AnyValue, CellId, Freshness, Kind};
use super::scheduler::batch;
use super::signal::downcast;
use crate::config;
use crate::error::ReactiveError;

/// State of an async computation.
#[derive(Clone, Debug, PartialEq)]
pub enum AsyncState<T, E> {
    /// Loading state - async operation in progress.
    Pending,
    /// Success state - operation completed with value.
    Resolved(T),
    /// Error state - operation failed with error.
    Rejected(E),
}

impl<T, E> AsyncState<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncState::Pending)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            AsyncState::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// A cell whose value comes from a future.
pub struct AsyncDerived<T, E> {
    id: CellId,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Clone for AsyncDerived<T, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, E> Copy for AsyncDerived<T, E> {}

impl<T, E> fmt::Debug for AsyncDerived<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AsyncDerived").field(&self.id).finish()
    }
}

/// Create an async derived cell and start its first computation.
pub fn async_derived<T, E, F, Fut>(compute: F) -> AsyncDerived<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<T, E>> + 'static,
{
    let generation = Rc::new(Cell::new(0u64));
    let own_id: Rc<Cell<Option<CellId>>> = Rc::new(Cell::new(None));

    let own_id_restart = own_id.clone();
    let restart = move || {
        let Some(id) = own_id_restart.get() else {
            return;
        };
        let current = generation.get() + 1;
        generation.set(current);
        publish::<T, E>(id, AsyncState::Pending);

        let future = compute();
        let generation = generation.clone();
        let task = async move {
            let result = future.await;
            if generation.get() != current {
                tracing::debug!(
                    cell = %id,
                    generation = current,
                    latest = generation.get(),
                    "discarding stale async result"
                );
                return;
            }
            let state = match result {
                Ok(value) => AsyncState::Resolved(value),
                Err(err) => AsyncState::Rejected(err),
            };
            publish::<T, E>(id, state);
        };

        match config::spawner() {
            Some(spawner) => {
                if let Err(err) = (*spawner).spawn_local(task) {
                    tracing::error!(cell = %id, %err, "failed to spawn async computation");
                }
            }
            // Server renders ship the Pending snapshot.
            None if config::execution_mode() == config::ExecutionMode::Server => {
                tracing::debug!(cell = %id, "no spawner on server, async computation stays pending")
            }
            None => tracing::error!(
                cell = %id,
                "no spawner configured, async computation not started"
            ),
        }
    };

    let initial: AnyValue = Rc::new(AsyncState::<T, E>::Pending);
    let id = runtime::create_node(Kind::Async(Rc::new(restart)), Some(initial), Freshness::Dirty);
    own_id.set(Some(id));

    batch(|| {
        if let Err(err) = runtime::update_if_necessary(id) {
            tracing::error!(cell = %id, %err, "async computation failed to start");
        }
    });

    AsyncDerived {
        id,
        _marker: PhantomData,
    }
}

/// Commit a state, skipping writes that change nothing.
fn publish<T, E>(id: CellId, state: AsyncState<T, E>)
where
    T: PartialEq + 'static,
    E: PartialEq + 'static,
{
    // Peek, not read: the cell may be mid-restart with its computing flag set.
    let unchanged = runtime::peek(id)
        .and_then(|current| {
            current
                .downcast_ref::<AsyncState<T, E>>()
                .map(|current| *current == state)
        })
        .unwrap_or(false);
    if unchanged {
        return;
    }
    if let Err(err) = runtime::write(id, Rc::new(state)) {
        tracing::debug!(%err, "async result for disposed cell dropped");
    }
}

impl<T: Clone + 'static, E: Clone + 'static> AsyncDerived<T, E> {
    /// Snapshot of the current state. Never blocks.
    ///
    /// # Panics
    ///
    /// If the cell has been disposed.
    pub fn get(&self) -> AsyncState<T, E> {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_get(&self) -> Result<AsyncState<T, E>, ReactiveError> {
        let value = runtime::read(self.id)?;
        Ok(downcast::<AsyncState<T, E>>(&value, self.id)?.clone())
    }

    /// Restart the computation even though no source changed.
    pub fn refetch(&self) {
        runtime::invalidate(self.id);
    }
}

impl<T, E> AsyncDerived<T, E> {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        runtime::is_alive(self.id)
    }

    pub fn dispose(&self) {
        runtime::dispose(self.id);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{reset_config, set_spawner};
    use crate::reactive::{effect, signal};
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use std::cell::RefCell;

    type Reply = oneshot::Sender<Result<i32, String>>;

    /// Async cell over `query`; each run parks a sender the test resolves.
    fn parked(query: crate::reactive::Signal<i32>) -> (AsyncDerived<i32, String>, Rc<RefCell<Vec<Reply>>>) {
        let senders: Rc<RefCell<Vec<Reply>>> = Rc::new(RefCell::new(Vec::new()));
        let senders_clone = senders.clone();
        let cell = async_derived(move || {
            query.get();
            let (tx, rx) = oneshot::channel();
            senders_clone.borrow_mut().push(tx);
            async move { rx.await.unwrap_or_else(|_| Err("cancelled".to_string())) }
        });
        (cell, senders)
    }

    #[test]
    fn test_resolves_through_executor() {
        let mut pool = LocalPool::new();
        set_spawner(pool.spawner());

        let query = signal(1);
        let (cell, senders) = parked(query);
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Pending);

        let tx = senders.borrow_mut().remove(0);
        tx.send(Ok(7)).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Resolved(7));

        reset_config();
    }

    #[test]
    fn test_latest_generation_wins() {
        let mut pool = LocalPool::new();
        set_spawner(pool.spawner());

        let query = signal(1);
        let (cell, senders) = parked(query);

        // G2 starts before G1 settles
        query.set(2);
        assert_eq!(senders.borrow().len(), 2);

        let g2 = senders.borrow_mut().pop().unwrap();
        let g1 = senders.borrow_mut().pop().unwrap();

        g2.send(Ok(20)).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Resolved(20));

        // G1 settles last and must be ignored
        g1.send(Ok(10)).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Resolved(20));

        reset_config();
    }

    #[test]
    fn test_stale_result_before_latest_is_ignored() {
        let mut pool = LocalPool::new();
        set_spawner(pool.spawner());

        let query = signal(1);
        let (cell, senders) = parked(query);
        query.set(2);

        let g2 = senders.borrow_mut().pop().unwrap();
        let g1 = senders.borrow_mut().pop().unwrap();

        g1.send(Ok(10)).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Pending, "G1 is stale even when first");

        g2.send(Err("boom".to_string())).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Rejected("boom".to_string()));

        reset_config();
    }

    #[test]
    fn test_rejection_delivered_to_subscribers() {
        let mut pool = LocalPool::new();
        set_spawner(pool.spawner());

        let query = signal(1);
        let (cell, senders) = parked(query);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        effect(move || seen_clone.borrow_mut().push(cell.get()));

        let tx = senders.borrow_mut().remove(0);
        tx.send(Err("offline".to_string())).unwrap();
        pool.run_until_stalled();

        assert_eq!(
            *seen.borrow(),
            vec![AsyncState::Pending, AsyncState::Rejected("offline".to_string())]
        );

        // A restart goes back through Pending
        query.set(2);
        assert_eq!(seen.borrow().last(), Some(&AsyncState::Pending));

        reset_config();
    }

    #[test]
    fn test_refetch_restarts_without_source_change() {
        let mut pool = LocalPool::new();
        set_spawner(pool.spawner());

        let query = signal(1);
        let (cell, senders) = parked(query);
        senders.borrow_mut().remove(0).send(Ok(1)).unwrap();
        pool.run_until_stalled();
        assert_eq!(cell.get(), AsyncState::Resolved(1));

        cell.refetch();
        assert_eq!(cell.get(), AsyncState::Pending);
        assert_eq!(senders.borrow().len(), 1);

        reset_config();
    }
}
