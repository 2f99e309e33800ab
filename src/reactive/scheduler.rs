//! Scheduler - Coalesces effect runs into flushes.
//!
//! - [`batch`] - Defer flushing until the closure returns
//! - [`flush`] - Drain pending effects pass by pass
//!
//! Writes outside a batch flush at the end of the write, so two consecutive
//! `set` calls run their effects twice. Code outside the renderer that wants
//! a single flush for several writes must wrap them in [`batch`]. Writes made
//! while a flush is running are queued for the flush's next pass, never
//! processed in the middle of the current one.
//!
//! Within a pass, effects run shallowest scope first. A region's effect
//! therefore runs before the bindings of the branch it owns, and a binding
//! whose branch was disposed earlier in the pass is skipped.

use std::cell::{Cell, RefCell};

use super::runtime::{self, CellId};
use crate::config::runtime_config;

thread_local! {
    static PENDING: RefCell<Vec<CellId>> = const { RefCell::new(Vec::new()) };
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Queue an effect for the next pass. Queuing twice is a no-op.
pub(crate) fn enqueue(id: CellId) {
    if runtime::try_mark_scheduled(id) {
        PENDING.with(|p| p.borrow_mut().push(id));
    }
}

/// Flush now unless a batch or a flush is already in progress.
pub(crate) fn request_flush() {
    let idle = BATCH_DEPTH.with(|d| d.get()) == 0 && !FLUSHING.with(|f| f.get());
    if idle {
        flush();
    }
}

/// Run `f`, then flush once for every write it made.
///
/// Batches nest; only the outermost one flushes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    struct Depth;
    impl Drop for Depth {
        fn drop(&mut self) {
            BATCH_DEPTH.with(|d| d.set(d.get() - 1));
        }
    }

    BATCH_DEPTH.with(|d| d.set(d.get() + 1));
    let result = {
        let _depth = Depth;
        f()
    };
    request_flush();
    result
}

/// Whether a flush is currently running on this thread.
pub fn is_flushing() -> bool {
    FLUSHING.with(|f| f.get())
}

/// Run every pending effect until none are left.
pub fn flush() {
    struct Flushing;
    impl Drop for Flushing {
        fn drop(&mut self) {
            FLUSHING.with(|f| f.set(false));
        }
    }

    if FLUSHING.with(|f| f.replace(true)) {
        return;
    }
    let _flushing = Flushing;

    let max_passes = runtime_config().max_flush_passes;
    let mut passes = 0;

    loop {
        let mut pass = PENDING.with(|p| std::mem::take(&mut *p.borrow_mut()));
        if pass.is_empty() {
            break;
        }

        passes += 1;
        if passes > max_passes {
            tracing::error!(
                max_passes,
                pending = pass.len(),
                "update loop did not settle, abandoning flush"
            );
            for id in pass {
                runtime::clear_scheduled(id);
            }
            for id in PENDING.with(|p| std::mem::take(&mut *p.borrow_mut())) {
                runtime::clear_scheduled(id);
            }
            break;
        }

        tracing::trace!(pass = passes, effects = pass.len(), "flush pass");
        pass.sort_by_key(|id| runtime::owner_depth(*id));
        for id in pass {
            runtime::clear_scheduled(id);
            if let Err(err) = runtime::update_if_necessary(id) {
                // Disposed mid-flush by an earlier effect in this pass.
                tracing::debug!(%err, "skipping scheduled node");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConfig, configure, reset_config};
    use crate::reactive::{Scope, effect, signal};
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[test]
    fn test_batch_coalesces_writes() {
        let a = signal(1);
        let b = signal(2);
        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(Cell::new(0));

        let runs_clone = runs.clone();
        let seen_clone = seen.clone();
        let _effect = effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            seen_clone.set(a.get() + b.get());
        });
        assert_eq!(runs.get(), 1);

        batch(|| {
            a.set(10);
            b.set(20);
            // Nothing flushed yet
            assert_eq!(seen.get(), 3);
        });

        assert_eq!(runs.get(), 2, "one run for the whole batch");
        assert_eq!(seen.get(), 30);
    }

    #[test]
    fn test_nested_batch_flushes_once() {
        let a = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let _effect = effect(move || {
            a.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        batch(|| {
            a.set(1);
            batch(|| a.set(2));
            assert_eq!(runs.get(), 1, "inner batch must not flush");
            a.set(3);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_write_during_flush_runs_next_pass() {
        let source = signal(0);
        let mirror = signal(0);
        let observed = Rc::new(RefCell::new(Vec::new()));

        let _copy = effect(move || mirror.set(source.get() * 10));

        let observed_clone = observed.clone();
        let _watch = effect(move || observed_clone.borrow_mut().push(mirror.get()));

        source.set(4);
        assert_eq!(mirror.get_untracked(), 40);
        assert_eq!(*observed.borrow(), vec![0, 40]);
    }

    #[test]
    #[traced_test]
    fn test_runaway_loop_is_abandoned() {
        configure(RuntimeConfig { max_flush_passes: 5 });

        let counter = signal(0);
        let _loop = effect(move || {
            let n = counter.get();
            counter.set(n + 1);
        });

        // Creation run, then exactly five passes before the flush gives up.
        assert_eq!(counter.get_untracked(), 6);
        assert!(!is_flushing());
        assert!(logs_contain("update loop did not settle"));

        reset_config();
    }

    #[test]
    fn test_outer_effect_runs_before_nested_ones() {
        let source = signal(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        let outer = Scope::root();
        let inner = outer.child().child();

        // Nested effect subscribes first.
        let order_inner = order.clone();
        inner.run(|| {
            effect(move || order_inner.borrow_mut().push(("inner", source.get())));
        });
        let order_outer = order.clone();
        outer.run(|| {
            effect(move || order_outer.borrow_mut().push(("outer", source.get())));
        });
        order.borrow_mut().clear();

        source.set(1);
        assert_eq!(*order.borrow(), vec![("outer", 1), ("inner", 1)]);
    }

    #[test]
    fn test_effect_disposed_mid_pass_is_skipped() {
        let source = signal(0);
        let inner_runs = Rc::new(Cell::new(0));
        let outer = Scope::root();
        let inner = outer.child();

        let inner_runs_clone = inner_runs.clone();
        inner.run(|| {
            effect(move || {
                source.get();
                inner_runs_clone.set(inner_runs_clone.get() + 1);
            });
        });
        let inner_clone = inner.clone();
        outer.run(|| {
            effect(move || {
                if source.get() > 0 {
                    inner_clone.dispose();
                }
            });
        });

        source.set(1);
        assert_eq!(inner_runs.get(), 1, "only the creation run");
    }
}
