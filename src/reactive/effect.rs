//! Effects - Side effects that re-run when their reads change.
//!
//! The renderer builds every binding on top of [`effect`]: one effect per
//! host location, owned by the scope of the subtree it belongs to.

use std::rc::Rc;

use super::runtime::{self, CellId, Freshness, Kind};
use super::scheduler::batch;

/// Handle to a running effect.
///
/// Dropping the handle does not stop the effect; the owning scope (or
/// [`Effect::dispose`]) does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    id: CellId,
}

/// Run `f` now and again after every flush in which something it read
/// changed.
///
/// Writes made by the first run are flushed once it returns.
pub fn effect(f: impl Fn() + 'static) -> Effect {
    let id = runtime::create_node(Kind::Effect(Rc::new(f)), None, Freshness::Dirty);
    batch(|| {
        if let Err(err) = runtime::update_if_necessary(id) {
            tracing::error!(%err, "effect failed on first run");
        }
    });
    Effect { id }
}

impl Effect {
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        runtime::is_alive(self.id)
    }

    /// Number of cells read during the latest run.
    pub fn source_count(&self) -> usize {
        runtime::source_count(self.id)
    }

    /// Stop the effect and unsubscribe it from everything. Idempotent.
    pub fn dispose(&self) {
        runtime::dispose(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::signal;
    use std::cell::Cell;

    #[test]
    fn test_effect_runs_immediately_and_on_change() {
        let count = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let fx = effect(move || {
            count.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        count.set(1);
        assert_eq!(runs.get(), 2);

        fx.dispose();
        count.set(2);
        assert_eq!(runs.get(), 2, "disposed effect stays quiet");
        assert_eq!(count.subscriber_count(), 0);

        fx.dispose();
    }
}
