//! Runtime configuration.
//!
//! Settings are thread-local, like the rest of the runtime: the cell graph,
//! the scheduler and the renderer all live on one thread.
//!
//! - [`RuntimeConfig`] - Scheduler limits
//! - [`ExecutionMode`] - Server vs client, readable by leaf components
//! - [`set_spawner`] - Executor used by async derived cells

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::task::LocalSpawn;

// =============================================================================
// Types
// =============================================================================

/// Where the current render is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Live document with reactive updates.
    #[default]
    Client,
    /// Markup-only rendering, no live updates after the first pass.
    Server,
}

/// Scheduler and runtime limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of passes one flush may take before it is treated as
    /// a runaway update loop and abandoned.
    pub max_flush_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 100,
        }
    }
}

// =============================================================================
// State
// =============================================================================

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
    static MODE: Cell<ExecutionMode> = const { Cell::new(ExecutionMode::Client) };
    static SPAWNER: RefCell<Option<Rc<dyn LocalSpawn>>> = const { RefCell::new(None) };
}

/// Replace the runtime configuration for this thread.
pub fn configure(config: RuntimeConfig) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// Current runtime configuration.
pub fn runtime_config() -> RuntimeConfig {
    CONFIG.with(|c| c.borrow().clone())
}

/// Current execution mode.
pub fn execution_mode() -> ExecutionMode {
    MODE.with(|m| m.get())
}

/// Set the execution mode.
pub fn set_execution_mode(mode: ExecutionMode) {
    MODE.with(|m| m.set(mode));
}

/// Run `f` with `mode` active, restoring the previous mode afterwards.
pub(crate) fn with_execution_mode<R>(mode: ExecutionMode, f: impl FnOnce() -> R) -> R {
    struct Restore(ExecutionMode);
    impl Drop for Restore {
        fn drop(&mut self) {
            set_execution_mode(self.0);
        }
    }

    let _restore = Restore(execution_mode());
    set_execution_mode(mode);
    f()
}

/// Install the executor async derived cells spawn their computations on.
///
/// ```ignore
/// let mut pool = futures::executor::LocalPool::new();
/// spark_web::set_spawner(pool.spawner());
/// ```
pub fn set_spawner(spawner: impl LocalSpawn + 'static) {
    SPAWNER.with(|s| *s.borrow_mut() = Some(Rc::new(spawner)));
}

pub(crate) fn spawner() -> Option<Rc<dyn LocalSpawn>> {
    SPAWNER.with(|s| s.borrow().clone())
}

/// Reset configuration, mode and spawner to their defaults.
pub fn reset_config() {
    configure(RuntimeConfig::default());
    set_execution_mode(ExecutionMode::Client);
    SPAWNER.with(|s| *s.borrow_mut() = None);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_execution_mode_restores() {
        reset_config();
        assert_eq!(execution_mode(), ExecutionMode::Client);

        let inner = with_execution_mode(ExecutionMode::Server, execution_mode);
        assert_eq!(inner, ExecutionMode::Server);
        assert_eq!(execution_mode(), ExecutionMode::Client);
    }

    #[test]
    fn test_configure_roundtrip() {
        configure(RuntimeConfig { max_flush_passes: 3 });
        assert_eq!(runtime_config().max_flush_passes, 3);

        reset_config();
        assert_eq!(runtime_config(), RuntimeConfig::default());
    }
}
