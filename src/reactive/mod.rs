//! Reactive Core - Cells, effects, scheduling and ownership.
//!
//! - [`signal`] / [`Signal`] - Writable source cells
//! - [`derived`] / [`Derived`] - Lazy memoized computations
//! - [`async_derived`] / [`AsyncDerived`] - Cells fed by futures
//! - [`effect`] / [`Effect`] - Side effects re-run on change
//! - [`batch`] / [`flush`] - Write coalescing
//! - [`Scope`] - Ownership and disposal of everything above
//!
//! All state is thread-local. Handles are `Copy` ids into the runtime arena;
//! a handle whose cell was disposed reports [`ReactiveError::Disposed`]
//! instead of reading someone else's value.
//!
//! [`ReactiveError::Disposed`]: crate::error::ReactiveError::Disposed

mod async_derived;
mod derived;
mod effect;
pub(crate) mod runtime;
mod scheduler;
mod scope;
mod signal;

pub use async_derived::{AsyncDerived, AsyncState, async_derived};
pub use derived::{Derived, derived};
pub use effect::{Effect, effect};
pub use runtime::{CellId, live_node_count, untrack};
pub use scheduler::{batch, flush, is_flushing};
pub use scope::{Scope, current_scope, effect_scope, on_scope_dispose, provide_context, use_context};
pub use signal::{Signal, equality, signal, signal_with};
