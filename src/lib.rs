//! # spark-web
//!
//! Fine-grained reactive UI core with server rendering and hydration.
//!
//! ## Architecture
//!
//! State lives in cells (signals, deriveds, async deriveds). Views are plain
//! descriptions; mounting one turns every dynamic value into a binding that
//! writes straight to its host node when the cells it reads change. There is
//! no virtual DOM and no diffing outside keyed lists.
//!
//! ```text
//! Signal.set → mark subscribers → scheduler flush → bindings → HostTree writes
//! ```
//!
//! The host tree is abstract ([`HostTree`]). [`MarkupTree`] serializes to HTML
//! on the server, [`Document`] is the client tree that server markup is parsed
//! into and hydrated.
//!
//! ## Modules
//!
//! - [`reactive`] - Cells, effects, scheduler, scopes and context
//! - [`primitives`] - Elements, text, control flow, portals
//! - [`renderer`] - Host tree adapters, mount engine, hydration reconciler
//! - [`pipeline`] - `render_to_string`, `mount`, `hydrate`
//! - [`config`] - Thread-local runtime settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod reactive;
pub mod renderer;

// Re-export commonly used items
pub use config::{
    ExecutionMode, RuntimeConfig, configure, execution_mode, reset_config, runtime_config,
    set_execution_mode, set_spawner,
};

pub use error::{Error, HydrationError, ReactiveError, Result};

pub use reactive::{
    AsyncDerived, AsyncState, Derived, Effect, Scope, Signal, async_derived, batch,
    current_scope, derived, effect, effect_scope, flush, on_scope_dispose, provide_context,
    signal, signal_with, untrack, use_context,
};

pub use primitives::{
    Element, PropValue, View, WhenOptions, component, dyn_text, each, element, fragment, portal,
    show, text, when,
};

pub use renderer::{Document, HostNode, HostTree, HydrationReport, MarkupTree, NodeKind};

pub use pipeline::{MountHandle, RenderOutput, hydrate, mount, render_to_string};
